// ── Fallback polling ──
//
// When the live channel is unavailable the dashboard still needs fresh
// data. `FallbackPoller` fetches the four REST resources on a fixed
// period and publishes them through the same fan-out the live channel
// uses, so consumers cannot tell the two apart.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use indexmap::IndexSet;
use senseminds_api::SenseMindsClient;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::EventBus;
use crate::error::CoreError;
use crate::model::{Alert, Event, MlPrediction, SensorSnapshot, StatusUpdate, SystemHealth};

/// How many published alert ids are remembered for de-duplication.
const SEEN_ALERTS_CAPACITY: usize = 256;

/// Shortest accepted poll period; `tokio::time::interval` rejects zero.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ── DataSource ───────────────────────────────────────────────────────

/// The REST resources fallback polling reads.
pub trait DataSource: Send + Sync + 'static {
    fn current_sensors(&self) -> impl Future<Output = Result<SensorSnapshot, CoreError>> + Send;

    fn current_ml(&self) -> impl Future<Output = Result<MlPrediction, CoreError>> + Send;

    fn system_health(&self) -> impl Future<Output = Result<SystemHealth, CoreError>> + Send;

    fn recent_alerts(
        &self,
        hours: u32,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Alert>, CoreError>> + Send;
}

impl DataSource for SenseMindsClient {
    async fn current_sensors(&self) -> Result<SensorSnapshot, CoreError> {
        Ok(SenseMindsClient::current_sensors(self).await?)
    }

    async fn current_ml(&self) -> Result<MlPrediction, CoreError> {
        Ok(SenseMindsClient::current_ml(self).await?)
    }

    async fn system_health(&self) -> Result<SystemHealth, CoreError> {
        Ok(SenseMindsClient::system_health(self).await?)
    }

    async fn recent_alerts(&self, hours: u32, limit: u32) -> Result<Vec<Alert>, CoreError> {
        Ok(SenseMindsClient::recent_alerts(self, hours, limit).await?)
    }
}

// ── FallbackPoller ───────────────────────────────────────────────────

/// Parameters of the recent-alerts fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub alerts_lookback_hours: u32,
    pub alerts_limit: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            alerts_lookback_hours: 1,
            alerts_limit: 10,
        }
    }
}

/// Periodic REST poller. Cheaply cloneable; all clones control the same
/// (single) background task.
pub struct FallbackPoller<S> {
    inner: Arc<PollerInner<S>>,
}

impl<S> Clone for FallbackPoller<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct PollerInner<S> {
    source: S,
    bus: Arc<EventBus>,
    settings: PollSettings,
    seen_alerts: Mutex<IndexSet<String>>,
    active: Mutex<Option<PollTask>>,
    retired: Mutex<Vec<JoinHandle<()>>>,
}

struct PollTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: DataSource> FallbackPoller<S> {
    pub fn new(source: S, bus: Arc<EventBus>, settings: PollSettings) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                source,
                bus,
                settings,
                seen_alerts: Mutex::new(IndexSet::new()),
                active: Mutex::new(None),
                retired: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Start polling: one cycle immediately, then one per `period`.
    ///
    /// Idempotent: returns `false` (and changes nothing) if a poll task is
    /// already running. Must be called from within a Tokio runtime.
    pub fn start(&self, period: Duration) -> bool {
        let mut active = lock(&self.inner.active);
        if active.is_some() {
            debug!("fallback polling already running");
            return false;
        }

        let period = period.max(MIN_POLL_INTERVAL);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(self.clone(), period, cancel.clone()));
        *active = Some(PollTask { cancel, handle });

        info!(interval = ?period, "fallback polling started");
        true
    }

    /// Stop polling. In-flight fetches are abandoned and their results
    /// dropped. Idempotent: returns `false` if nothing was running.
    pub fn stop(&self) -> bool {
        let Some(task) = lock(&self.inner.active).take() else {
            return false;
        };
        task.cancel.cancel();
        lock(&self.inner.retired).push(task.handle);
        info!("fallback polling stopped");
        true
    }

    /// Stop polling and wait for every poll task ever started to finish.
    pub async fn shutdown(&self) {
        self.stop();
        let handles: Vec<_> = lock(&self.inner.retired).drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.active).is_some()
    }

    /// Run a single poll cycle on the calling task.
    pub async fn poll_once(&self) {
        self.cycle(&CancellationToken::new()).await;
    }

    /// Fetch all four resources concurrently; each result is published as
    /// soon as it arrives unless `stopped` has fired by then.
    async fn cycle(&self, stopped: &CancellationToken) {
        let inner = &self.inner;
        let PollSettings {
            alerts_lookback_hours,
            alerts_limit,
        } = inner.settings;

        let sensors = async {
            match inner.source.current_sensors().await {
                Ok(snapshot) => self.emit(stopped, Event::sensor_fanout(snapshot)),
                Err(e) => warn!(error = %e, resource = "sensors", "fallback fetch failed"),
            }
        };
        let ml = async {
            match inner.source.current_ml().await {
                Ok(prediction) => self.emit(stopped, Event::ml_fanout(prediction)),
                Err(e) => warn!(error = %e, resource = "ml", "fallback fetch failed"),
            }
        };
        let health = async {
            match inner.source.system_health().await {
                Ok(health) => self.emit(
                    stopped,
                    [Event::SystemStatusUpdate(StatusUpdate::Health(health))],
                ),
                Err(e) => warn!(error = %e, resource = "health", "fallback fetch failed"),
            }
        };
        let alerts = async {
            match inner
                .source
                .recent_alerts(alerts_lookback_hours, alerts_limit)
                .await
            {
                Ok(alerts) => {
                    if !stopped.is_cancelled() {
                        let fresh = self.unseen(alerts);
                        self.emit(stopped, fresh.into_iter().map(Event::NewAlert));
                    }
                }
                Err(e) => warn!(error = %e, resource = "alerts", "fallback fetch failed"),
            }
        };

        tokio::join!(sensors, ml, health, alerts);
        debug!("fallback poll cycle complete");
    }

    fn emit(&self, stopped: &CancellationToken, events: impl IntoIterator<Item = Event>) {
        if stopped.is_cancelled() {
            debug!("discarding fetch result after stop");
            return;
        }
        for event in events {
            self.inner.bus.dispatch(&event);
        }
    }

    /// Filter out alerts already published, remembering the new ones.
    fn unseen(&self, alerts: Vec<Alert>) -> Vec<Alert> {
        let mut seen = lock(&self.inner.seen_alerts);
        let fresh: Vec<Alert> = alerts
            .into_iter()
            .filter(|alert| seen.insert(alert.id.clone()))
            .collect();
        while seen.len() > SEEN_ALERTS_CAPACITY {
            seen.shift_remove_index(0);
        }
        fresh
    }
}

async fn poll_loop<S: DataSource>(
    poller: FallbackPoller<S>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = poller.cycle(&cancel) => {}
                }
            }
        }
    }
    debug!("fallback poll loop exited");
}
