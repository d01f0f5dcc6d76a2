// ── Realtime service ──
//
// The façade UI code talks to. Owns the bus, the connection manager and
// the driver task; exposes subscribe/unsubscribe, lifecycle control, and
// read-only state. Built explicitly by the composition root; there is no
// global instance.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use senseminds_api::{SenseMindsClient, SocketIoTransport, Transport};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::bus::{EventBus, Listener, Topic};
use crate::config::RealtimeConfig;
use crate::connection::{ConnectionManager, ConnectionState, DriverSettings, drive};
use crate::error::CoreError;
use crate::fallback::{DataSource, FallbackPoller, PollSettings};

/// Point-in-time view of the realtime layer, for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    pub fallback_active: bool,
    pub endpoint: String,
}

/// Realtime event distribution service.
///
/// Cheaply cloneable via `Arc`. Public methods never fail and never
/// panic because of call order: `disconnect()` before `initialize()` is
/// a no-op, `initialize()` twice starts one driver.
pub struct RealtimeService<T: Transport = SocketIoTransport, S: DataSource = SenseMindsClient> {
    inner: Arc<ServiceInner<T, S>>,
}

impl<T: Transport, S: DataSource> Clone for RealtimeService<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ServiceInner<T: Transport, S: DataSource> {
    config: RealtimeConfig,
    bus: Arc<EventBus>,
    manager: Arc<ConnectionManager<S>>,
    transport: Arc<T>,
    lifecycle: Mutex<Lifecycle>,
}

#[derive(Default)]
struct Lifecycle {
    cancel: CancellationToken,
    driver: Option<JoinHandle<()>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RealtimeService<SocketIoTransport, SenseMindsClient> {
    /// Build the production service: Socket.IO transport plus REST
    /// fallback. Does NOT connect; call [`initialize()`](Self::initialize).
    pub fn new(config: RealtimeConfig) -> Result<Self, CoreError> {
        let client = SenseMindsClient::new(config.api_url.clone(), &config.transport_config())?;
        let transport = config.socketio_transport();
        Ok(Self::with_parts(config, transport, client))
    }

    /// Build and initialize in one step.
    pub fn start(config: RealtimeConfig) -> Result<Self, CoreError> {
        let service = Self::new(config)?;
        service.initialize();
        Ok(service)
    }
}

impl<T: Transport, S: DataSource> RealtimeService<T, S> {
    /// Build a service over any transport and data source.
    pub fn with_parts(config: RealtimeConfig, transport: T, source: S) -> Self {
        let bus = Arc::new(EventBus::new());
        let poller = FallbackPoller::new(
            source,
            Arc::clone(&bus),
            PollSettings {
                alerts_lookback_hours: config.alerts_lookback_hours,
                alerts_limit: config.alerts_limit,
            },
        );
        let manager = Arc::new(ConnectionManager::new(
            config.reconnect.max_attempts,
            Arc::clone(&bus),
            poller,
            config.poll_interval,
        ));

        Self {
            inner: Arc::new(ServiceInner {
                config,
                bus,
                manager,
                transport: Arc::new(transport),
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start connecting in the background. Idempotent within a lifecycle.
    ///
    /// Requires a Tokio runtime; outside one this logs and does nothing.
    pub fn initialize(&self) {
        let mut lifecycle = lock(&self.inner.lifecycle);
        if lifecycle.driver.is_some() {
            debug!("realtime service already initialized");
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!("realtime service initialized outside a Tokio runtime");
            return;
        };

        let config = &self.inner.config;
        let settings = DriverSettings {
            endpoint: config.realtime_url.clone(),
            room: config.room.clone(),
            reconnect: config.reconnect.clone(),
            server_disconnect_delay: config.server_disconnect_delay,
        };
        let cancel = CancellationToken::new();

        info!(endpoint = %config.realtime_url, "starting realtime service");
        let handle = runtime.spawn(drive(
            Arc::clone(&self.inner.manager),
            Arc::clone(&self.inner.transport),
            settings,
            cancel.clone(),
        ));

        lifecycle.cancel = cancel;
        lifecycle.driver = Some(handle);
    }

    /// Tear everything down: driver, live session, fallback polling.
    /// Resolves once every background task has finished. Idempotent.
    pub async fn disconnect(&self) {
        let driver = {
            let mut lifecycle = lock(&self.inner.lifecycle);
            lifecycle.cancel.cancel();
            lifecycle.driver.take()
        };
        let was_running = driver.is_some();

        self.inner.manager.reset(was_running);

        if let Some(handle) = driver {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!(error = %e, "connection driver panicked");
                }
            }
        }
        self.inner.manager.poller().shutdown().await;

        if was_running {
            info!("realtime service disconnected");
        }
    }

    /// `disconnect()`, pause for `restart_delay`, then `initialize()`.
    /// The only way out of fallback mode.
    pub async fn reconnect(&self) {
        info!("reconnecting realtime service");
        self.disconnect().await;
        tokio::time::sleep(self.inner.config.restart_delay).await;
        self.initialize();
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn on<E: Topic>(&self, listener: Listener<E::Payload>) {
        self.inner.bus.subscribe::<E>(listener);
    }

    /// Returns `false` if `listener` was not subscribed to `E`.
    pub fn off<E: Topic>(&self, listener: &Listener<E::Payload>) -> bool {
        self.inner.bus.unsubscribe::<E>(listener)
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.inner.bus
    }

    // ── State ────────────────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.inner.manager.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn is_fallback(&self) -> bool {
        self.state() == ConnectionState::Fallback
    }

    /// Subscribe to state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.manager.watch()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let manager = &self.inner.manager;
        Diagnostics {
            state: manager.state(),
            reconnect_attempts: manager.attempts(),
            max_reconnect_attempts: manager.max_attempts(),
            fallback_active: manager.poller().is_running(),
            endpoint: self.inner.config.realtime_url.to_string(),
        }
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.inner.config
    }

    /// Run one fallback poll cycle now, regardless of connection state.
    pub async fn poll_once(&self) {
        self.inner.manager.poller().poll_once().await;
    }
}

impl<T: Transport, S: DataSource> Drop for ServiceInner<T, S> {
    fn drop(&mut self) {
        lock(&self.lifecycle).cancel.cancel();
        self.manager.poller().stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RealtimeConfig {
        RealtimeConfig::new(
            "http://127.0.0.1:5000".parse().unwrap(),
            "http://127.0.0.1:5000/api/v1".parse().unwrap(),
        )
    }

    #[test]
    fn new_service_is_disconnected() {
        let service = RealtimeService::new(config()).unwrap();
        let diag = service.diagnostics();

        assert_eq!(diag.state, ConnectionState::Disconnected);
        assert_eq!(diag.reconnect_attempts, 0);
        assert_eq!(diag.max_reconnect_attempts, 3);
        assert!(!diag.fallback_active);
        assert_eq!(diag.endpoint, "http://127.0.0.1:5000/");
    }

    #[test]
    fn initialize_outside_runtime_is_harmless() {
        let service = RealtimeService::new(config()).unwrap();
        service.initialize();
        assert_eq!(service.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn disconnect_before_initialize_is_a_no_op() {
        let service = RealtimeService::new(config()).unwrap();
        service.disconnect().await;
        service.disconnect().await;
        assert_eq!(service.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn diagnostics_serialize_snake_case() {
        let diag = Diagnostics {
            state: ConnectionState::Fallback,
            reconnect_attempts: 3,
            max_reconnect_attempts: 3,
            fallback_active: true,
            endpoint: "http://127.0.0.1:5000/".into(),
        };
        let value = serde_json::to_value(&diag).unwrap();
        assert_eq!(value["state"], "fallback");
        assert_eq!(value["fallback_active"], true);
    }
}
