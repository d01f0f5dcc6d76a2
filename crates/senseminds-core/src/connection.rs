// ── Connection management ──
//
// `ConnectionMachine` is the pure state machine: inputs in, transitions
// and retry directives out, no I/O. `ConnectionManager` applies its
// transitions under one lock together with their side effects (fallback
// polling, the `connection_status` queue), and `drive` is the async task
// that feeds it transport results. Statuses are published after the lock
// is released, so listeners may call back into the service.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use senseminds_api::websocket::calculate_backoff;
use senseminds_api::{DisconnectReason, ReconnectConfig, Session, SessionEvent, Transport};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::bus::{EventBus, topic};
use crate::fallback::{DataSource, FallbackPoller};
use crate::model::{ConnectionStatus, Event, FireAlert, normalize_fire_alert};

// ── ConnectionState ──────────────────────────────────────────────────

/// Where the realtime layer is. Exactly one state at a time; `Connected`
/// and `Fallback` exclude each other by construction.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Fallback,
}

/// A state change (or non-change) produced by one machine input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

impl Transition {
    pub fn is_change(&self) -> bool {
        self.from != self.to
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// What the driver should do after a failed or lost connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    /// Wait `calculate_backoff(attempt)`, then connect again.
    Backoff { attempt: u32 },
    /// Wait the fixed server-disconnect delay, then connect fresh.
    Fixed,
    /// Ceiling reached; fallback polling has taken over.
    GiveUp,
    /// We closed the session ourselves; do nothing.
    Stop,
}

// ── ConnectionMachine ────────────────────────────────────────────────

/// Pure connection state machine with a reconnect ceiling.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    attempts: u32,
    max_attempts: u32,
}

impl ConnectionMachine {
    /// `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive failed attempts since the last successful connect.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Start a connection attempt. Only leaves `Disconnected`; `Fallback`
    /// is exited through [`reset`](Self::reset).
    pub fn begin(&mut self) -> Transition {
        match self.state {
            ConnectionState::Disconnected => self.move_to(ConnectionState::Connecting),
            _ => self.stay(),
        }
    }

    /// The transport reported a successful connect.
    pub fn connected(&mut self) -> Transition {
        self.attempts = 0;
        self.move_to(ConnectionState::Connected)
    }

    /// A connect attempt failed.
    pub fn connect_failed(&mut self) -> (Transition, Retry) {
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts >= self.max_attempts {
            (self.move_to(ConnectionState::Fallback), Retry::GiveUp)
        } else {
            let attempt = self.attempts - 1;
            (
                self.move_to(ConnectionState::Connecting),
                Retry::Backoff { attempt },
            )
        }
    }

    /// A live session ended.
    pub fn lost(&mut self, reason: &DisconnectReason) -> (Transition, Retry) {
        let retry = match reason {
            DisconnectReason::ClientDisconnect => Retry::Stop,
            r if r.is_remote_close() => Retry::Fixed,
            _ => Retry::Backoff {
                attempt: self.attempts,
            },
        };
        (self.move_to(ConnectionState::Disconnected), retry)
    }

    /// Forced teardown from any state.
    pub fn reset(&mut self) -> Transition {
        self.attempts = 0;
        self.move_to(ConnectionState::Disconnected)
    }

    fn move_to(&mut self, to: ConnectionState) -> Transition {
        let from = self.state;
        self.state = to;
        Transition { from, to }
    }

    fn stay(&self) -> Transition {
        Transition {
            from: self.state,
            to: self.state,
        }
    }
}

// ── Inbound translation ──────────────────────────────────────────────

/// Why an inbound channel event produced nothing.
#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    #[error("unknown event '{0}'")]
    Unknown(String),

    #[error("malformed '{event}' payload: {source}")]
    Malformed {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

fn parse<T: DeserializeOwned>(event: &str, data: Value) -> Result<T, InboundError> {
    serde_json::from_value(data).map_err(|source| InboundError::Malformed {
        event: event.to_owned(),
        source,
    })
}

/// Map one inbound channel event to the domain events it publishes.
///
/// Accepts direct events (`sensor_update`, ...) as well as the
/// `message` envelope `{ "event": ..., "data": ... }`.
pub fn translate(name: &str, data: Value, now: DateTime<Utc>) -> Result<Vec<Event>, InboundError> {
    let events = match name {
        "sensor_update" => Vec::from(Event::sensor_fanout(parse(name, data)?)),
        "ml_analysis" => Vec::from(Event::ml_fanout(parse(name, data)?)),
        "pattern_analysis" => vec![Event::PatternAnalysis(data)],
        "fire_alert" => {
            let raw: FireAlert = parse(name, data)?;
            let alert = normalize_fire_alert(&raw, now);
            vec![Event::FireAlert(raw), Event::NewAlert(alert)]
        }
        "pipeline_summary" => vec![Event::PipelineSummary(data)],
        "status" => vec![Event::Status(data)],
        "new_alert" => vec![Event::NewAlert(parse(name, data)?)],
        "alert_update" => vec![Event::AlertUpdate(parse(name, data)?)],
        "message" => {
            let envelope: Envelope = parse(name, data)?;
            return match envelope.event.as_str() {
                "connect" | "disconnect" => {
                    debug!(notice = %envelope.event, "server lifecycle notice");
                    Ok(Vec::new())
                }
                "message" => Err(InboundError::Unknown("message".to_owned())),
                inner => translate(inner, envelope.data, now),
            };
        }
        other => return Err(InboundError::Unknown(other.to_owned())),
    };
    Ok(events)
}

// ── ConnectionManager ────────────────────────────────────────────────

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

const FALLBACK_REASON: &str = "max reconnection attempts reached";

/// Owns the machine and applies its transitions with their side effects.
pub(crate) struct ConnectionManager<S> {
    machine: Mutex<ConnectionMachine>,
    state: watch::Sender<ConnectionState>,
    attempts: AtomicU32,
    max_attempts: u32,
    /// Statuses queued under the machine lock, in transition order.
    pending: Mutex<VecDeque<ConnectionStatus>>,
    publishing: AtomicBool,
    bus: Arc<EventBus>,
    poller: FallbackPoller<S>,
    poll_interval: Duration,
}

impl<S: DataSource> ConnectionManager<S> {
    pub(crate) fn new(
        max_attempts: u32,
        bus: Arc<EventBus>,
        poller: FallbackPoller<S>,
        poll_interval: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let machine = ConnectionMachine::new(max_attempts);
        Self {
            max_attempts: machine.max_attempts(),
            machine: Mutex::new(machine),
            state,
            attempts: AtomicU32::new(0),
            pending: Mutex::new(VecDeque::new()),
            publishing: AtomicBool::new(false),
            bus,
            poller,
            poll_interval,
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub(crate) fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub(crate) fn poller(&self) -> &FallbackPoller<S> {
        &self.poller
    }

    /// Apply one machine input. Returns `None` without touching the
    /// machine if `guard` has been cancelled.
    fn apply<R>(
        &self,
        guard: &CancellationToken,
        reason: Option<&str>,
        step: impl FnOnce(&mut ConnectionMachine) -> (Transition, R),
    ) -> Option<R> {
        let out = {
            let mut machine = lock(&self.machine);
            if guard.is_cancelled() {
                return None;
            }
            let (transition, out) = step(&mut machine);
            self.attempts.store(machine.attempts(), Ordering::SeqCst);
            if transition.is_change() {
                self.enter(transition, reason);
            }
            out
        };
        self.flush();
        Some(out)
    }

    /// Forced teardown. Publishes a final `connection_status` when the
    /// state changed or `announce` is set.
    pub(crate) fn reset(&self, announce: bool) {
        {
            let mut machine = lock(&self.machine);
            let transition = machine.reset();
            self.attempts.store(0, Ordering::SeqCst);
            if transition.is_change() {
                self.enter(transition, Some(DisconnectReason::ClientDisconnect.as_str()));
            } else {
                self.poller.stop();
                if announce {
                    self.queue(ConnectionStatus::disconnected(Some(
                        DisconnectReason::ClientDisconnect.as_str().to_owned(),
                    )));
                }
            }
        }
        self.flush();
    }

    fn queue(&self, status: ConnectionStatus) {
        lock(&self.pending).push_back(status);
    }

    /// Publish queued statuses with no lock held. A listener that triggers
    /// another transition only queues it; the caller already draining the
    /// queue publishes it next, so listeners see statuses in order.
    fn flush(&self) {
        loop {
            if self.publishing.swap(true, Ordering::AcqRel) {
                return;
            }
            loop {
                let next = lock(&self.pending).pop_front();
                let Some(status) = next else { break };
                self.bus.publish::<topic::ConnectionStatus>(&status);
            }
            self.publishing.store(false, Ordering::Release);
            if lock(&self.pending).is_empty() {
                return;
            }
        }
    }

    /// Side effects of entering `transition.to`. Called with the machine
    /// lock held; the status is queued for [`flush`](Self::flush).
    fn enter(&self, transition: Transition, reason: Option<&str>) {
        self.state.send_replace(transition.to);
        info!(%transition, reason, "connection state changed");

        let status = match transition.to {
            ConnectionState::Connected => {
                self.poller.stop();
                ConnectionStatus::websocket()
            }
            ConnectionState::Fallback => {
                self.poller.start(self.poll_interval);
                ConnectionStatus::fallback(Some(FALLBACK_REASON.to_owned()))
            }
            ConnectionState::Connecting | ConnectionState::Disconnected => {
                self.poller.stop();
                ConnectionStatus::disconnected(reason.map(str::to_owned))
            }
        };
        self.queue(status);
    }

    /// Publish the domain events for one inbound channel event.
    fn deliver(&self, name: &str, data: Value, guard: &CancellationToken) {
        match translate(name, data, Utc::now()) {
            Ok(events) => {
                for event in &events {
                    if guard.is_cancelled() {
                        return;
                    }
                    self.bus.dispatch(event);
                }
            }
            Err(InboundError::Unknown(event)) => {
                debug!(%event, "ignoring unknown realtime event");
            }
            Err(e @ InboundError::Malformed { .. }) => {
                warn!(error = %e, "dropping malformed realtime payload");
            }
        }
    }
}

// ── Driver ───────────────────────────────────────────────────────────

/// Static inputs of the driver task.
#[derive(Debug, Clone)]
pub(crate) struct DriverSettings {
    pub endpoint: Url,
    pub room: String,
    pub reconnect: ReconnectConfig,
    pub server_disconnect_delay: Duration,
}

/// Connect, serve, and reconnect until cancelled, told to stop, or the
/// ceiling hands over to fallback polling.
pub(crate) async fn drive<T: Transport, S: DataSource>(
    manager: Arc<ConnectionManager<S>>,
    transport: Arc<T>,
    settings: DriverSettings,
    cancel: CancellationToken,
) {
    loop {
        if manager.apply(&cancel, None, |m| (m.begin(), ())).is_none() {
            break;
        }

        let connected = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = transport.connect(&settings.endpoint) => Some(result),
        };
        let Some(connected) = connected else { break };

        let retry = match connected {
            Ok(session) => serve(&manager, session, &settings, &cancel).await,
            Err(e) => {
                let attempt = manager.attempts() + 1;
                warn!(error = %e, attempt, "realtime connect failed");
                let reason = e.to_string();
                manager.apply(&cancel, Some(&reason), ConnectionMachine::connect_failed)
            }
        };

        let delay = match retry {
            None | Some(Retry::Stop) => break,
            Some(Retry::GiveUp) => {
                warn!(
                    max_attempts = manager.max_attempts(),
                    "realtime channel unavailable, switched to fallback polling"
                );
                break;
            }
            Some(Retry::Backoff { attempt }) => calculate_backoff(attempt, &settings.reconnect),
            Some(Retry::Fixed) => settings.server_disconnect_delay,
        };

        debug!(?delay, "waiting before reconnect");
        let slept = tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            () = tokio::time::sleep(delay) => true,
        };
        if !slept {
            break;
        }
    }
    debug!("connection driver exited");
}

/// Run one established session until it ends. Returns the retry directive,
/// or `None` if the driver was cancelled.
async fn serve<S: DataSource, X: Session>(
    manager: &ConnectionManager<S>,
    mut session: X,
    settings: &DriverSettings,
    cancel: &CancellationToken,
) -> Option<Retry> {
    if manager.apply(cancel, None, |m| (m.connected(), ())).is_none() {
        session.close().await;
        return None;
    }

    let room = json!({ "room": settings.room });
    if let Err(e) = session.emit("join_room", &room).await {
        warn!(error = %e, room = %settings.room, "failed to join room");
    }

    let reason = loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            event = session.recv() => Some(event),
        };
        match event {
            None => {
                if let Err(e) = session.emit("leave_room", &room).await {
                    debug!(error = %e, room = %settings.room, "failed to leave room");
                }
                session.close().await;
                return None;
            }
            Some(SessionEvent::Message { name, data }) => manager.deliver(&name, data, cancel),
            Some(SessionEvent::Closed(reason)) => break reason,
        }
    };

    info!(%reason, "realtime channel disconnected");
    manager.apply(cancel, Some(reason.as_str()), |m| m.lost(&reason))
}
