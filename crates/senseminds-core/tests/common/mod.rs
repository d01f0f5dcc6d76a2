// Scripted transport and data source shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use senseminds_api::{DisconnectReason, Error, Session, SessionEvent, Transport};
use senseminds_core::{
    Alert, ConnectionState, ConnectionStatus, CoreError, DataSource, MlPrediction,
    RealtimeConfig, RealtimeService, SensorSnapshot, SystemHealth, listener, topic,
};

// ── Transport ───────────────────────────────────────────────────────

pub enum Outcome {
    Fail,
    Accept(FakeSession),
}

/// Pops one scripted outcome per connect attempt; fails once the script
/// runs out.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Outcome>>>,
    attempts: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new(script: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            attempts: Arc::default(),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptedTransport {
    type Session = FakeSession;

    async fn connect(&self, _server: &Url) -> Result<FakeSession, Error> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Outcome::Accept(session)) => Ok(session),
            Some(Outcome::Fail) | None => Err(Error::WebSocketConnect("connection refused".into())),
        }
    }
}

#[derive(Default)]
pub struct SessionLog {
    pub emitted: Mutex<Vec<(String, Value)>>,
    pub closed: AtomicBool,
}

impl SessionLog {
    pub fn emitted_names(&self) -> Vec<String> {
        self.emitted
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

pub struct FakeSession {
    events: mpsc::UnboundedReceiver<SessionEvent>,
    log: Arc<SessionLog>,
}

/// Test-side end of a `FakeSession`: push events in, inspect what the
/// client sent.
pub struct SessionHandle {
    pub events: mpsc::UnboundedSender<SessionEvent>,
    pub log: Arc<SessionLog>,
}

impl SessionHandle {
    pub fn push(&self, name: &str, data: Value) {
        self.events
            .send(SessionEvent::Message {
                name: name.to_owned(),
                data,
            })
            .unwrap();
    }

    pub fn close(&self, reason: DisconnectReason) {
        self.events.send(SessionEvent::Closed(reason)).unwrap();
    }
}

pub fn session() -> (Outcome, SessionHandle) {
    let (tx, rx) = mpsc::unbounded_channel();
    let log = Arc::new(SessionLog::default());
    let session = FakeSession {
        events: rx,
        log: Arc::clone(&log),
    };
    (Outcome::Accept(session), SessionHandle { events: tx, log })
}

impl Session for FakeSession {
    async fn recv(&mut self) -> SessionEvent {
        self.events
            .recv()
            .await
            .unwrap_or(SessionEvent::Closed(DisconnectReason::TransportClose))
    }

    async fn emit(&mut self, name: &str, data: &Value) -> Result<(), Error> {
        self.log
            .emitted
            .lock()
            .unwrap()
            .push((name.to_owned(), data.clone()));
        Ok(())
    }

    async fn close(&mut self) {
        self.log.closed.store(true, Ordering::SeqCst);
    }
}

// ── Data source ─────────────────────────────────────────────────────

/// Serves empty payloads and counts poll cycles (one sensor fetch each).
#[derive(Clone, Default)]
pub struct CountingSource {
    cycles: Arc<AtomicUsize>,
}

impl CountingSource {
    pub fn cycles(&self) -> usize {
        self.cycles.load(Ordering::SeqCst)
    }
}

impl DataSource for CountingSource {
    async fn current_sensors(&self) -> Result<SensorSnapshot, CoreError> {
        self.cycles.fetch_add(1, Ordering::SeqCst);
        Ok(SensorSnapshot::default())
    }

    async fn current_ml(&self) -> Result<MlPrediction, CoreError> {
        Ok(MlPrediction::default())
    }

    async fn system_health(&self) -> Result<SystemHealth, CoreError> {
        Ok(SystemHealth::default())
    }

    async fn recent_alerts(&self, _hours: u32, _limit: u32) -> Result<Vec<Alert>, CoreError> {
        Ok(Vec::new())
    }
}

// ── Service helpers ─────────────────────────────────────────────────

pub type TestService = RealtimeService<ScriptedTransport, CountingSource>;

pub fn config() -> RealtimeConfig {
    RealtimeConfig::new(
        "http://127.0.0.1:5000".parse().unwrap(),
        "http://127.0.0.1:5000/api/v1".parse().unwrap(),
    )
}

/// Record every `connection_status` the service publishes.
pub fn record_statuses(service: &TestService) -> Arc<Mutex<Vec<ConnectionStatus>>> {
    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&statuses);
    service.on::<topic::ConnectionStatus>(listener(move |s: &ConnectionStatus| {
        sink.lock().unwrap().push(s.clone());
    }));
    statuses
}

/// Wait (on the paused clock) until the service reaches `state`.
pub async fn wait_for_state(service: &TestService, state: ConnectionState) {
    let mut rx = service.watch_state();
    tokio::time::timeout(Duration::from_secs(120), rx.wait_for(|s| *s == state))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {state}"))
        .unwrap_or_else(|_| panic!("state channel closed waiting for {state}"));
}

/// Let spawned tasks run without moving the clock meaningfully.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
