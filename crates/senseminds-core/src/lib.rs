// senseminds-core: Realtime event distribution between senseminds-api and consumers (CLI/UI).

pub mod bus;
pub mod config;
pub mod connection;
pub mod error;
pub mod fallback;
pub mod model;
pub mod service;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bus::{EventBus, Listener, Topic, listener, topic};
pub use config::RealtimeConfig;
pub use connection::{ConnectionMachine, ConnectionState, Retry, Transition};
pub use error::CoreError;
pub use fallback::{DataSource, FallbackPoller, PollSettings};
pub use service::{Diagnostics, RealtimeService};

pub use model::{
    Alert, AlertSeverity, AlertStatus, AlertType, ConnectionStatus, Event, EventKind, FireAlert,
    MlPrediction, SensorSnapshot, StatusUpdate, SystemHealth, TransportMode, normalize_fire_alert,
};
