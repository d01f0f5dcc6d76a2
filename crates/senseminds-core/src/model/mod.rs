// ── Domain model ──
//
// Wire payloads are defined once in senseminds-api and re-exported here;
// this module adds the event vocabulary the bus speaks and the
// connection-status payload.

pub mod alert;
pub mod event;

// ── Re-exports ──────────────────────────────────────────────────────

pub use senseminds_api::models::{
    Alert, AlertSeverity, AlertStatus, AlertType, FireAlert, MlPrediction, SensorSnapshot,
    SystemHealth,
};

pub use alert::normalize_fire_alert;
pub use event::{ConnectionStatus, Event, EventKind, StatusUpdate, TransportMode};
