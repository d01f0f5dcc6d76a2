// senseminds-api: Async Rust client for the SenseMinds 360 backend (REST + Socket.IO)

pub mod client;
pub mod error;
pub mod models;
pub mod socketio;
pub mod transport;
pub mod websocket;

pub use client::SenseMindsClient;
pub use error::Error;
pub use models::{
    Alert, AlertSeverity, AlertStatus, AlertType, FireAlert, MlPrediction, SensorSnapshot,
    SystemHealth,
};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{
    DisconnectReason, ReconnectConfig, Session, SessionEvent, SocketIoSession, SocketIoTransport,
    Transport,
};
