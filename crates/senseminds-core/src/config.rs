// ── Runtime realtime configuration ──
//
// These types describe *where* the realtime layer connects and how it
// paces reconnects and polling. They never touch disk: the CLI (or any
// other host) builds a `RealtimeConfig` and hands it in.

use std::time::Duration;

use senseminds_api::{ReconnectConfig, SocketIoTransport, TlsMode, TransportConfig};
use url::Url;

/// Configuration for one realtime session against one deployment.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Socket.IO server (e.g., `http://10.0.0.5:5000`).
    pub realtime_url: Url,
    /// REST API root used by fallback polling (e.g., `http://10.0.0.5:5000/api/v1`).
    pub api_url: Url,
    /// Socket.IO endpoint path on the realtime server.
    pub socketio_path: String,
    /// Socket.IO namespace to join.
    pub namespace: String,
    /// Room joined after every successful connect.
    pub room: String,
    /// Period between fallback poll cycles.
    pub poll_interval: Duration,
    /// Backoff schedule and the ceiling that triggers fallback.
    pub reconnect: ReconnectConfig,
    /// Fixed delay before reconnecting after the server closed the session.
    pub server_disconnect_delay: Duration,
    /// Pause between teardown and re-initialization in `reconnect()`.
    pub restart_delay: Duration,
    /// Bound on a single connect attempt (upgrade + handshake).
    pub connect_timeout: Duration,
    /// Bound on a single REST request.
    pub request_timeout: Duration,
    /// Lookback window for the recent-alerts fetch, in hours.
    pub alerts_lookback_hours: u32,
    /// Maximum alerts per fetch.
    pub alerts_limit: u32,
    /// TLS trust for REST calls.
    pub tls: TlsMode,
}

impl RealtimeConfig {
    /// Build a config with default pacing for the given endpoints.
    pub fn new(realtime_url: Url, api_url: Url) -> Self {
        Self {
            realtime_url,
            api_url,
            socketio_path: "/socket.io/".into(),
            namespace: "/".into(),
            room: "alerts".into(),
            poll_interval: Duration::from_secs(15),
            reconnect: ReconnectConfig::default(),
            server_disconnect_delay: Duration::from_secs(5),
            restart_delay: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            alerts_lookback_hours: 1,
            alerts_limit: 10,
            tls: TlsMode::System,
        }
    }

    /// The Socket.IO transport these settings describe.
    pub fn socketio_transport(&self) -> SocketIoTransport {
        SocketIoTransport {
            path: self.socketio_path.clone(),
            namespace: self.namespace.clone(),
            connect_timeout: self.connect_timeout,
        }
    }

    /// HTTP settings for the REST client.
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.clone(),
            timeout: self.request_timeout,
        }
    }
}
