//! Socket.IO realtime channel over WebSocket.
//!
//! [`Transport`] and [`Session`] are the seam between the connection
//! manager in `senseminds-core` and the wire. [`SocketIoTransport`] is the
//! production implementation: a WebSocket-only Socket.IO client built on
//! `tokio-tungstenite`. Reconnection policy lives with the caller; this
//! module only provides [`ReconnectConfig`] and [`calculate_backoff`].
//!
//! # Example
//!
//! ```rust,ignore
//! use senseminds_api::websocket::{Session, SessionEvent, SocketIoTransport, Transport};
//!
//! let transport = SocketIoTransport::default();
//! let mut session = transport.connect(&"http://10.0.0.5:5000".parse()?).await?;
//! session.emit("join_room", &serde_json::json!({ "room": "alerts" })).await?;
//!
//! while let SessionEvent::Message { name, data } = session.recv().await {
//!     println!("{name}: {data}");
//! }
//! ```

use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;
use crate::socketio::{self, EnginePacket, SocketPacket};

// ── Session vocabulary ───────────────────────────────────────────────

/// Why a live session ended.
///
/// The string forms match the reasons Socket.IO clients report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The server sent a namespace disconnect.
    ServerDisconnect,
    /// The underlying connection was closed (close frame or stream end).
    TransportClose,
    /// The underlying connection failed.
    TransportError(String),
    /// Nothing arrived within the server's ping interval + timeout.
    PingTimeout,
    /// We closed the session ourselves.
    ClientDisconnect,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServerDisconnect => "io server disconnect",
            Self::TransportClose => "transport close",
            Self::TransportError(_) => "transport error",
            Self::PingTimeout => "ping timeout",
            Self::ClientDisconnect => "io client disconnect",
        }
    }

    /// `true` when the remote end ended the session on purpose, which
    /// warrants a fresh connection rather than the backoff schedule.
    pub fn is_remote_close(&self) -> bool {
        matches!(self, Self::ServerDisconnect | Self::TransportClose)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportError(detail) => write!(f, "transport error: {detail}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// What a live session yields.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// An application event, e.g. `sensor_update` with its payload.
    Message { name: String, data: Value },
    /// The session is over; the caller decides whether to reconnect.
    Closed(DisconnectReason),
}

/// Opens live sessions against a realtime server.
pub trait Transport: Send + Sync + 'static {
    type Session: Session;

    /// Establish a session. Resolves once the server has acknowledged the
    /// connection, so a returned session is ready to receive events.
    fn connect(&self, server: &Url) -> impl Future<Output = Result<Self::Session, Error>> + Send;
}

/// A single established connection.
pub trait Session: Send + 'static {
    /// Wait for the next application event or the end of the session.
    fn recv(&mut self) -> impl Future<Output = SessionEvent> + Send;

    /// Send an application event to the server.
    fn emit(&mut self, name: &str, data: &Value) -> impl Future<Output = Result<(), Error>> + Send;

    /// Close the session. Errors are swallowed; the session is gone either way.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Reconnection policy for the realtime channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first retry. Default: 2s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 5s.
    pub max_delay: Duration,

    /// Consecutive failed attempts before giving up on the channel. Default: 3.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(5),
            max_attempts: 3,
        }
    }
}

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 +- 0.25)`
///
/// Jitter spreads out reconnection storms from many dashboards.
pub fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powf(f64::from(attempt.min(16)));
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── SocketIoTransport ────────────────────────────────────────────────

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket-only Socket.IO client.
#[derive(Debug, Clone)]
pub struct SocketIoTransport {
    /// Server path of the Socket.IO endpoint. Default: `/socket.io/`.
    pub path: String,
    /// Namespace to join. Default: `/`.
    pub namespace: String,
    /// Bound on the WebSocket upgrade plus the Socket.IO handshake.
    pub connect_timeout: Duration,
}

impl Default for SocketIoTransport {
    fn default() -> Self {
        Self {
            path: "/socket.io/".into(),
            namespace: "/".into(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl Transport for SocketIoTransport {
    type Session = SocketIoSession;

    async fn connect(&self, server: &Url) -> Result<SocketIoSession, Error> {
        let endpoint = socketio::endpoint_url(server, &self.path)?;
        tracing::info!(url = %endpoint, "Connecting to realtime server");

        tokio::time::timeout(self.connect_timeout, self.handshake(endpoint))
            .await
            .map_err(|_| Error::Timeout {
                timeout_secs: self.connect_timeout.as_secs(),
            })?
    }
}

impl SocketIoTransport {
    async fn handshake(&self, endpoint: Url) -> Result<SocketIoSession, Error> {
        let (mut ws, _response) = tokio_tungstenite::connect_async(endpoint.as_str())
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        let handshake = loop {
            match socketio::decode_engine(&next_text(&mut ws).await?)? {
                EnginePacket::Open(handshake) => break handshake,
                EnginePacket::Noop => {}
                other => {
                    return Err(Error::Protocol(format!(
                        "expected open packet, got {other:?}"
                    )));
                }
            }
        };
        tracing::debug!(sid = %handshake.sid, "Engine.IO handshake complete");

        send_text(&mut ws, socketio::encode_connect(&self.namespace)).await?;

        loop {
            match socketio::decode_engine(&next_text(&mut ws).await?)? {
                EnginePacket::Ping(probe) => {
                    send_text(&mut ws, format!("{}{probe}", socketio::PONG)).await?;
                }
                EnginePacket::Message(payload) => match socketio::decode_socket(&payload)? {
                    SocketPacket::Connect { namespace, .. } if namespace == self.namespace => {
                        break;
                    }
                    SocketPacket::ConnectError { data, .. } => {
                        let message = data["message"]
                            .as_str()
                            .map_or_else(|| data.to_string(), str::to_owned);
                        return Err(Error::ConnectRefused(message));
                    }
                    other => tracing::trace!(?other, "ignoring packet before connect ack"),
                },
                EnginePacket::Close => {
                    return Err(Error::WebSocketConnect(
                        "server closed during handshake".into(),
                    ));
                }
                _ => {}
            }
        }

        tracing::info!("Realtime channel connected");
        Ok(SocketIoSession {
            ws,
            namespace: self.namespace.clone(),
            liveness: handshake.liveness_window(),
        })
    }
}

/// Read frames until a text frame arrives.
async fn next_text(ws: &mut WsStream) -> Result<String, Error> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = frame.map_or((1005, String::new()), |cf| {
                    (u16::from(cf.code), cf.reason.as_str().to_owned())
                });
                return Err(Error::WebSocketClosed { code, reason });
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
            None => return Err(Error::WebSocketConnect("stream ended".into())),
        }
    }
}

async fn send_text(ws: &mut WsStream, text: String) -> Result<(), Error> {
    ws.send(Message::Text(text.into()))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))
}

// ── SocketIoSession ──────────────────────────────────────────────────

/// An established Socket.IO connection.
pub struct SocketIoSession {
    ws: WsStream,
    namespace: String,
    liveness: Duration,
}

impl Session for SocketIoSession {
    async fn recv(&mut self) -> SessionEvent {
        loop {
            let Ok(frame) = tokio::time::timeout(self.liveness, self.ws.next()).await else {
                tracing::warn!(window = ?self.liveness, "No traffic from server, assuming dead");
                return SessionEvent::Closed(DisconnectReason::PingTimeout);
            };

            match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = self.handle_text(text.as_str()).await {
                        return event;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    if let Some(ref cf) = frame {
                        tracing::info!(code = %cf.code, reason = %cf.reason, "WebSocket close frame received");
                    } else {
                        tracing::info!("WebSocket close frame received (no payload)");
                    }
                    return SessionEvent::Closed(DisconnectReason::TransportClose);
                }
                Some(Ok(_)) => {
                    // Binary, Ping, Pong, Frame -- tungstenite answers pings itself
                }
                Some(Err(e)) => {
                    return SessionEvent::Closed(DisconnectReason::TransportError(e.to_string()));
                }
                None => {
                    tracing::info!("WebSocket stream ended");
                    return SessionEvent::Closed(DisconnectReason::TransportClose);
                }
            }
        }
    }

    async fn emit(&mut self, name: &str, data: &Value) -> Result<(), Error> {
        send_text(&mut self.ws, socketio::encode_event(&self.namespace, name, data)).await
    }

    async fn close(&mut self) {
        let _ = send_text(&mut self.ws, socketio::encode_disconnect(&self.namespace)).await;
        let _ = send_text(&mut self.ws, socketio::CLOSE.to_owned()).await;
        let _ = self.ws.close(None).await;
    }
}

impl SocketIoSession {
    /// Handle one engine packet. Returns `Some` when the caller should
    /// see an event.
    async fn handle_text(&mut self, text: &str) -> Option<SessionEvent> {
        let packet = match socketio::decode_engine(text) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::debug!(error = %e, "Dropping undecodable engine packet");
                return None;
            }
        };

        match packet {
            EnginePacket::Ping(probe) => {
                tracing::trace!("Engine.IO ping");
                if let Err(e) = send_text(&mut self.ws, format!("{}{probe}", socketio::PONG)).await
                {
                    return Some(SessionEvent::Closed(DisconnectReason::TransportError(
                        e.to_string(),
                    )));
                }
                None
            }
            EnginePacket::Close => Some(SessionEvent::Closed(DisconnectReason::TransportClose)),
            EnginePacket::Message(payload) => match socketio::decode_socket(&payload) {
                Ok(SocketPacket::Event {
                    namespace,
                    name,
                    data,
                    ..
                }) if namespace == self.namespace => Some(SessionEvent::Message { name, data }),
                Ok(SocketPacket::Disconnect { namespace }) if namespace == self.namespace => {
                    Some(SessionEvent::Closed(DisconnectReason::ServerDisconnect))
                }
                Ok(other) => {
                    tracing::trace!(?other, "Ignoring packet");
                    None
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Dropping undecodable socket packet");
                    None
                }
            },
            _ => None,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
