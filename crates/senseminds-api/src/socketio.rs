//! Minimal Socket.IO v5 / Engine.IO v4 client framing.
//!
//! Only the subset needed by a WebSocket-only client is implemented:
//! the open handshake, ping/pong, namespace connect/disconnect and text
//! events. Binary attachments are rejected.
//!
//! Frame layout over the WebSocket (one packet per text frame):
//!
//! ```text
//! 0{"sid":"..","pingInterval":25000,"pingTimeout":20000}   engine open
//! 2 / 3                                                    engine ping / pong
//! 40                                                       socket connect "/"
//! 42["sensor_update",{"readings":{..}}]                    socket event
//! 41                                                       socket disconnect
//! ```

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::Error;

/// Reply to an engine-level ping.
pub const PONG: &str = "3";

/// Engine-level close, sent before dropping the WebSocket.
pub const CLOSE: &str = "1";

// ── Engine.IO ────────────────────────────────────────────────────────

/// Parameters the server sends in the `0` open packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl Handshake {
    /// How long the client may go without hearing from the server before
    /// the connection counts as dead.
    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

/// A decoded Engine.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    /// Socket.IO payload carried by a `4` packet (still encoded).
    Message(String),
    Upgrade,
    Noop,
}

/// Decode a single Engine.IO packet from a WebSocket text frame.
pub fn decode_engine(frame: &str) -> Result<EnginePacket, Error> {
    let mut chars = frame.chars();
    let kind = chars
        .next()
        .ok_or_else(|| Error::Protocol("empty engine packet".into()))?;
    let rest = chars.as_str();

    match kind {
        '0' => serde_json::from_str(rest)
            .map(EnginePacket::Open)
            .map_err(|e| Error::Protocol(format!("invalid open packet: {e}"))),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping(rest.to_owned())),
        '3' => Ok(EnginePacket::Pong(rest.to_owned())),
        '4' => Ok(EnginePacket::Message(rest.to_owned())),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(Error::Protocol(format!("unknown engine packet type '{other}'"))),
    }
}

// ── Socket.IO ────────────────────────────────────────────────────────

/// A decoded Socket.IO packet (the payload of an engine `4` packet).
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack_id: Option<u64>,
        name: String,
        data: Value,
    },
    Ack {
        namespace: String,
        ack_id: u64,
        data: Value,
    },
    ConnectError {
        namespace: String,
        data: Value,
    },
}

/// Decode a Socket.IO packet.
pub fn decode_socket(payload: &str) -> Result<SocketPacket, Error> {
    let mut chars = payload.chars();
    let kind = chars
        .next()
        .ok_or_else(|| Error::Protocol("empty socket packet".into()))?;
    let mut rest = chars.as_str();

    if matches!(kind, '5' | '6') {
        return Err(Error::Protocol("binary packets are not supported".into()));
    }

    let mut namespace = String::from("/");
    if rest.starts_with('/') {
        let (ns, tail) = rest.split_once(',').unwrap_or((rest, ""));
        ns.clone_into(&mut namespace);
        rest = tail;
    }

    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    let ack_id = if digits > 0 {
        let (id, tail) = rest.split_at(digits);
        rest = tail;
        Some(
            id.parse::<u64>()
                .map_err(|e| Error::Protocol(format!("invalid ack id: {e}")))?,
        )
    } else {
        None
    };

    let body = if rest.is_empty() {
        None
    } else {
        Some(
            serde_json::from_str::<Value>(rest)
                .map_err(|e| Error::Protocol(format!("invalid packet body: {e}")))?,
        )
    };

    match kind {
        '0' => Ok(SocketPacket::Connect {
            namespace,
            data: body,
        }),
        '1' => Ok(SocketPacket::Disconnect { namespace }),
        '2' => {
            let (name, data) = split_event(body)?;
            Ok(SocketPacket::Event {
                namespace,
                ack_id,
                name,
                data,
            })
        }
        '3' => Ok(SocketPacket::Ack {
            namespace,
            ack_id: ack_id.ok_or_else(|| Error::Protocol("ack without id".into()))?,
            data: body.unwrap_or(Value::Null),
        }),
        '4' => Ok(SocketPacket::ConnectError {
            namespace,
            data: body.unwrap_or(Value::Null),
        }),
        other => Err(Error::Protocol(format!("unknown socket packet type '{other}'"))),
    }
}

/// Split an event body `["name", arg, ...]` into name + payload.
///
/// A single argument is returned as-is; several arguments come back as an
/// array; no argument yields `null`.
fn split_event(body: Option<Value>) -> Result<(String, Value), Error> {
    let Some(Value::Array(mut items)) = body else {
        return Err(Error::Protocol("event body is not an array".into()));
    };
    if items.is_empty() {
        return Err(Error::Protocol("event without a name".into()));
    }
    let Value::String(name) = items.remove(0) else {
        return Err(Error::Protocol("event name is not a string".into()));
    };
    let data = match items.len() {
        0 => Value::Null,
        1 => items.remove(0),
        _ => Value::Array(items),
    };
    Ok((name, data))
}

// ── Encoding ─────────────────────────────────────────────────────────

fn namespace_prefix(namespace: &str) -> String {
    if namespace == "/" {
        String::new()
    } else {
        format!("{namespace},")
    }
}

/// Engine message carrying a Socket.IO connect for `namespace`.
pub fn encode_connect(namespace: &str) -> String {
    format!("40{}", namespace_prefix(namespace))
}

/// Engine message carrying a Socket.IO disconnect for `namespace`.
pub fn encode_disconnect(namespace: &str) -> String {
    format!("41{}", namespace_prefix(namespace))
}

/// Engine message carrying a Socket.IO event `[name, data]`.
pub fn encode_event(namespace: &str, name: &str, data: &Value) -> String {
    let body = Value::Array(vec![Value::String(name.to_owned()), data.clone()]);
    format!("42{}{body}", namespace_prefix(namespace))
}

// ── Endpoint ─────────────────────────────────────────────────────────

/// Derive the WebSocket endpoint from a Socket.IO server URL.
///
/// `http://host:5000` → `ws://host:5000/socket.io/?EIO=4&transport=websocket`
pub fn endpoint_url(server: &Url, path: &str) -> Result<Url, Error> {
    let scheme = match server.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::WebSocketConnect(format!(
                "unsupported URL scheme '{other}'"
            )));
        }
    };
    let host = server
        .host_str()
        .ok_or_else(|| Error::WebSocketConnect(format!("URL has no host: {server}")))?;
    let path = format!("/{}/", path.trim_matches('/'));
    let authority = match server.port() {
        Some(p) => format!("{host}:{p}"),
        None => host.to_owned(),
    };

    let mut url = Url::parse(&format!("{scheme}://{authority}{path}"))?;
    url.query_pairs_mut()
        .append_pair("EIO", "4")
        .append_pair("transport", "websocket");
    Ok(url)
}

// ── Tests ────────────────────────────────────────────────────────────
