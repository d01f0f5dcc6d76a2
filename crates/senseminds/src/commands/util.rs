//! Shared helpers for command handlers.

use std::fmt::Write as _;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use senseminds_core::{
    AlertSeverity, Event, EventKind, RealtimeService, StatusUpdate, Topic, TransportMode,
    listener, topic,
};

use crate::error::CliError;
use crate::output::Tone;

/// Forward every bus event into `tx` as an owned [`Event`].
pub fn tap_all(service: &RealtimeService, tx: &UnboundedSender<Event>) {
    macro_rules! forward {
        ($($name:ident),* $(,)?) => {$(
            let sink = tx.clone();
            service.on::<topic::$name>(listener(
                move |payload: &<topic::$name as Topic>::Payload| {
                    let _ = sink.send(Event::$name(payload.clone()));
                },
            ));
        )*};
    }

    forward!(
        NewAlert,
        AlertUpdate,
        SystemStatusUpdate,
        SensorUpdate,
        MlAnalysis,
        PatternAnalysis,
        FireAlert,
        PipelineSummary,
        Status,
        ConnectionStatus,
    );
}

/// Parse `--event` values into kinds.
pub fn parse_kinds(raw: &[String]) -> Result<Vec<EventKind>, CliError> {
    raw.iter()
        .map(|name| {
            EventKind::from_str(name.trim()).map_err(|_| CliError::Validation {
                field: "event".into(),
                reason: format!("unknown event kind '{name}'"),
            })
        })
        .collect()
}

/// Serializable form of an event for structured output.
#[derive(Debug, Serialize)]
pub struct EventRecord {
    pub event: EventKind,
    pub data: Value,
}

impl From<&Event> for EventRecord {
    fn from(event: &Event) -> Self {
        Self {
            event: event.kind(),
            data: event.payload_json(),
        }
    }
}

fn join_pairs<V: std::fmt::Display>(pairs: impl IntoIterator<Item = (impl AsRef<str>, V)>) -> String {
    let mut out = String::new();
    for (key, value) in pairs {
        if !out.is_empty() {
            out.push(' ');
        }
        let _ = write!(out, "{}={value}", key.as_ref());
    }
    out
}

fn compact(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One-line human summary of an event.
pub fn summarize(event: &Event) -> String {
    match event {
        Event::NewAlert(alert) | Event::AlertUpdate(alert) => {
            let mut line = format!("[{:?}] {}", alert.severity, alert.title);
            if !alert.message.is_empty() {
                let _ = write!(line, ": {}", alert.message);
            }
            if let Some(location) = &alert.location {
                let _ = write!(line, " @ {location}");
            }
            line
        }
        Event::SystemStatusUpdate(StatusUpdate::Sensor(_)) => "sensor readings refreshed".into(),
        Event::SystemStatusUpdate(StatusUpdate::Ml(_)) => "ml analysis refreshed".into(),
        Event::SystemStatusUpdate(StatusUpdate::Health(health)) => {
            let services = join_pairs(&health.services);
            if services.is_empty() {
                format!("health {}", health.status)
            } else {
                format!("health {} ({services})", health.status)
            }
        }
        Event::SensorUpdate(snapshot) => join_pairs(&snapshot.readings),
        Event::MlAnalysis(prediction) => join_pairs(
            prediction
                .predictions
                .iter()
                .map(|(key, value)| (key, compact(value))),
        ),
        Event::FireAlert(raw) => match raw.confidence {
            Some(confidence) => format!("confidence={confidence}"),
            None => "confidence unavailable".into(),
        },
        Event::PatternAnalysis(value) | Event::PipelineSummary(value) | Event::Status(value) => {
            compact(value)
        }
        Event::ConnectionStatus(status) => match &status.reason {
            Some(reason) => format!("{} ({reason})", status.mode),
            None => status.mode.to_string(),
        },
    }
}

/// Color hint for an event line.
pub fn tone(event: &Event) -> Tone {
    match event {
        Event::NewAlert(alert) | Event::AlertUpdate(alert) => match alert.severity {
            AlertSeverity::Critical | AlertSeverity::High => Tone::Bad,
            AlertSeverity::Medium => Tone::Warn,
            AlertSeverity::Low => Tone::Plain,
        },
        Event::FireAlert(_) => Tone::Bad,
        Event::ConnectionStatus(status) => match status.mode {
            TransportMode::Websocket => Tone::Good,
            TransportMode::Fallback => Tone::Warn,
            TransportMode::Disconnected => Tone::Muted,
        },
        _ => Tone::Info,
    }
}
