// ── Event vocabulary ──

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use super::{Alert, FireAlert, MlPrediction, SensorSnapshot, SystemHealth};

/// Public event names. Additive: new kinds may appear, existing names
/// never change meaning.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
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
}

/// Which channel is currently feeding the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Websocket,
    Fallback,
    Disconnected,
}

/// Payload of `connection_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub mode: TransportMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ConnectionStatus {
    pub fn websocket() -> Self {
        Self {
            connected: true,
            mode: TransportMode::Websocket,
            reason: None,
        }
    }

    pub fn fallback(reason: Option<String>) -> Self {
        Self {
            connected: false,
            mode: TransportMode::Fallback,
            reason,
        }
    }

    pub fn disconnected(reason: Option<String>) -> Self {
        Self {
            connected: false,
            mode: TransportMode::Disconnected,
            reason,
        }
    }
}

/// Payload of `system_status_update`: whichever status source just reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "data", rename_all = "snake_case")]
pub enum StatusUpdate {
    Sensor(SensorSnapshot),
    Ml(MlPrediction),
    Health(SystemHealth),
}

/// A typed domain event, one variant per [`EventKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    NewAlert(Alert),
    AlertUpdate(Alert),
    SystemStatusUpdate(StatusUpdate),
    SensorUpdate(SensorSnapshot),
    MlAnalysis(MlPrediction),
    PatternAnalysis(Value),
    FireAlert(FireAlert),
    PipelineSummary(Value),
    Status(Value),
    ConnectionStatus(ConnectionStatus),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::NewAlert(_) => EventKind::NewAlert,
            Self::AlertUpdate(_) => EventKind::AlertUpdate,
            Self::SystemStatusUpdate(_) => EventKind::SystemStatusUpdate,
            Self::SensorUpdate(_) => EventKind::SensorUpdate,
            Self::MlAnalysis(_) => EventKind::MlAnalysis,
            Self::PatternAnalysis(_) => EventKind::PatternAnalysis,
            Self::FireAlert(_) => EventKind::FireAlert,
            Self::PipelineSummary(_) => EventKind::PipelineSummary,
            Self::Status(_) => EventKind::Status,
            Self::ConnectionStatus(_) => EventKind::ConnectionStatus,
        }
    }

    /// Sensor readings fan out to `sensor_update` and `system_status_update`.
    ///
    /// Used by both the live channel and fallback polling so consumers see
    /// the same events regardless of source.
    pub fn sensor_fanout(snapshot: SensorSnapshot) -> [Event; 2] {
        let mirrored = StatusUpdate::Sensor(snapshot.clone());
        [
            Event::SensorUpdate(snapshot),
            Event::SystemStatusUpdate(mirrored),
        ]
    }

    /// ML results fan out to `ml_analysis` and `system_status_update`.
    pub fn ml_fanout(prediction: MlPrediction) -> [Event; 2] {
        let mirrored = StatusUpdate::Ml(prediction.clone());
        [
            Event::MlAnalysis(prediction),
            Event::SystemStatusUpdate(mirrored),
        ]
    }

    /// Serialize the payload for display or forwarding.
    pub fn payload_json(&self) -> Value {
        let result = match self {
            Self::NewAlert(a) | Self::AlertUpdate(a) => serde_json::to_value(a),
            Self::SystemStatusUpdate(s) => serde_json::to_value(s),
            Self::SensorUpdate(s) => serde_json::to_value(s),
            Self::MlAnalysis(m) => serde_json::to_value(m),
            Self::FireAlert(f) => serde_json::to_value(f),
            Self::ConnectionStatus(c) => serde_json::to_value(c),
            Self::PatternAnalysis(v) | Self::PipelineSummary(v) | Self::Status(v) => {
                return v.clone();
            }
        };
        result.unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;
    use serde_json::json;
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn kind_names_are_snake_case() {
        let names: Vec<&'static str> = EventKind::iter().map(Into::into).collect();
        assert_eq!(
            names,
            [
                "new_alert",
                "alert_update",
                "system_status_update",
                "sensor_update",
                "ml_analysis",
                "pattern_analysis",
                "fire_alert",
                "pipeline_summary",
                "status",
                "connection_status",
            ]
        );
        assert_eq!(EventKind::from_str("ml_analysis").unwrap(), EventKind::MlAnalysis);
    }

    #[test]
    fn connection_status_serializes_without_empty_reason() {
        let value = serde_json::to_value(ConnectionStatus::websocket()).unwrap();
        assert_eq!(value, json!({ "connected": true, "mode": "websocket" }));

        let value =
            serde_json::to_value(ConnectionStatus::fallback(Some("gave up".into()))).unwrap();
        assert_eq!(
            value,
            json!({ "connected": false, "mode": "fallback", "reason": "gave up" })
        );
    }

    #[test]
    fn status_update_is_tagged_by_source() {
        let update = StatusUpdate::Health(SystemHealth {
            status: "healthy".into(),
            ..SystemHealth::default()
        });
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["source"], "health");
        assert_eq!(value["data"]["status"], "healthy");
    }

    #[test]
    fn sensor_fanout_order() {
        let [first, second] = Event::sensor_fanout(SensorSnapshot::default());
        assert_eq!(first.kind(), EventKind::SensorUpdate);
        assert_eq!(second.kind(), EventKind::SystemStatusUpdate);
    }
}
