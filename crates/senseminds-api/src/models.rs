// Wire models for the SenseMinds backend.
//
// Shared by the REST client and the realtime channel: the backend pushes the
// same shapes over Socket.IO that it serves from `/sensors/current`,
// `/ml/current`, and friends. Every struct keeps unknown fields in `extra`
// so nothing the backend sends is silently dropped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Alerts ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Fire,
    Gas,
    Temperature,
    Humidity,
    System,
    Security,
    Medical,
    Crime,
    NaturalDisaster,
    Sensor,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    New,
    Acknowledged,
    Resolved,
    FalseAlarm,
}

/// An alert record, as returned by `/alerts/recent` and as published on the
/// `new_alert` / `alert_update` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub alert_type: AlertType,
    #[serde(default)]
    pub severity: AlertSeverity,
    #[serde(default)]
    pub message: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_id: Option<String>,
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AlertStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Raw hazard alert as pushed on the `fire_alert` channel event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FireAlert {
    /// Model confidence, either a fraction (`0.873`) or a percentage (`87.3`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Sensors / ML / health ───────────────────────────────────────────

/// Current environmental readings (`GET /sensors/current`, `sensor_update`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub readings: BTreeMap<String, f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Current ML risk analysis (`GET /ml/current`, `ml_analysis`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MlPrediction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub predictions: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Backend health record (`GET /system/health`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub services: BTreeMap<String, String>,
    #[serde(default)]
    pub uptime: f64,
    #[serde(
        rename = "lastCheck",
        alias = "last_check",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_check: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Response envelopes ──────────────────────────────────────────────

/// `{ "data": ... }` wrapper used by several endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct DataEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AlertsPayload {
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

/// The alerts endpoint has shipped in three shapes over time.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum AlertsBody {
    Wrapped { data: AlertsPayload },
    Direct(AlertsPayload),
    Bare(Vec<Alert>),
}

impl AlertsBody {
    pub fn into_alerts(self) -> Vec<Alert> {
        match self {
            Self::Wrapped { data } | Self::Direct(data) => data.alerts,
            Self::Bare(alerts) => alerts,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn alert_tolerates_unknown_type() {
        let alert: Alert = serde_json::from_value(json!({
            "id": "alert_1",
            "title": "Vibration",
            "type": "vibration",
            "severity": "high",
            "message": "Unusual vibration",
            "timestamp": "2026-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(alert.alert_type, AlertType::Other);
        assert_eq!(alert.severity, AlertSeverity::High);
        assert!(!alert.acknowledged);
    }

    #[test]
    fn sensor_snapshot_keeps_extra_fields() {
        let snap: SensorSnapshot = serde_json::from_value(json!({
            "timestamp": "2026-01-01T00:00:00Z",
            "readings": { "temperature": 25.5, "smoke_level": 0.2 },
            "summary": { "total_sensors": 5 }
        }))
        .unwrap();

        assert_eq!(snap.readings.get("temperature"), Some(&25.5));
        assert_eq!(snap.extra["summary"]["total_sensors"], 5);
    }

    #[test]
    fn health_accepts_both_last_check_spellings() {
        let camel: SystemHealth =
            serde_json::from_value(json!({ "status": "healthy", "lastCheck": "t1" })).unwrap();
        let snake: SystemHealth =
            serde_json::from_value(json!({ "status": "healthy", "last_check": "t2" })).unwrap();

        assert_eq!(camel.last_check.as_deref(), Some("t1"));
        assert_eq!(snake.last_check.as_deref(), Some("t2"));
    }

    #[test]
    fn alerts_body_shapes() {
        let wrapped: AlertsBody = serde_json::from_value(json!({
            "data": { "alerts": [{ "id": "a", "timestamp": "t" }], "status": "ok" }
        }))
        .unwrap();
        let direct: AlertsBody = serde_json::from_value(json!({
            "alerts": [{ "id": "b", "timestamp": "t" }], "total_count": 1
        }))
        .unwrap();
        let bare: AlertsBody =
            serde_json::from_value(json!([{ "id": "c", "timestamp": "t" }])).unwrap();

        assert_eq!(wrapped.into_alerts()[0].id, "a");
        assert_eq!(direct.into_alerts()[0].id, "b");
        assert_eq!(bare.into_alerts()[0].id, "c");
    }

    #[test]
    fn fire_alert_round_trips_unknown_fields() {
        let raw = json!({ "confidence": 0.91, "zone": "B2", "smoke_level": 0.7 });
        let alert: FireAlert = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(alert.confidence, Some(0.91));
        assert_eq!(serde_json::to_value(&alert).unwrap(), raw);
    }
}
