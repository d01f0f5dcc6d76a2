// ── Alert normalization ──
//
// Raw `fire_alert` pushes carry only a confidence and a few sensor
// fields. The dashboard wants a full `Alert` record, so every hazard push
// is also published as `new_alert` in canonical form.

use chrono::{DateTime, SecondsFormat, Utc};

use super::{Alert, AlertSeverity, AlertStatus, AlertType, FireAlert};

const FIRE_TITLE: &str = "Fire Risk Detected";

/// Build the canonical alert record for a raw hazard push.
///
/// The output depends only on `raw` and `now`. Confidence values in
/// `[0, 1]` are fractions; anything above 1 is already a percentage.
pub fn normalize_fire_alert(raw: &FireAlert, now: DateTime<Utc>) -> Alert {
    let message = match raw.confidence {
        Some(confidence) if confidence.is_finite() => {
            let percent = if confidence <= 1.0 {
                confidence * 100.0
            } else {
                confidence
            };
            format!("Fire risk detected with {percent:.1}% confidence")
        }
        _ => "Fire risk detected (confidence unavailable)".to_owned(),
    };

    Alert {
        id: format!("alert_{}", now.timestamp_millis()),
        title: FIRE_TITLE.to_owned(),
        alert_type: AlertType::Fire,
        severity: AlertSeverity::Critical,
        message,
        timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        location: raw.location.clone(),
        sensor_id: raw.sensor_id.clone(),
        acknowledged: false,
        resolved: false,
        status: Some(AlertStatus::New),
        metadata: serde_json::to_value(raw).ok(),
    }
}
