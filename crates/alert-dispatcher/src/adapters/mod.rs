//! Format detection and per-source adapters.
//!
//! Detection is structural, never based on a type tag the sender controls:
//!
//! 1. Object with a non-empty `alerts` array -> [`alertmanager`]
//! 2. Object with `state` plus `ruleId` or `ruleName` -> [`grafana`]
//! 3. Anything else -> [`cloudwatch`], which fails without `AlarmName`/`NewStateValue`

pub mod alertmanager;
pub mod cloudwatch;
pub mod grafana;

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use crate::alert::{NormalizedAlert, SourceKind};
use crate::envelope;
use crate::error::{DispatchError, Result};

pub use alertmanager::AlertmanagerWebhook;
pub use cloudwatch::CloudWatchAlarm;
pub use grafana::GrafanaWebhook;

/// A payload decoded into exactly one of the supported source shapes.
#[derive(Debug, Clone)]
pub enum AlertPayload {
    /// Grafana unified alerting / Alertmanager batch
    Modern(AlertmanagerWebhook),
    /// Legacy Grafana rule webhook
    Legacy(GrafanaWebhook),
    /// CloudWatch alarm
    CloudAlarm(CloudWatchAlarm),
}

impl AlertPayload {
    /// Select and decode the matching source shape.
    pub fn detect(payload: Value) -> Result<Self> {
        if !payload.is_object() {
            return Err(DispatchError::UnrecognizedFormat(format!(
                "expected a JSON object, got {}",
                json_type(&payload)
            )));
        }

        if AlertmanagerWebhook::matches(&payload) {
            return Ok(Self::Modern(AlertmanagerWebhook::from_value(payload)));
        }

        if GrafanaWebhook::matches(&payload) {
            return GrafanaWebhook::from_value(payload).map(Self::Legacy);
        }

        CloudWatchAlarm::from_value(payload).map(Self::CloudAlarm)
    }

    /// Source kind of the decoded payload.
    #[must_use]
    pub const fn kind(&self) -> SourceKind {
        match self {
            Self::Modern(_) => SourceKind::ModernWebhook,
            Self::Legacy(_) => SourceKind::LegacyWebhook,
            Self::CloudAlarm(_) => SourceKind::CloudAlarm,
        }
    }

    /// Convert into the canonical representation.
    pub fn normalize(self) -> Result<NormalizedAlert> {
        match self {
            Self::Modern(webhook) => webhook.into_alert(),
            Self::Legacy(webhook) => webhook.into_alert(),
            Self::CloudAlarm(alarm) => alarm.into_alert(),
        }
    }
}

/// Detect and normalize an already unwrapped payload.
pub fn adapt(payload: Value) -> Result<NormalizedAlert> {
    let detected = AlertPayload::detect(payload)?;
    debug!(source = %detected.kind(), "Detected alert format");
    detected.normalize()
}

/// Unwrap, detect and normalize a raw message body.
pub fn adapt_body(body: &str) -> Result<NormalizedAlert> {
    adapt(envelope::unwrap_body(body)?)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// =============================================================================
// Field access for untyped payloads
// =============================================================================

/// Non-empty string field, or `None` when missing or not a string.
pub(crate) fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Object field, or `None` when missing or not an object.
pub(crate) fn object_field<'a>(value: &'a Value, key: &str) -> Option<&'a Map<String, Value>> {
    value.get(key).and_then(Value::as_object)
}

/// Non-empty string field of an optional map.
pub(crate) fn map_str<'a>(map: Option<&'a Map<String, Value>>, key: &str) -> Option<&'a str> {
    map.and_then(|m| m.get(key))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// String-valued entries of an optional map; other value types are dropped.
pub(crate) fn string_entries(map: Option<&Map<String, Value>>) -> BTreeMap<String, String> {
    map.into_iter()
        .flatten()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
        .collect()
}

/// Treat empty strings as absent.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detects_alertmanager_batch() {
        let payload = json!({
            "status": "firing",
            "alerts": [{"labels": {"alertname": "HighLatency"}}]
        });
        let detected = AlertPayload::detect(payload).unwrap();
        assert_eq!(detected.kind(), SourceKind::ModernWebhook);
    }

    #[test]
    fn test_empty_alert_list_is_not_modern() {
        let payload = json!({"alerts": [], "ruleName": "cpu", "state": "ok"});
        let detected = AlertPayload::detect(payload).unwrap();
        assert_eq!(detected.kind(), SourceKind::LegacyWebhook);
    }

    #[test]
    fn test_detects_legacy_rule_alert() {
        let payload = json!({"ruleId": 7, "state": "alerting", "title": "[Alerting] cpu"});
        let detected = AlertPayload::detect(payload).unwrap();
        assert_eq!(detected.kind(), SourceKind::LegacyWebhook);
    }

    #[test]
    fn test_falls_back_to_cloud_alarm() {
        let payload = json!({"AlarmName": "disk-full", "NewStateValue": "ALARM"});
        let detected = AlertPayload::detect(payload).unwrap();
        assert_eq!(detected.kind(), SourceKind::CloudAlarm);
    }

    #[test]
    fn test_unknown_object_fails_adaptation() {
        let err = adapt(json!({"hello": "world"})).unwrap_err();
        assert!(matches!(err, DispatchError::AdaptationFailure(_)));
    }

    #[test]
    fn test_non_object_is_unrecognized() {
        let err = adapt(json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, DispatchError::UnrecognizedFormat(_)));
        let err = adapt(json!("ALARM")).unwrap_err();
        assert!(matches!(err, DispatchError::UnrecognizedFormat(_)));
    }

    #[test]
    fn test_string_entries_drop_non_strings() {
        let value = json!({"labels": {"a": "1", "b": 2, "c": null, "d": "x"}});
        let entries = string_entries(object_field(&value, "labels"));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.get("d").map(String::as_str), Some("x"));
    }

    #[test]
    fn test_field_helpers_tolerate_wrong_types() {
        let value = json!({"labels": "not-a-map", "name": 5});
        assert!(object_field(&value, "labels").is_none());
        assert!(str_field(&value, "name").is_none());
        assert!(map_str(None, "anything").is_none());
    }
}
