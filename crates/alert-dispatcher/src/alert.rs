//! Canonical alert representation shared by every adapter.

use std::collections::BTreeMap;
use std::fmt;

use crate::priority::Priority;

/// Normalized alert state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    /// Threshold breached / alerting
    Firing,
    /// Recovered or resolved
    Ok,
    /// Source stopped reporting data
    NoData,
    /// Condition met but not yet for long enough
    Pending,
    /// Anything the source sent that we don't model
    Unknown,
}

impl AlertState {
    /// Map a CloudWatch alarm state (`ALARM`, `OK`, `INSUFFICIENT_DATA`).
    #[must_use]
    pub fn from_cloudwatch(value: &str) -> Self {
        match value {
            "ALARM" => Self::Firing,
            "OK" => Self::Ok,
            "INSUFFICIENT_DATA" => Self::NoData,
            _ => Self::Unknown,
        }
    }

    /// Map a legacy Grafana rule state (`alerting`, `ok`, `no_data`, `pending`).
    #[must_use]
    pub fn from_grafana(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "alerting" => Self::Firing,
            "ok" => Self::Ok,
            "no_data" => Self::NoData,
            "pending" => Self::Pending,
            _ => Self::Unknown,
        }
    }

    /// Map an Alertmanager batch status (`firing`, `resolved`).
    #[must_use]
    pub fn from_alertmanager(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "firing" => Self::Firing,
            "resolved" => Self::Ok,
            _ => Self::Unknown,
        }
    }
}

/// Which adapter produced an alert. Drives the message layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// CloudWatch alarm delivered through SNS/SQS
    CloudAlarm,
    /// Legacy Grafana rule webhook
    LegacyWebhook,
    /// Grafana unified alerting / Alertmanager webhook
    ModernWebhook,
}

impl SourceKind {
    /// Short identifier used in correlation ids and logs.
    #[must_use]
    pub const fn slug(&self) -> &'static str {
        match self {
            Self::CloudAlarm => "cloudwatch",
            Self::LegacyWebhook => "grafana",
            Self::ModernWebhook => "alertmanager",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Metric trigger of a CloudWatch alarm.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloudAlarmDetail {
    /// Metric namespace (e.g. `AWS/RDS`)
    pub namespace: String,
    /// Metric name
    pub metric_name: String,
    /// Statistic (Average, Sum, ...)
    pub statistic: Option<String>,
    /// Comparison operator (`GreaterThanThreshold`, ...)
    pub comparison_operator: String,
    /// Threshold value
    pub threshold: f64,
    /// Evaluation period in seconds
    pub period_secs: i64,
    /// Number of periods evaluated
    pub evaluation_periods: i64,
    /// Dimensions in the order the alarm lists them
    pub dimensions: Vec<(String, String)>,
    /// AWS account that owns the alarm
    pub account_id: Option<String>,
}

/// One evaluated series from a legacy Grafana rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalMatch {
    /// Series name
    pub metric: String,
    /// Evaluated value; Grafana sends `null` for series without data
    pub value: Option<f64>,
    /// Series tags
    pub tags: BTreeMap<String, String>,
}

/// Legacy Grafana rule specifics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyDetail {
    /// Rule name as configured in Grafana
    pub rule_name: Option<String>,
    /// Evaluated series
    pub eval_matches: Vec<EvalMatch>,
    /// Rendered panel image
    pub image_url: Option<String>,
}

/// Alertmanager-style batch specifics, taken from the first alert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModernDetail {
    /// Raw batch status
    pub status: String,
    /// Number of alerts in the batch
    pub alert_count: usize,
    /// String annotations other than description/summary
    pub annotations: BTreeMap<String, String>,
    /// Grafana `valueString`
    pub value_string: Option<String>,
    /// Silence link
    pub silence_url: Option<String>,
    /// Dashboard link
    pub dashboard_url: Option<String>,
}

/// Source-specific payload kept for rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertDetail {
    /// CloudWatch alarm
    CloudAlarm(CloudAlarmDetail),
    /// Legacy Grafana rule
    Legacy(LegacyDetail),
    /// Alertmanager batch
    Modern(ModernDetail),
}

/// Canonical alert produced by every adapter.
///
/// Constructed per inbound message and dropped once the outbound message
/// is rendered; nothing here is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedAlert {
    /// Alarm or rule identifier, never empty
    pub name: String,
    /// Human title when the source distinguishes it from the rule name
    pub title: Option<String>,
    /// Current state
    pub state: AlertState,
    /// State exactly as the source spelled it
    pub state_label: String,
    /// Previous state, when the source reports a transition
    pub previous_state: Option<AlertState>,
    /// Previous state as the source spelled it
    pub previous_state_label: Option<String>,
    /// Reason or description of the transition
    pub description: Option<String>,
    /// Dimensions, labels or tags
    pub source_tags: BTreeMap<String, String>,
    /// Cloud region
    pub region: Option<String>,
    /// Link to the rule or generator
    pub url: Option<String>,
    /// Display timestamp of the state change
    pub timestamp: Option<String>,
    /// Raw `channel` tag, routing metadata only
    pub channel_tag: Option<String>,
    /// Priority forced by the adapter
    pub forced_priority: Option<Priority>,
    /// Source-specific fields
    pub detail: AlertDetail,
}

impl NormalizedAlert {
    /// Create an alert with only the mandatory fields set.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        state: AlertState,
        state_label: impl Into<String>,
        detail: AlertDetail,
    ) -> Self {
        Self {
            name: name.into(),
            title: None,
            state,
            state_label: state_label.into(),
            previous_state: None,
            previous_state_label: None,
            description: None,
            source_tags: BTreeMap::new(),
            region: None,
            url: None,
            timestamp: None,
            channel_tag: None,
            forced_priority: None,
            detail,
        }
    }

    /// Adapter that produced this alert.
    #[must_use]
    pub const fn kind(&self) -> SourceKind {
        match self.detail {
            AlertDetail::CloudAlarm(_) => SourceKind::CloudAlarm,
            AlertDetail::Legacy(_) => SourceKind::LegacyWebhook,
            AlertDetail::Modern(_) => SourceKind::ModernWebhook,
        }
    }

    /// Metric namespace, for sources that have one.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        match &self.detail {
            AlertDetail::CloudAlarm(d) if !d.namespace.is_empty() => Some(&d.namespace),
            _ => None,
        }
    }

    /// Tags suitable for display, without routing-only keys.
    pub fn display_tags(&self) -> impl Iterator<Item = (&str, &str)> {
        self.source_tags
            .iter()
            .filter(|(k, v)| k.as_str() != ROUTING_TAG && !v.is_empty())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Tag key that carries routing metadata rather than alert content.
pub const ROUTING_TAG: &str = "channel";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_mappings() {
        assert_eq!(AlertState::from_cloudwatch("ALARM"), AlertState::Firing);
        assert_eq!(AlertState::from_cloudwatch("INSUFFICIENT_DATA"), AlertState::NoData);
        assert_eq!(AlertState::from_cloudwatch("alarm"), AlertState::Unknown);
        assert_eq!(AlertState::from_grafana("Alerting"), AlertState::Firing);
        assert_eq!(AlertState::from_grafana("no_data"), AlertState::NoData);
        assert_eq!(AlertState::from_grafana("paused"), AlertState::Unknown);
        assert_eq!(AlertState::from_alertmanager("RESOLVED"), AlertState::Ok);
    }

    #[test]
    fn test_kind_follows_detail() {
        let alert = NormalizedAlert::new(
            "x",
            AlertState::Ok,
            "OK",
            AlertDetail::Modern(ModernDetail::default()),
        );
        assert_eq!(alert.kind(), SourceKind::ModernWebhook);
        assert_eq!(alert.kind().slug(), "alertmanager");
    }

    #[test]
    fn test_display_tags_skip_channel_and_empty() {
        let mut alert = NormalizedAlert::new(
            "x",
            AlertState::Firing,
            "alerting",
            AlertDetail::Legacy(LegacyDetail::default()),
        );
        alert.source_tags.insert("channel".into(), "P0".into());
        alert.source_tags.insert("team".into(), "payments".into());
        alert.source_tags.insert("empty".into(), String::new());

        let tags: Vec<_> = alert.display_tags().collect();
        assert_eq!(tags, vec![("team", "payments")]);
    }
}
