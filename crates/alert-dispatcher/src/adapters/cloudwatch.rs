//! CloudWatch alarm adapter.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::non_empty;
use crate::alert::{AlertDetail, AlertState, CloudAlarmDetail, NormalizedAlert};
use crate::error::{DispatchError, Result};

/// Timestamp layout CloudWatch uses for `StateChangeTime`
/// (e.g. `2025-07-23T13:32:26.882+0000`).
const STATE_CHANGE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// CloudWatch alarm notification.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CloudWatchAlarm {
    /// Alarm name
    #[serde(default)]
    pub alarm_name: Option<String>,
    /// Owning account
    #[serde(default, rename = "AWSAccountId")]
    pub aws_account_id: Option<String>,
    /// State after the transition
    #[serde(default)]
    pub new_state_value: Option<String>,
    /// State before the transition
    #[serde(default)]
    pub old_state_value: Option<String>,
    /// Why the state changed
    #[serde(default)]
    pub new_state_reason: Option<String>,
    /// When the state changed
    #[serde(default)]
    pub state_change_time: Option<String>,
    /// Region display name
    #[serde(default)]
    pub region: Option<String>,
    /// Metric trigger
    #[serde(default)]
    pub trigger: Option<Trigger>,
}

/// Metric trigger section of an alarm.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Trigger {
    /// Metric name
    #[serde(default)]
    pub metric_name: Option<String>,
    /// Metric namespace
    #[serde(default)]
    pub namespace: Option<String>,
    /// Statistic
    #[serde(default)]
    pub statistic: Option<String>,
    /// Comparison operator
    #[serde(default)]
    pub comparison_operator: Option<String>,
    /// Threshold
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Period in seconds
    #[serde(default)]
    pub period: Option<i64>,
    /// Evaluation periods
    #[serde(default)]
    pub evaluation_periods: Option<i64>,
    /// Dimensions
    #[serde(default)]
    pub dimensions: Option<Vec<Dimension>>,
}

/// Metric dimension.
#[derive(Debug, Clone, Deserialize)]
pub struct Dimension {
    /// Dimension name
    #[serde(alias = "Name")]
    pub name: String,
    /// Dimension value
    #[serde(alias = "Value")]
    pub value: String,
}

impl CloudWatchAlarm {
    /// Decode an alarm from an unwrapped payload.
    pub fn from_value(payload: Value) -> Result<Self> {
        serde_json::from_value(payload).map_err(|e| {
            DispatchError::AdaptationFailure(format!("invalid CloudWatch alarm: {e}"))
        })
    }

    /// Convert into a normalized alert.
    pub fn into_alert(self) -> Result<NormalizedAlert> {
        let name = non_empty(self.alarm_name).ok_or_else(|| {
            DispatchError::AdaptationFailure("CloudWatch alarm missing AlarmName".to_string())
        })?;
        let new_state = non_empty(self.new_state_value).ok_or_else(|| {
            DispatchError::AdaptationFailure(format!(
                "CloudWatch alarm {name} missing NewStateValue"
            ))
        })?;

        let trigger = self.trigger.unwrap_or_default();
        let dimensions: Vec<(String, String)> = trigger
            .dimensions
            .unwrap_or_default()
            .into_iter()
            .map(|d| (d.name, d.value))
            .collect();

        let detail = CloudAlarmDetail {
            namespace: trigger.namespace.unwrap_or_default(),
            metric_name: trigger.metric_name.unwrap_or_default(),
            statistic: non_empty(trigger.statistic),
            comparison_operator: trigger.comparison_operator.unwrap_or_default(),
            threshold: trigger.threshold.unwrap_or_default(),
            period_secs: trigger.period.unwrap_or_default(),
            evaluation_periods: trigger.evaluation_periods.unwrap_or_default(),
            dimensions: dimensions.clone(),
            account_id: non_empty(self.aws_account_id),
        };

        let mut alert = NormalizedAlert::new(
            name,
            AlertState::from_cloudwatch(&new_state),
            new_state,
            AlertDetail::CloudAlarm(detail),
        );

        if let Some(old_state) = non_empty(self.old_state_value) {
            alert.previous_state = Some(AlertState::from_cloudwatch(&old_state));
            alert.previous_state_label = Some(old_state);
        }
        alert.description = non_empty(self.new_state_reason);
        alert.source_tags = dimensions.into_iter().collect();
        alert.region = non_empty(self.region);
        alert.timestamp = non_empty(self.state_change_time).map(|t| format_state_change_time(&t));

        Ok(alert)
    }
}

/// Render a CloudWatch timestamp as `YYYY-MM-DD HH:MM:SS UTC`.
///
/// Unparseable input is returned unchanged.
#[must_use]
pub fn format_state_change_time(raw: &str) -> String {
    DateTime::parse_from_str(raw, STATE_CHANGE_TIME_FORMAT).map_or_else(
        |_| raw.to_string(),
        |t| {
            t.with_timezone(&Utc)
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string()
        },
    )
}
