//! Legacy Grafana rule webhook adapter.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::non_empty;
use crate::alert::{AlertDetail, AlertState, EvalMatch, LegacyDetail, NormalizedAlert, ROUTING_TAG};
use crate::error::{DispatchError, Result};

/// Legacy Grafana webhook body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaWebhook {
    /// Notification title
    #[serde(default)]
    pub title: Option<String>,
    /// Rule name
    #[serde(default)]
    pub rule_name: Option<String>,
    /// Rule state (`alerting`, `ok`, `no_data`, `pending`, `paused`)
    #[serde(default)]
    pub state: Option<String>,
    /// Evaluated series
    #[serde(default)]
    pub eval_matches: Option<Vec<RawEvalMatch>>,
    /// Flat tag map
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
    /// Link to the rule
    #[serde(default)]
    pub rule_url: Option<String>,
    /// Rule message
    #[serde(default)]
    pub message: Option<String>,
    /// Rendered panel image
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Evaluated series as sent by Grafana.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvalMatch {
    /// Series value, `null` when the series has no data
    #[serde(default)]
    pub value: Option<f64>,
    /// Series name
    #[serde(default)]
    pub metric: String,
    /// Series tags
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
}

impl GrafanaWebhook {
    /// Whether a payload has the single-rule shape.
    #[must_use]
    pub fn matches(payload: &Value) -> bool {
        payload.get("state").is_some()
            && (payload.get("ruleId").is_some() || payload.get("ruleName").is_some())
    }

    /// Decode a webhook from an unwrapped payload.
    pub fn from_value(payload: Value) -> Result<Self> {
        serde_json::from_value(payload).map_err(|e| {
            DispatchError::AdaptationFailure(format!("invalid Grafana webhook: {e}"))
        })
    }

    /// Convert into a normalized alert.
    pub fn into_alert(self) -> Result<NormalizedAlert> {
        let rule_name = non_empty(self.rule_name);
        let title = non_empty(self.title);
        let name = rule_name.clone().or_else(|| title.clone()).ok_or_else(|| {
            DispatchError::AdaptationFailure(
                "Grafana webhook missing both ruleName and title".to_string(),
            )
        })?;
        let state = non_empty(self.state).ok_or_else(|| {
            DispatchError::AdaptationFailure(format!("Grafana webhook {name} missing state"))
        })?;

        let eval_matches = self
            .eval_matches
            .unwrap_or_default()
            .into_iter()
            .map(|m| EvalMatch {
                metric: m.metric,
                value: m.value,
                tags: m.tags.unwrap_or_default(),
            })
            .collect();

        let detail = LegacyDetail {
            rule_name,
            eval_matches,
            image_url: non_empty(self.image_url),
        };

        let mut alert = NormalizedAlert::new(
            name,
            AlertState::from_grafana(&state),
            state,
            AlertDetail::Legacy(detail),
        );

        let tags = self.tags.unwrap_or_default();
        alert.channel_tag = tags
            .get(ROUTING_TAG)
            .filter(|v| !v.trim().is_empty())
            .cloned();
        alert.source_tags = tags;
        alert.title = title;
        alert.description = non_empty(self.message);
        alert.url = non_empty(self.rule_url);

        Ok(alert)
    }
}
