//! Grafana unified alerting / Alertmanager webhook adapter.
//!
//! The batch body is kept as untyped JSON: label and annotation maps vary per
//! rule and Grafana versions disagree on field types. Every lookup degrades to
//! absence instead of failing the whole batch.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use super::{map_str, object_field, str_field, string_entries};
use crate::alert::{AlertDetail, AlertState, ModernDetail, NormalizedAlert, ROUTING_TAG};
use crate::error::{DispatchError, Result};
use crate::priority::Priority;

/// Case-insensitive markers of a data-source outage rather than a threshold breach.
pub const NO_DATA_INDICATORS: &[&str] = &["nodata", "no data", "data source"];

/// Annotation keys rendered as the description line.
const DESCRIPTION_KEYS: &[&str] = &["description", "summary"];

/// Alertmanager-style webhook batch.
#[derive(Debug, Clone)]
pub struct AlertmanagerWebhook {
    payload: Value,
}

impl AlertmanagerWebhook {
    /// Whether a payload carries a non-empty `alerts` list.
    #[must_use]
    pub fn matches(payload: &Value) -> bool {
        payload
            .get("alerts")
            .and_then(Value::as_array)
            .is_some_and(|alerts| !alerts.is_empty())
    }

    /// Wrap an unwrapped payload. Never fails; missing fields surface later.
    #[must_use]
    pub const fn from_value(payload: Value) -> Self {
        Self { payload }
    }

    /// Alerts in the batch.
    #[must_use]
    pub fn alerts(&self) -> &[Value] {
        self.payload
            .get("alerts")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Batch status (`firing` / `resolved`), empty when absent.
    #[must_use]
    pub fn status(&self) -> &str {
        str_field(&self.payload, "status").unwrap_or_default()
    }

    fn common_labels(&self) -> Option<&Map<String, Value>> {
        object_field(&self.payload, "commonLabels")
    }

    fn first_alert(&self) -> Option<&Value> {
        self.alerts().first()
    }

    fn first_labels(&self) -> Option<&Map<String, Value>> {
        self.first_alert().and_then(|a| object_field(a, "labels"))
    }

    fn first_annotations(&self) -> Option<&Map<String, Value>> {
        self.first_alert().and_then(|a| object_field(a, "annotations"))
    }

    /// Alert name: common label, then the first alert's label, then the batch title.
    #[must_use]
    pub fn alert_name(&self) -> Option<&str> {
        map_str(self.common_labels(), "alertname")
            .or_else(|| map_str(self.first_labels(), "alertname"))
            .or_else(|| str_field(&self.payload, "title"))
    }

    /// Explicit `channel` label: common labels first, then the first alert.
    #[must_use]
    pub fn channel_tag(&self) -> Option<&str> {
        map_str(self.common_labels(), ROUTING_TAG)
            .or_else(|| map_str(self.first_labels(), ROUTING_TAG))
            .filter(|tag| !tag.trim().is_empty())
    }

    /// Whether a firing batch contains an alert about missing data.
    #[must_use]
    pub fn is_no_data(&self) -> bool {
        if !self.status().eq_ignore_ascii_case("firing") {
            return false;
        }

        self.alerts().iter().any(|alert| {
            let name = map_str(object_field(alert, "labels"), "alertname");
            let description = map_str(object_field(alert, "annotations"), "description");
            name.is_some_and(mentions_no_data) || description.is_some_and(mentions_no_data)
        })
    }

    fn description(&self) -> Option<&str> {
        let annotations = self.first_annotations();
        DESCRIPTION_KEYS
            .iter()
            .find_map(|key| map_str(annotations, key))
    }

    fn extra_annotations(&self) -> BTreeMap<String, String> {
        let mut annotations = string_entries(self.first_annotations());
        annotations.retain(|k, v| !DESCRIPTION_KEYS.contains(&k.as_str()) && !v.is_empty());
        annotations
    }

    fn first_alert_str(&self, key: &str) -> Option<String> {
        self.first_alert()
            .and_then(|a| str_field(a, key))
            .map(ToString::to_string)
    }

    /// Convert into a normalized alert.
    pub fn into_alert(self) -> Result<NormalizedAlert> {
        let name = self.alert_name().map(ToString::to_string).ok_or_else(|| {
            DispatchError::AdaptationFailure(
                "Alertmanager webhook has no alertname label or title".to_string(),
            )
        })?;

        let status = self.status().to_string();
        let generator_url = self.first_alert_str("generatorURL");
        let detail = ModernDetail {
            status: status.clone(),
            alert_count: self.alerts().len(),
            annotations: self.extra_annotations(),
            value_string: self.first_alert_str("valueString"),
            silence_url: self.first_alert_str("silenceURL"),
            dashboard_url: self
                .first_alert_str("dashboardURL")
                .filter(|url| Some(url) != generator_url.as_ref()),
        };

        // Common labels win over the first alert's labels
        let mut source_tags = string_entries(self.first_labels());
        source_tags.extend(string_entries(self.common_labels()));

        let mut alert = NormalizedAlert::new(
            name,
            AlertState::from_alertmanager(&status),
            status,
            AlertDetail::Modern(detail),
        );
        alert.title = str_field(&self.payload, "title").map(ToString::to_string);
        alert.description = self.description().map(ToString::to_string);
        alert.channel_tag = self.channel_tag().map(ToString::to_string);
        alert.source_tags = source_tags;
        alert.url = generator_url;
        alert.timestamp = self.first_alert_str("startsAt");

        if self.is_no_data() {
            debug!(alert = %alert.name, "No-data alert detected, forcing P1");
            alert.forced_priority = Some(Priority::P1);
        }

        Ok(alert)
    }
}

fn mentions_no_data(text: &str) -> bool {
    let lower = text.to_lowercase();
    NO_DATA_INDICATORS.iter().any(|needle| lower.contains(needle))
}
