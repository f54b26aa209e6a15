//! Slack mrkdwn rendering, one layout per source kind.
//!
//! The header and description lines double as the contract the interactive
//! handler parses back out of the posted message, see
//! [`crate::interactive::extract_alert_identity`]. Change them together.

use crate::alert::{
    AlertDetail, AlertState, CloudAlarmDetail, LegacyDetail, ModernDetail, NormalizedAlert,
    ROUTING_TAG,
};

/// Header phrase of CloudWatch alarm messages.
pub const CLOUD_ALARM_MARKER: &str = "CloudWatch Alarm:";

/// Header phrase of Grafana (legacy and unified) messages.
pub const GRAFANA_MARKER: &str = "Grafana Alert:";

/// Line prefix carrying the CloudWatch state reason.
pub const REASON_PREFIX: &str = "• *Reason:*";

/// Line prefix carrying the Grafana description.
pub const DESCRIPTION_PREFIX: &str = "• *Description:*";

/// Eval-match tags that only add noise.
const NOISY_METRIC_TAGS: &[&str] = &["__name__", "job", "instance"];

/// Render an alert as chat markup.
///
/// Pure: the same alert always renders to the same text.
#[must_use]
pub fn format_alert(alert: &NormalizedAlert) -> String {
    let lines = match &alert.detail {
        AlertDetail::CloudAlarm(detail) => cloud_alarm_lines(alert, detail),
        AlertDetail::Legacy(detail) => legacy_lines(alert, detail),
        AlertDetail::Modern(detail) => modern_lines(alert, detail),
    };
    lines.join("\n")
}

/// Integer formatting for exact integers, two decimals otherwise.
#[must_use]
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

/// Leading emoji for a state.
#[must_use]
pub const fn state_emoji(state: AlertState) -> &'static str {
    match state {
        AlertState::Firing => "🚨",
        AlertState::Ok => "✅",
        AlertState::NoData => "⚠️",
        AlertState::Pending => "⏳",
        AlertState::Unknown => "📊",
    }
}

/// Inline badge: colored dot plus the source's own state label.
#[must_use]
pub fn state_badge(state: AlertState, label: &str) -> String {
    let dot = match state {
        AlertState::Firing => "🔴",
        AlertState::Ok => "🟢",
        AlertState::NoData | AlertState::Pending => "🟡",
        AlertState::Unknown => return format!("`{label}`"),
    };
    format!("`{dot} {}`", label.to_uppercase())
}

fn header(alert: &NormalizedAlert, marker: &str, subject: &str) -> String {
    format!("{} *{marker} {subject}*", state_emoji(alert.state))
}

fn cloud_alarm_lines(alert: &NormalizedAlert, detail: &CloudAlarmDetail) -> Vec<String> {
    let mut lines = vec![header(alert, CLOUD_ALARM_MARKER, &alert.name)];

    let current = state_badge(alert.state, &alert.state_label);
    match (alert.previous_state, alert.previous_state_label.as_deref()) {
        (Some(prev), Some(prev_label)) => lines.push(format!(
            "• *From:* {} → *To:* {current}",
            state_badge(prev, prev_label)
        )),
        _ => lines.push(format!("• *State:* {current}")),
    }

    if !detail.metric_name.is_empty() {
        let metric = if detail.namespace.is_empty() {
            detail.metric_name.clone()
        } else {
            format!("{}/{}", detail.namespace, detail.metric_name)
        };
        match &detail.statistic {
            Some(statistic) => lines.push(format!("• *Metric:* `{metric}` ({statistic})")),
            None => lines.push(format!("• *Metric:* `{metric}`")),
        }

        let threshold = format_number(detail.threshold);
        if detail.comparison_operator.is_empty() {
            lines.push(format!("• *Threshold:* `{threshold}`"));
        } else {
            lines.push(format!(
                "• *Threshold:* `{} {threshold}`",
                detail.comparison_operator
            ));
        }

        if detail.period_secs > 0 {
            if detail.evaluation_periods > 0 {
                lines.push(format!(
                    "• *Period:* `{}s over {} evaluations`",
                    detail.period_secs, detail.evaluation_periods
                ));
            } else {
                lines.push(format!("• *Period:* `{}s`", detail.period_secs));
            }
        }
    }

    lines.push("• *Dimensions:*".to_string());
    let dimensions: Vec<String> = detail
        .dimensions
        .iter()
        .filter(|(name, _)| name != ROUTING_TAG)
        .map(|(name, value)| format!("   → {name}: {value}"))
        .collect();
    if dimensions.is_empty() {
        lines.push("   → None".to_string());
    } else {
        lines.extend(dimensions);
    }

    if let Some(region) = &alert.region {
        lines.push(format!("• *Region:* `{region}`"));
    }
    if let Some(account_id) = &detail.account_id {
        lines.push(format!("• *Account:* `{account_id}`"));
    }
    if let Some(reason) = &alert.description {
        lines.push(format!("{REASON_PREFIX} {reason}"));
    }
    if let Some(timestamp) = &alert.timestamp {
        lines.push(format!("• *Time:* `{timestamp}`"));
    }

    lines
}

fn legacy_lines(alert: &NormalizedAlert, detail: &LegacyDetail) -> Vec<String> {
    let subject = alert.title.as_deref().unwrap_or(&alert.name);
    let mut lines = vec![
        header(alert, GRAFANA_MARKER, subject),
        format!("• *State:* {}", state_badge(alert.state, &alert.state_label)),
    ];

    // Rule name is only interesting when the title hides it
    if let Some(rule) = detail.rule_name.as_deref().filter(|r| *r != subject) {
        lines.push(format!("• *Rule:* `{rule}`"));
    }
    if let Some(description) = &alert.description {
        lines.push(format!("{DESCRIPTION_PREFIX} {description}"));
    }

    if !detail.eval_matches.is_empty() {
        lines.push("• *Metrics:*".to_string());
        for m in &detail.eval_matches {
            let value = m.value.map_or_else(|| "n/a".to_string(), format_number);
            let tags: Vec<String> = m
                .tags
                .iter()
                .filter(|(k, _)| !NOISY_METRIC_TAGS.contains(&k.as_str()))
                .map(|(k, v)| format!("`{k}={v}`"))
                .collect();
            if tags.is_empty() {
                lines.push(format!("   → `{}`: **{value}**", m.metric));
            } else {
                lines.push(format!("   → `{}`: **{value}** ({})", m.metric, tags.join(", ")));
            }
        }
    }

    push_labels(&mut lines, alert.display_tags());

    if let Some(image_url) = &detail.image_url {
        lines.push(format!("• *Panel:* <{image_url}|View Panel Image>"));
    }
    if let Some(url) = &alert.url {
        lines.push(format!("• *Dashboard:* <{url}|View Alert Rule>"));
    }

    lines
}

fn modern_lines(alert: &NormalizedAlert, detail: &ModernDetail) -> Vec<String> {
    let mut lines = vec![
        header(alert, GRAFANA_MARKER, &alert.name),
        format!("• *State:* {}", state_badge(alert.state, &alert.state_label)),
    ];

    if let Some(description) = &alert.description {
        lines.push(format!("{DESCRIPTION_PREFIX} {description}"));
    }
    for (key, value) in &detail.annotations {
        lines.push(format!("• *{}:* {value}", annotation_label(key)));
    }
    if detail.alert_count > 1 {
        lines.push(format!("• *Alerts:* `{}`", detail.alert_count));
    }

    push_labels(
        &mut lines,
        alert.display_tags().filter(|(k, _)| *k != "alertname"),
    );

    if let Some(value_string) = &detail.value_string {
        lines.push(format!("• *ValueString:* {value_string}"));
    }
    if let Some(url) = &detail.silence_url {
        lines.push(format!("• *Silence:* <{url}|Silence Alert>"));
    }
    if let Some(url) = &alert.url {
        lines.push(format!("• *Dashboard:* <{url}|View Alert Rule>"));
    }
    if let Some(url) = &detail.dashboard_url {
        lines.push(format!("• *Dashboard:* <{url}|View Dashboard>"));
    }

    lines
}

fn push_labels<'a>(lines: &mut Vec<String>, tags: impl Iterator<Item = (&'a str, &'a str)>) {
    let labels: Vec<String> = tags.map(|(k, v)| format!("   → `{k}`: {v}")).collect();
    if !labels.is_empty() {
        lines.push("• *Labels:*".to_string());
        lines.extend(labels);
    }
}

/// `runbook_url` -> `Runbook url`
fn annotation_label(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
