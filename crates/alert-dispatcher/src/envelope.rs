//! Transport envelope unwrapping.
//!
//! CloudWatch alarms reach the queue wrapped in an SNS notification whose
//! `Message` field holds the alarm JSON as a string. Webhook bodies arrive
//! unwrapped. Both end up as a parsed JSON payload.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{DispatchError, Result};

/// SNS notification envelope (only the fields we use).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SnsEnvelope {
    message: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    topic_arn: Option<String>,
}

/// Extract the alert payload from a raw message body.
///
/// A JSON object carrying a string `Message` field is treated as an SNS
/// envelope and its inner message must itself be JSON. Any other JSON
/// value is returned as-is.
pub fn unwrap_body(body: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(body.trim()).map_err(|e| {
        DispatchError::MalformedEnvelope(format!("body is not valid JSON: {e}"))
    })?;

    if !is_envelope(&value) {
        return Ok(value);
    }

    let envelope: SnsEnvelope = serde_json::from_value(value)
        .map_err(|e| DispatchError::MalformedEnvelope(format!("invalid envelope: {e}")))?;

    debug!(
        subject = envelope.subject.as_deref().unwrap_or(""),
        topic_arn = envelope.topic_arn.as_deref().unwrap_or(""),
        "Unwrapping SNS envelope"
    );

    serde_json::from_str(&envelope.message).map_err(|e| {
        DispatchError::MalformedEnvelope(format!("envelope message is not valid JSON: {e}"))
    })
}

fn is_envelope(value: &Value) -> bool {
    value.get("Message").is_some_and(Value::is_string)
}
