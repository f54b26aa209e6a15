//! Interactive button callbacks.
//!
//! Each callback is handled statelessly:
//!
//! ```text
//! Received -> Verified -> Acknowledged | Dismissed | UnknownAction
//! ```
//!
//! Nothing about an alert's lifecycle is stored. The alert the button belongs
//! to is recovered from the text of the message being replaced, falling back
//! to the button's correlation id.

use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use crate::error::{DispatchError, Result};
use crate::format::{CLOUD_ALARM_MARKER, DESCRIPTION_PREFIX, GRAFANA_MARKER, REASON_PREFIX};
use crate::signature::{CallbackHeaders, SignatureVerifier};
use crate::slack::{ChatPlatform, ACKNOWLEDGE_ACTION_ID, DISMISS_ACTION_ID};

static GRAFANA_NAME: LazyLock<Regex> = LazyLock::new(|| field_regex(GRAFANA_MARKER, r"[^*\n]+"));
static GRAFANA_DESCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| field_regex(DESCRIPTION_PREFIX, r"[^\n]+"));
static CLOUD_ALARM_NAME: LazyLock<Regex> =
    LazyLock::new(|| field_regex(CLOUD_ALARM_MARKER, r"[^*\n]+"));
static CLOUD_ALARM_REASON: LazyLock<Regex> = LazyLock::new(|| field_regex(REASON_PREFIX, r"[^\n]+"));

fn field_regex(prefix: &str, value: &str) -> Regex {
    Regex::new(&format!(r"{}\s*({value})", regex::escape(prefix))).expect("valid regex")
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct FormBody {
    payload: String,
}

/// Decoded `block_actions` payload. Only the fields we act on are kept.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InteractionPayload {
    /// Interaction type, `block_actions` for buttons
    #[serde(rename = "type", default)]
    pub interaction_type: Option<String>,
    /// Triggered actions, first one wins
    #[serde(default)]
    pub actions: Vec<PayloadAction>,
    /// Acting user
    #[serde(default)]
    pub user: Option<PayloadUser>,
    /// Where to send the replacement message
    #[serde(default)]
    pub response_url: Option<String>,
    /// Message the buttons were attached to
    #[serde(default)]
    pub message: Option<PayloadMessage>,
}

/// Button press.
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadAction {
    /// Button `action_id`
    pub action_id: String,
    /// Button value (the correlation id)
    #[serde(default)]
    pub value: Option<String>,
}

/// Acting user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayloadUser {
    /// User id
    #[serde(default)]
    pub id: Option<String>,
    /// Handle
    #[serde(default)]
    pub username: Option<String>,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
}

/// Original message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayloadMessage {
    /// Fallback text
    #[serde(default)]
    pub text: Option<String>,
    /// Blocks as posted
    #[serde(default)]
    pub blocks: Vec<PayloadBlock>,
}

/// Block of the original message.
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadBlock {
    /// Block type
    #[serde(rename = "type")]
    pub block_type: String,
    /// Text object, for section blocks
    #[serde(default)]
    pub text: Option<PayloadText>,
}

/// Text object of a block.
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadText {
    /// Text content
    #[serde(default)]
    pub text: Option<String>,
}

/// Decode a form-encoded callback body (`payload=<json>`).
pub fn decode_form_body(body: &[u8]) -> Result<InteractionPayload> {
    let form: FormBody = serde_urlencoded::from_bytes(body)
        .map_err(|e| DispatchError::InvalidCallback(format!("invalid form body: {e}")))?;

    serde_json::from_str(&form.payload)
        .map_err(|e| DispatchError::InvalidCallback(format!("invalid payload JSON: {e}")))
}

// =============================================================================
// Action state machine
// =============================================================================

/// Button the user pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    /// Take ownership of the alert
    Acknowledge,
    /// Close the alert without action
    Dismiss,
    /// Any other `action_id`
    Other(String),
}

impl ActionKind {
    /// Map a button `action_id`.
    #[must_use]
    pub fn from_action_id(action_id: &str) -> Self {
        match action_id {
            ACKNOWLEDGE_ACTION_ID => Self::Acknowledge,
            DISMISS_ACTION_ID => Self::Dismiss,
            other => Self::Other(other.to_string()),
        }
    }

    /// Terminal state this action leads to.
    #[must_use]
    pub const fn outcome_state(&self) -> ActionState {
        match self {
            Self::Acknowledge => ActionState::Acknowledged,
            Self::Dismiss => ActionState::Dismissed,
            Self::Other(_) => ActionState::UnknownAction,
        }
    }
}

/// Callback progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    /// Request arrived
    Received,
    /// Signature checked
    Verified,
    /// Alert is being handled
    Acknowledged,
    /// Alert closed
    Dismissed,
    /// Button not recognized
    UnknownAction,
}

impl ActionState {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Acknowledged | Self::Dismissed | Self::UnknownAction
        )
    }
}

/// Alert recovered from a previously rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertIdentity {
    /// Alert name from the header line
    pub name: String,
    /// Description or reason line
    pub description: Option<String>,
}

/// Recover the alert name and description from rendered message text.
///
/// Grafana messages are recognized first, then CloudWatch ones.
#[must_use]
pub fn extract_alert_identity(text: &str) -> Option<AlertIdentity> {
    let (name_re, description_re) = if text.contains(GRAFANA_MARKER) {
        (&*GRAFANA_NAME, &*GRAFANA_DESCRIPTION)
    } else if text.contains(CLOUD_ALARM_MARKER) {
        (&*CLOUD_ALARM_NAME, &*CLOUD_ALARM_REASON)
    } else {
        return None;
    };

    let name = capture(name_re, text)?;
    Some(AlertIdentity {
        name,
        description: capture(description_re, text),
    })
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Decoded, validated callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackAction {
    /// Pressed button
    pub kind: ActionKind,
    /// Button value
    pub correlation_id: String,
    /// Who pressed it
    pub actor: String,
    /// Replacement target
    pub response_url: String,
    /// Alert the message was about, when recoverable
    pub identity: Option<AlertIdentity>,
}

impl CallbackAction {
    /// Validate a decoded payload.
    pub fn from_payload(payload: InteractionPayload) -> Result<Self> {
        let action = payload
            .actions
            .into_iter()
            .next()
            .ok_or_else(|| DispatchError::InvalidCallback("payload has no actions".to_string()))?;

        let response_url = payload
            .response_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| DispatchError::InvalidCallback("payload has no response_url".to_string()))?;

        let actor = payload
            .user
            .and_then(|u| u.name.or(u.username).or(u.id))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "unknown user".to_string());

        let identity = payload.message.as_ref().and_then(identity_from_message);

        Ok(Self {
            kind: ActionKind::from_action_id(&action.action_id),
            correlation_id: action.value.unwrap_or_default(),
            actor,
            response_url,
            identity,
        })
    }
}

/// Message text first, then each section block in order.
fn identity_from_message(message: &PayloadMessage) -> Option<AlertIdentity> {
    message
        .text
        .as_deref()
        .and_then(extract_alert_identity)
        .or_else(|| {
            message
                .blocks
                .iter()
                .filter(|b| b.block_type == "section")
                .filter_map(|b| b.text.as_ref()?.text.as_deref())
                .find_map(extract_alert_identity)
        })
}

/// Replacement message for a resolved callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Terminal state
    pub state: ActionState,
    /// Replacement text
    pub text: String,
}

/// Decide the outcome of a verified callback. Pure.
#[must_use]
pub fn resolve(action: &CallbackAction) -> ActionOutcome {
    let state = action.kind.outcome_state();
    let text = match &action.kind {
        ActionKind::Acknowledge => outcome_text(
            action,
            "✅",
            "acknowledged",
            "_This alert is now being handled._",
        ),
        ActionKind::Dismiss => outcome_text(
            action,
            "❌",
            "dismissed",
            "_This alert has been dismissed and closed._",
        ),
        ActionKind::Other(action_id) => format!("Unknown action: {action_id}"),
    };
    ActionOutcome { state, text }
}

fn outcome_text(action: &CallbackAction, emoji: &str, verb: &str, footer: &str) -> String {
    let actor = &action.actor;
    match &action.identity {
        Some(identity) => {
            let mut text = format!("{emoji} *Alert '{}' {verb} by {actor}*", identity.name);
            if let Some(description) = &identity.description {
                text.push_str(&format!("\n{DESCRIPTION_PREFIX} {description}"));
            }
            text.push_str("\n\n");
            text.push_str(footer);
            text
        }
        None => format!(
            "{emoji} *Alert {} {verb} by {actor}*\n\n{footer}",
            action.correlation_id
        ),
    }
}

// =============================================================================
// Processor
// =============================================================================

/// Verifies callbacks, resolves them and delivers the replacement message.
#[derive(Clone)]
pub struct InteractionProcessor {
    verifier: SignatureVerifier,
    chat: Arc<dyn ChatPlatform>,
}

impl InteractionProcessor {
    /// Create a processor.
    #[must_use]
    pub fn new(verifier: SignatureVerifier, chat: Arc<dyn ChatPlatform>) -> Self {
        Self { verifier, chat }
    }

    /// Handle one callback request. `now` is unix seconds.
    ///
    /// The request only succeeds once the replacement message is delivered.
    pub async fn handle(
        &self,
        headers: &CallbackHeaders,
        body: &[u8],
        now: i64,
    ) -> Result<ActionOutcome> {
        debug!(state = ?ActionState::Received, body_len = body.len(), "Interactive callback");

        if let Err(e) = self.verifier.verify(headers, body, now) {
            warn!(error = %e, "Rejected interactive callback");
            return Err(e);
        }
        debug!(state = ?ActionState::Verified, "Callback signature verified");

        let action = CallbackAction::from_payload(decode_form_body(body)?)?;
        let outcome = resolve(&action);

        info!(
            state = ?outcome.state,
            correlation_id = %action.correlation_id,
            alert = ?action.identity.as_ref().map(|i| i.name.as_str()),
            actor = %action.actor,
            "Resolved alert action"
        );

        self.chat
            .respond(&action.response_url, &outcome.text)
            .await
            .map_err(|e| {
                warn!(
                    channel = self.chat.name(),
                    error = %e,
                    "Failed to deliver callback response"
                );
                DispatchError::DeliveryFailure(e)
            })?;

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingChat;
    use serde_json::json;

    const NOW: i64 = 1_752_000_000;
    const SECRET: &str = "signing-secret";

    const DISK_FULL_TEXT: &str = "🚨 *CloudWatch Alarm: disk-full*\n\
        • *From:* `🟢 OK` → *To:* `🔴 ALARM`\n\
        • *Reason:* Threshold Crossed: 1 datapoint [91.0] was greater than the threshold (90.0).\n\
        • *Time:* `2025-07-23 13:32:26 UTC`";

    fn payload(action_id: &str, text: &str) -> serde_json::Value {
        json!({
            "type": "block_actions",
            "user": {"id": "U123", "username": "jdoe", "name": "jdoe"},
            "response_url": "https://hooks.slack.com/actions/T1/123/abc",
            "actions": [{"action_id": action_id, "value": "cloudwatch_42", "type": "button"}],
            "message": {"text": text, "blocks": []}
        })
    }

    fn form_body(payload: &serde_json::Value) -> Vec<u8> {
        serde_urlencoded::to_string([("payload", payload.to_string())])
            .unwrap()
            .into_bytes()
    }

    fn signed_headers(body: &[u8]) -> CallbackHeaders {
        let timestamp = NOW.to_string();
        CallbackHeaders {
            signature: Some(SignatureVerifier::new(SECRET).sign(&timestamp, body).unwrap()),
            timestamp: Some(timestamp),
        }
    }

    fn action(kind: ActionKind, identity: Option<AlertIdentity>) -> CallbackAction {
        CallbackAction {
            kind,
            correlation_id: "grafana_7".to_string(),
            actor: "jdoe".to_string(),
            response_url: "https://hooks.slack.com/x".to_string(),
            identity,
        }
    }

    #[test]
    fn test_extract_cloud_alarm_identity() {
        let identity = extract_alert_identity(DISK_FULL_TEXT).unwrap();
        assert_eq!(identity.name, "disk-full");
        assert!(identity
            .description
            .as_deref()
            .unwrap()
            .starts_with("Threshold Crossed"));
    }

    #[test]
    fn test_extract_grafana_identity() {
        let text = "🚨 *Grafana Alert: HighLatency*\n• *State:* `🔴 FIRING`\n• *Description:* p99 above 2s";
        let identity = extract_alert_identity(text).unwrap();
        assert_eq!(identity.name, "HighLatency");
        assert_eq!(identity.description.as_deref(), Some("p99 above 2s"));
    }

    #[test]
    fn test_extract_without_marker() {
        assert!(extract_alert_identity("something happened").is_none());
    }

    #[test]
    fn test_identity_falls_back_to_blocks() {
        let message: PayloadMessage = serde_json::from_value(json!({
            "text": "",
            "blocks": [
                {"type": "actions"},
                {"type": "section", "text": {"type": "mrkdwn", "text": "🚨 *Alert*\n🚨 *Grafana Alert: Disk*"}}
            ]
        }))
        .unwrap();
        assert_eq!(identity_from_message(&message).unwrap().name, "Disk");
    }

    #[test]
    fn test_state_machine_terminals() {
        assert_eq!(ActionKind::from_action_id("acknowledge"), ActionKind::Acknowledge);
        assert_eq!(ActionKind::from_action_id("dismiss"), ActionKind::Dismiss);
        assert_eq!(
            ActionKind::from_action_id("snooze").outcome_state(),
            ActionState::UnknownAction
        );
        assert!(!ActionState::Verified.is_terminal());
        assert!(ActionState::Dismissed.is_terminal());
    }

    #[test]
    fn test_dismiss_without_identity_uses_correlation_id() {
        let outcome = resolve(&action(ActionKind::Dismiss, None));
        assert_eq!(outcome.state, ActionState::Dismissed);
        assert!(outcome.text.contains("Alert grafana_7 dismissed by jdoe"));
        assert!(outcome.text.contains("closed"));
    }

    #[test]
    fn test_unknown_action_text() {
        let outcome = resolve(&action(ActionKind::Other("snooze".into()), None));
        assert_eq!(outcome.text, "Unknown action: snooze");
    }

    #[test]
    fn test_decode_rejects_missing_payload_field() {
        let err = decode_form_body(b"token=abc").unwrap_err();
        assert!(matches!(err, DispatchError::InvalidCallback(_)));
        let err = decode_form_body(b"payload=not-json").unwrap_err();
        assert!(matches!(err, DispatchError::InvalidCallback(_)));
    }

    #[test]
    fn test_payload_without_actions_is_invalid() {
        let payload: InteractionPayload = serde_json::from_value(json!({
            "response_url": "https://hooks.slack.com/x",
            "actions": []
        }))
        .unwrap();
        assert!(matches!(
            CallbackAction::from_payload(payload),
            Err(DispatchError::InvalidCallback(_))
        ));
    }

    #[tokio::test]
    async fn test_acknowledge_disk_full() {
        let chat = Arc::new(RecordingChat::default());
        let processor = InteractionProcessor::new(SignatureVerifier::new(SECRET), chat.clone());
        let body = form_body(&payload("acknowledge", DISK_FULL_TEXT));

        let outcome = processor
            .handle(&signed_headers(&body), &body, NOW)
            .await
            .unwrap();

        assert_eq!(outcome.state, ActionState::Acknowledged);
        assert!(outcome.text.contains("disk-full"));
        assert!(outcome.text.contains("jdoe"));
        assert!(outcome.text.contains("being handled"));
        assert!(!outcome.text.contains("dismissed"));

        let responses = chat.responses();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].0, "https://hooks.slack.com/actions/T1/123/abc");
        assert_eq!(responses[0].1, outcome.text);
    }

    #[tokio::test]
    async fn test_bad_signature_never_responds() {
        let chat = Arc::new(RecordingChat::default());
        let processor = InteractionProcessor::new(SignatureVerifier::new(SECRET), chat.clone());
        let body = form_body(&payload("acknowledge", DISK_FULL_TEXT));
        let mut headers = signed_headers(&body);
        headers.signature = Some("v0=deadbeef".to_string());

        let err = processor.handle(&headers, &body, NOW).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(chat.responses().is_empty());
    }

    #[tokio::test]
    async fn test_response_failure_is_delivery_failure() {
        let processor = InteractionProcessor::new(
            SignatureVerifier::new(SECRET),
            Arc::new(RecordingChat::failing()),
        );
        let body = form_body(&payload("dismiss", DISK_FULL_TEXT));

        let err = processor
            .handle(&signed_headers(&body), &body, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::DeliveryFailure(_)));
    }
}
