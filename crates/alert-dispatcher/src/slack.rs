//! Chat platform collaborator and its Slack Web API implementation.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ChannelError;

/// Default Slack Web API base URL.
pub const DEFAULT_API_URL: &str = "https://slack.com/api";

/// `block_id` of the button row attached to alert messages.
pub const ACTIONS_BLOCK_ID: &str = "alert_actions";

/// `action_id` of the acknowledge button.
pub const ACKNOWLEDGE_ACTION_ID: &str = "acknowledge";

/// `action_id` of the dismiss button.
pub const DISMISS_ACTION_ID: &str = "dismiss";

/// Retry delay assumed when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Destination for rendered alerts and callback outcomes.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Platform name for logging.
    fn name(&self) -> &'static str;

    /// Post plain text to a channel.
    async fn deliver(&self, channel: &str, text: &str) -> Result<(), ChannelError>;

    /// Post text with acknowledge/dismiss buttons tagged with `correlation_id`.
    async fn deliver_with_actions(
        &self,
        channel: &str,
        text: &str,
        correlation_id: &str,
    ) -> Result<(), ChannelError>;

    /// Replace the original interactive message via its response URL.
    async fn respond(&self, response_url: &str, text: &str) -> Result<(), ChannelError>;
}

/// Slack Web API client using a bot token.
#[derive(Clone)]
pub struct SlackClient {
    bot_token: String,
    api_url: String,
    client: reqwest::Client,
}

impl fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl SlackClient {
    /// Create a client. `timeout` bounds every outbound request.
    ///
    /// # Errors
    /// Returns [`ChannelError::NotConfigured`] for an empty token and
    /// [`ChannelError::Http`] if the HTTP client cannot be built.
    pub fn new(
        bot_token: impl Into<String>,
        api_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ChannelError> {
        let bot_token = bot_token.into();
        if bot_token.trim().is_empty() {
            return Err(ChannelError::NotConfigured("SLACK_BOT_TOKEN".to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            bot_token,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn post_message(&self, message: &PostMessage) -> Result<(), ChannelError> {
        let url = format!("{}/chat.postMessage", self.api_url);

        debug!(channel = %message.channel, "Posting Slack message");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.bot_token)
            .json(message)
            .send()
            .await?;
        let response = check_status(response, "chat.postMessage").await?;

        // Slack reports application errors with HTTP 200 and `ok: false`
        let body: ApiResponse = response.json().await?;
        if body.ok {
            debug!(channel = %message.channel, "Slack message posted");
            Ok(())
        } else {
            let error = body.error.unwrap_or_else(|| "unknown_error".to_string());
            warn!(channel = %message.channel, error = %error, "Slack rejected message");
            Err(ChannelError::Api(error))
        }
    }
}

#[async_trait]
impl ChatPlatform for SlackClient {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn deliver(&self, channel: &str, text: &str) -> Result<(), ChannelError> {
        self.post_message(&PostMessage::alert(channel, text, None))
            .await
    }

    async fn deliver_with_actions(
        &self,
        channel: &str,
        text: &str,
        correlation_id: &str,
    ) -> Result<(), ChannelError> {
        self.post_message(&PostMessage::alert(channel, text, Some(correlation_id)))
            .await
    }

    async fn respond(&self, response_url: &str, text: &str) -> Result<(), ChannelError> {
        let reply = ActionReply {
            text,
            replace_original: true,
            response_type: "in_channel",
        };

        let response = self.client.post(response_url).json(&reply).send().await?;
        check_status(response, "response_url").await?;

        debug!("Interactive response delivered");
        Ok(())
    }
}

/// Map non-success statuses to channel errors.
async fn check_status(
    response: reqwest::Response,
    endpoint: &'static str,
) -> Result<reqwest::Response, ChannelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);

        warn!(
            endpoint,
            retry_after_secs = retry_after,
            "Rate limited by Slack"
        );

        return Err(ChannelError::RateLimited {
            retry_after_secs: retry_after,
        });
    }

    let body = response.text().await.unwrap_or_default();
    warn!(endpoint, status = %status, body = %body, "Slack request failed");

    Err(ChannelError::Other(format!(
        "Slack {endpoint} returned {status}: {body}"
    )))
}

// =============================================================================
// Slack API types (Block Kit)
// =============================================================================

#[derive(Debug, Serialize)]
struct PostMessage {
    channel: String,
    /// Fallback for notifications
    text: String,
    blocks: Vec<Block>,
}

impl PostMessage {
    fn alert(channel: &str, text: &str, correlation_id: Option<&str>) -> Self {
        let mut blocks = vec![Block::Section {
            text: Text::mrkdwn(format!("🚨 *Alert*\n{text}")),
        }];

        if let Some(id) = correlation_id {
            blocks.push(Block::Actions {
                block_id: ACTIONS_BLOCK_ID,
                elements: vec![
                    Button::new(ACKNOWLEDGE_ACTION_ID, "✅ Acknowledge", id, "primary"),
                    Button::new(DISMISS_ACTION_ID, "✖️ Dismiss", id, "danger"),
                ],
            });
        }

        Self {
            channel: channel.to_string(),
            text: text.to_string(),
            blocks,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block {
    Section {
        text: Text,
    },
    Actions {
        block_id: &'static str,
        elements: Vec<Button>,
    },
}

#[derive(Debug, Serialize)]
struct Text {
    #[serde(rename = "type")]
    text_type: &'static str,
    text: String,
}

impl Text {
    fn mrkdwn(text: impl Into<String>) -> Self {
        Self {
            text_type: "mrkdwn",
            text: text.into(),
        }
    }

    fn plain(text: impl Into<String>) -> Self {
        Self {
            text_type: "plain_text",
            text: text.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Button {
    #[serde(rename = "type")]
    element_type: &'static str,
    action_id: &'static str,
    text: Text,
    value: String,
    style: &'static str,
}

impl Button {
    fn new(action_id: &'static str, label: &str, value: &str, style: &'static str) -> Self {
        Self {
            element_type: "button",
            action_id,
            text: Text::plain(label),
            value: value.to_string(),
            style,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ActionReply<'a> {
    text: &'a str,
    replace_original: bool,
    response_type: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> SlackClient {
        SlackClient::new("xoxb-test", server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_alert_payload_with_actions() {
        let payload = serde_json::to_value(PostMessage::alert("#p0", "body", Some("cloudwatch_1")))
            .unwrap();

        assert_eq!(payload["text"], "body");
        assert_eq!(payload["blocks"][0]["type"], "section");
        assert_eq!(payload["blocks"][0]["text"]["text"], "🚨 *Alert*\nbody");
        assert_eq!(payload["blocks"][1]["type"], "actions");
        assert_eq!(payload["blocks"][1]["block_id"], "alert_actions");
        let buttons = payload["blocks"][1]["elements"].as_array().unwrap();
        assert_eq!(buttons[0]["action_id"], "acknowledge");
        assert_eq!(buttons[0]["style"], "primary");
        assert_eq!(buttons[1]["action_id"], "dismiss");
        assert_eq!(buttons[1]["style"], "danger");
        assert!(buttons.iter().all(|b| b["value"] == "cloudwatch_1"));
    }

    #[test]
    fn test_plain_payload_has_no_actions() {
        let payload = serde_json::to_value(PostMessage::alert("#p0", "body", None)).unwrap();
        assert_eq!(payload["blocks"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_token_rejected() {
        let err = SlackClient::new(" ", DEFAULT_API_URL, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ChannelError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_deliver_with_actions_posts_blocks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(header("authorization", "Bearer xoxb-test"))
            .and(body_partial_json(json!({"channel": "#p0-infra-alerts"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .deliver_with_actions("#p0-infra-alerts", "text", "grafana_abc")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ok_false_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": false, "error": "channel_not_found"})),
            )
            .mount(&server)
            .await;

        let err = client(&server).deliver("#nope", "text").await.unwrap_err();
        assert!(matches!(err, ChannelError::Api(ref e) if e == "channel_not_found"));
    }

    #[tokio::test]
    async fn test_rate_limit_honours_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
            .mount(&server)
            .await;

        let err = client(&server).deliver("#p0", "text").await.unwrap_err();
        assert!(matches!(
            err,
            ChannelError::RateLimited {
                retry_after_secs: 30
            }
        ));
    }

    #[tokio::test]
    async fn test_respond_replaces_original() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/actions/T1/123"))
            .and(body_partial_json(json!({
                "text": "done",
                "replace_original": true,
                "response_type": "in_channel"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/actions/T1/123", server.uri());
        client(&server).respond(&url, "done").await.unwrap();
    }

    #[tokio::test]
    async fn test_respond_non_success_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("expired_url"))
            .mount(&server)
            .await;

        let url = format!("{}/actions/T1/123", server.uri());
        let err = client(&server).respond(&url, "done").await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }
}
