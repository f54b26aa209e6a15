//! Alert pipeline: raw body in, routed and rendered Slack message out.
//!
//! Within one message the stages run strictly in order: unwrap, adapt,
//! classify, route, format, deliver. Nothing is retried here; a failed
//! queue message is redelivered by the queue.

use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::adapters;
use crate::alert::{NormalizedAlert, SourceKind};
use crate::envelope;
use crate::error::{DispatchError, Result};
use crate::format::format_alert;
use crate::priority::{classify_with_reason, Priority, PriorityReason};
use crate::routing::{ChannelRoute, ChannelRouter};
use crate::slack::ChatPlatform;

/// Rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Destination channel
    pub channel: String,
    /// Platform markup
    pub text: String,
    /// Value attached to the acknowledge/dismiss buttons
    pub correlation_id: String,
}

/// Everything the pipeline derived from one inbound payload.
#[derive(Debug, Clone)]
pub struct PreparedAlert {
    /// Canonical alert
    pub alert: NormalizedAlert,
    /// Computed tier
    pub priority: Priority,
    /// Which classifier rule decided
    pub priority_reason: PriorityReason,
    /// Resolved destination
    pub route: ChannelRoute,
    /// Rendered message
    pub message: OutboundMessage,
}

/// New correlation id, `<source>_<uuid>`.
#[must_use]
pub fn correlation_id(kind: SourceKind) -> String {
    format!("{}_{}", kind.slug(), Uuid::new_v4())
}

/// Turns raw payloads into delivered chat messages.
#[derive(Clone)]
pub struct Dispatcher {
    router: ChannelRouter,
    chat: Arc<dyn ChatPlatform>,
}

impl Dispatcher {
    /// Create a dispatcher over a router and chat platform.
    #[must_use]
    pub fn new(router: ChannelRouter, chat: Arc<dyn ChatPlatform>) -> Self {
        Self { router, chat }
    }

    /// Unwrap, adapt, classify, route and render a raw body. No I/O.
    pub fn prepare(&self, body: &str) -> Result<PreparedAlert> {
        self.prepare_payload(envelope::unwrap_body(body)?)
    }

    /// Same as [`Self::prepare`] for an already unwrapped payload.
    pub fn prepare_payload(&self, payload: Value) -> Result<PreparedAlert> {
        let alert = adapters::adapt(payload)?;
        Ok(self.prepare_alert(alert))
    }

    /// Classify, route and render a normalized alert.
    #[must_use]
    pub fn prepare_alert(&self, alert: NormalizedAlert) -> PreparedAlert {
        let (priority, priority_reason) = classify_with_reason(&alert);
        let route = self.router.route(&alert.name, priority);
        let message = OutboundMessage {
            channel: route.channel.clone(),
            text: format_alert(&alert),
            correlation_id: correlation_id(alert.kind()),
        };

        PreparedAlert {
            alert,
            priority,
            priority_reason,
            route,
            message,
        }
    }

    /// Prepare and deliver a raw body.
    pub async fn dispatch(&self, body: &str) -> Result<PreparedAlert> {
        let prepared = self.prepare(body)?;
        self.deliver(&prepared).await?;
        Ok(prepared)
    }

    /// Prepare and deliver a raw body received as bytes.
    pub async fn dispatch_bytes(&self, body: &[u8]) -> Result<PreparedAlert> {
        let body = std::str::from_utf8(body)
            .map_err(|e| DispatchError::MalformedEnvelope(format!("body is not UTF-8: {e}")))?;
        self.dispatch(body).await
    }

    async fn deliver(&self, prepared: &PreparedAlert) -> Result<()> {
        let message = &prepared.message;

        info!(
            alert = %prepared.alert.name,
            source = %prepared.alert.kind(),
            priority = %prepared.priority,
            priority_reason = ?prepared.priority_reason,
            channel = %message.channel,
            matched_by = ?prepared.route.matched_by,
            correlation_id = %message.correlation_id,
            "Dispatching alert"
        );

        self.chat
            .deliver_with_actions(&message.channel, &message.text, &message.correlation_id)
            .await
            .map_err(|e| {
                warn!(
                    channel = self.chat.name(),
                    alert = %prepared.alert.name,
                    error = %e,
                    "Alert delivery failed"
                );
                DispatchError::DeliveryFailure(e)
            })
    }
}
