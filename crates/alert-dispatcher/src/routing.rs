//! Channel routing.
//!
//! Resolution order:
//! 1. Explicit alert-name mapping (ignores priority entirely)
//! 2. Channel configured for the computed priority
//! 3. Default channel

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::ConfigError;
use crate::priority::Priority;

/// How a route was resolved. Diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedBy {
    /// Alert name had an explicit mapping
    ExplicitMapping,
    /// Channel configured for the priority tier
    PriorityDefault,
    /// Default channel
    FallbackDefault,
}

/// Resolved destination for an alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRoute {
    /// Destination channel
    pub channel: String,
    /// Priority the alert was classified with
    pub priority: Priority,
    /// Which rule picked the channel
    pub matched_by: MatchedBy,
}

/// Immutable routing configuration.
///
/// The default channel is mandatory, so routing always yields a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    default_channel: String,
    priority_channels: HashMap<Priority, String>,
    alert_channels: HashMap<String, String>,
}

impl RoutingTable {
    /// Create a table with only a default channel.
    pub fn new(default_channel: impl Into<String>) -> Result<Self, ConfigError> {
        let default_channel = default_channel.into();
        if default_channel.trim().is_empty() {
            return Err(ConfigError::MissingDefaultChannel);
        }
        Ok(Self {
            default_channel,
            priority_channels: HashMap::new(),
            alert_channels: HashMap::new(),
        })
    }

    /// Set the channel for a priority tier. Empty channels are ignored.
    #[must_use]
    pub fn with_priority_channel(mut self, priority: Priority, channel: impl Into<String>) -> Self {
        let channel = channel.into();
        if !channel.trim().is_empty() {
            self.priority_channels.insert(priority, channel);
        }
        self
    }

    /// Pin an alert name to a channel. Empty names or channels are ignored.
    #[must_use]
    pub fn with_alert_channel(mut self, alert_name: impl Into<String>, channel: impl Into<String>) -> Self {
        let (alert_name, channel) = (alert_name.into(), channel.into());
        if !alert_name.is_empty() && !channel.trim().is_empty() {
            self.alert_channels.insert(alert_name, channel);
        }
        self
    }

    /// Pin several alert names at once.
    #[must_use]
    pub fn with_alert_channels<I, K, V>(self, mappings: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        mappings
            .into_iter()
            .fold(self, |table, (name, channel)| table.with_alert_channel(name, channel))
    }

    /// Default channel.
    #[must_use]
    pub fn default_channel(&self) -> &str {
        &self.default_channel
    }

    /// Channel configured for a tier, if any.
    #[must_use]
    pub fn priority_channel(&self, priority: Priority) -> Option<&str> {
        self.priority_channels.get(&priority).map(String::as_str)
    }

    /// Explicit channel for an alert name, if any.
    #[must_use]
    pub fn alert_channel(&self, alert_name: &str) -> Option<&str> {
        self.alert_channels.get(alert_name).map(String::as_str)
    }

    /// Number of explicit alert mappings.
    #[must_use]
    pub fn alert_mapping_count(&self) -> usize {
        self.alert_channels.len()
    }
}

/// Resolves destination channels against a shared, read-only table.
#[derive(Debug, Clone)]
pub struct ChannelRouter {
    table: Arc<RoutingTable>,
}

impl ChannelRouter {
    /// Create a router over a routing table.
    #[must_use]
    pub const fn new(table: Arc<RoutingTable>) -> Self {
        Self { table }
    }

    /// Resolve the channel for an alert.
    #[must_use]
    pub fn route(&self, alert_name: &str, priority: Priority) -> ChannelRoute {
        let (channel, matched_by) = if let Some(channel) = self.table.alert_channel(alert_name) {
            (channel, MatchedBy::ExplicitMapping)
        } else if let Some(channel) = self.table.priority_channel(priority) {
            (channel, MatchedBy::PriorityDefault)
        } else {
            (self.table.default_channel(), MatchedBy::FallbackDefault)
        };

        debug!(
            alert = %alert_name,
            priority = %priority,
            channel = %channel,
            matched_by = ?matched_by,
            "Resolved channel"
        );

        ChannelRoute {
            channel: channel.to_string(),
            priority,
            matched_by,
        }
    }
}
