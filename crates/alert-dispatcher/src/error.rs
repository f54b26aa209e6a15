//! Error types for alert dispatching.

use thiserror::Error;

/// Result alias used across the dispatch pipeline.
pub type Result<T, E = DispatchError> = std::result::Result<T, E>;

/// Errors raised while adapting, routing, verifying or delivering an alert.
///
/// Every variant is scoped to a single queue message or HTTP request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Body is neither a transport envelope nor a directly parseable payload
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Payload shape matches no known alert source
    #[error("Unrecognized alert format: {0}")]
    UnrecognizedFormat(String),

    /// Payload matched a source but a required field is missing or invalid
    #[error("Adaptation failed: {0}")]
    AdaptationFailure(String),

    /// Request signature missing, malformed or not matching
    #[error("Invalid request signature: {0}")]
    SignatureInvalid(String),

    /// Request timestamp outside the replay window
    #[error("Stale request: timestamp skew of {skew_secs}s exceeds the allowed window")]
    StaleRequest {
        /// Absolute distance between now and the request timestamp
        skew_secs: i64,
    },

    /// Interactive payload could not be decoded
    #[error("Invalid callback payload: {0}")]
    InvalidCallback(String),

    /// Chat platform rejected or failed the delivery
    #[error("Delivery failed: {0}")]
    DeliveryFailure(#[from] ChannelError),

    /// Queue collaborator failed
    #[error("Queue error: {0}")]
    Queue(String),
}

impl DispatchError {
    /// Whether this error means the caller failed authentication.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::SignatureInvalid(_) | Self::StaleRequest { .. })
    }

    /// Whether this error was caused by the inbound payload itself.
    #[must_use]
    pub const fn is_bad_input(&self) -> bool {
        matches!(
            self,
            Self::MalformedEnvelope(_)
                | Self::UnrecognizedFormat(_)
                | Self::AdaptationFailure(_)
                | Self::InvalidCallback(_)
        )
    }
}

/// Errors that can occur when sending messages to the chat platform.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Channel is not configured
    #[error("Channel not configured: {0}")]
    NotConfigured(String),


    /// Rate limited by the service
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds to wait before retrying
        retry_after_secs: u64,
    },

    /// Platform answered with an application-level error
    #[error("Slack API error: {0}")]
    Api(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors detected while loading process configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is unset or empty
    #[error("Missing required env var: {0}")]
    MissingVar(&'static str),

    /// The routing table has no usable default channel
    #[error("Default channel must not be empty")]
    MissingDefaultChannel,

    /// An environment variable holds an unusable value
    #[error("Invalid value for {name}: {value}")]
    InvalidValue {
        /// Variable name
        name: &'static str,
        /// Offending value
        value: String,
    },
}
