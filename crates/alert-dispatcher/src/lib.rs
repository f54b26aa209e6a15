//! Alert normalization and routing engine with Slack delivery.
//!
//! This crate provides:
//! - Envelope unwrapping for SNS-wrapped queue messages
//! - Format detection and adapters for CloudWatch alarms and both Grafana
//!   webhook generations (legacy rule alerts and Alertmanager-style batches)
//! - Priority classification and channel routing against a read-only routing table
//! - Slack `mrkdwn` rendering with acknowledge/dismiss buttons
//! - Signed interactive-callback verification and acknowledgment handling
//! - An SQS polling loop and an HTTP server for callbacks and direct webhooks
//!
//! # Pipeline
//!
//! ```text
//! raw body -> envelope -> adapters -> { priority, routing, format } -> OutboundMessage
//! callback -> signature -> interactive -> outcome text -> response_url
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod adapters;
pub mod alert;
pub mod config;
pub mod envelope;
pub mod error;
pub mod format;
pub mod interactive;
pub mod pipeline;
pub mod priority;
pub mod queue;
pub mod routing;
pub mod server;
pub mod signature;
pub mod slack;

#[cfg(test)]
pub(crate) mod testing;

pub use adapters::AlertPayload;
pub use alert::{AlertDetail, AlertState, NormalizedAlert, SourceKind};
pub use config::Config;
pub use error::{ChannelError, ConfigError, DispatchError, Result};
pub use pipeline::{Dispatcher, OutboundMessage, PreparedAlert};
pub use priority::Priority;
pub use routing::{ChannelRoute, ChannelRouter, MatchedBy, RoutingTable};
pub use signature::SignatureVerifier;
pub use slack::{ChatPlatform, SlackClient};
