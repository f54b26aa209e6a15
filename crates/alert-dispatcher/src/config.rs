//! Process configuration.
//!
//! Everything comes from the environment, plus an optional
//! `alarm-channels.yaml` under `CONFIG_PATH` holding explicit alert-to-channel
//! mappings and tier channel defaults.

use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::priority::Priority;
use crate::routing::RoutingTable;
use crate::slack::DEFAULT_API_URL;

/// File name of the mapping file inside `CONFIG_PATH`.
pub const ALARM_CHANNELS_FILE: &str = "alarm-channels.yaml";

/// Key of the default channel in `default_channels`.
const DEFAULT_CHANNEL_KEY: &str = "default";

/// Contents of `alarm-channels.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AlarmChannelsFile {
    /// Alert name to channel
    #[serde(default)]
    pub alarm_mappings: HashMap<String, String>,
    /// `P0`/`P1`/`P2`/`default` to channel
    #[serde(default)]
    pub default_channels: HashMap<String, String>,
}

impl AlarmChannelsFile {
    /// Load the mapping file from a config directory.
    ///
    /// A missing, unreadable or invalid file yields an empty mapping; startup
    /// continues with built-in defaults.
    #[must_use]
    pub fn load(config_dir: &Path) -> Self {
        let path = config_dir.join(ALARM_CHANNELS_FILE);

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Alarm channel mapping file not found, using defaults");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read alarm channel mappings");
                return Self::default();
            }
        };

        match serde_yaml::from_str::<Option<Self>>(&contents) {
            Ok(file) => {
                let file = file.unwrap_or_default();
                info!(
                    mappings = file.alarm_mappings.len(),
                    "Loaded alarm-to-channel mappings"
                );
                file
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to parse alarm channel mappings");
                Self::default()
            }
        }
    }
}

/// Channel per tier plus the default channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDefaults {
    /// P0 channel
    pub p0: String,
    /// P1 channel
    pub p1: String,
    /// P2 channel
    pub p2: String,
    /// Fallback channel
    pub default: String,
}

/// Alert dispatcher configuration.
#[derive(Clone)]
pub struct Config {
    /// HTTP server port.
    pub port: u16,
    /// SQS queue to poll.
    pub queue_url: String,
    /// Slack bot token.
    pub slack_bot_token: String,
    /// Slack signing secret for interactive callbacks.
    pub slack_signing_secret: String,
    /// Slack Web API base URL.
    pub slack_api_url: String,
    /// Timeout for outbound Slack requests.
    pub slack_timeout: Duration,
    /// Pause after an empty polling cycle.
    pub poll_interval: Duration,
    /// Max messages per receive.
    pub sqs_batch_size: i32,
    /// Long-poll wait.
    pub sqs_wait_time_secs: i32,
    /// Directory holding the mapping file.
    pub config_path: PathBuf,
    /// Resolved tier channels.
    pub channels: ChannelDefaults,
    /// Explicit alert-name mappings.
    pub alarm_mappings: HashMap<String, String>,
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::MissingVar(key));

        let queue_url = required("SQS_QUEUE_URL")?;
        let slack_bot_token = required("SLACK_BOT_TOKEN")?;
        let slack_signing_secret = required("SLACK_SIGNING_SECRET")?;

        let config_path = get("CONFIG_PATH").map_or_else(|| PathBuf::from("/etc/config"), PathBuf::from);
        let file = AlarmChannelsFile::load(&config_path);

        // Environment wins over the file, the file over built-in names
        let channel = |var: &str, key: &str, builtin: &str| {
            get(var)
                .or_else(|| {
                    file.default_channels
                        .get(key)
                        .filter(|c| !c.trim().is_empty())
                        .cloned()
                })
                .unwrap_or_else(|| builtin.to_string())
        };
        let channels = ChannelDefaults {
            p0: channel("SLACK_CHANNEL_P0", Priority::P0.as_str(), "#p0-infra-alerts"),
            p1: channel("SLACK_CHANNEL_P1", Priority::P1.as_str(), "#p1-infra-alerts"),
            p2: channel("SLACK_CHANNEL_P2", Priority::P2.as_str(), "#p2-infra-alerts"),
            default: channel("SLACK_CHANNEL_DEFAULT", DEFAULT_CHANNEL_KEY, "#alerts"),
        };

        Ok(Self {
            port: parse_or(&get, "SERVER_PORT", 8088)?,
            queue_url,
            slack_bot_token,
            slack_signing_secret,
            slack_api_url: get("SLACK_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            slack_timeout: Duration::from_secs(parse_or(&get, "SLACK_TIMEOUT_SEC", 10)?),
            poll_interval: Duration::from_secs(parse_or(&get, "POLL_INTERVAL_SEC", 10)?),
            sqs_batch_size: parse_or(&get, "SQS_BATCH_SIZE", 5)?,
            sqs_wait_time_secs: parse_or(&get, "SQS_WAIT_TIME_SEC", 10)?,
            config_path,
            channels,
            alarm_mappings: file.alarm_mappings,
        })
    }

    /// Build the immutable routing table.
    pub fn routing_table(&self) -> Result<RoutingTable, ConfigError> {
        Ok(RoutingTable::new(self.channels.default.clone())?
            .with_priority_channel(Priority::P0, self.channels.p0.clone())
            .with_priority_channel(Priority::P1, self.channels.p1.clone())
            .with_priority_channel(Priority::P2, self.channels.p2.clone())
            .with_alert_channels(self.alarm_mappings.clone()))
    }
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    get(name).map_or(Ok(default), |value| {
        value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value })
    })
}
