//! In-memory collaborators for unit tests.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::ChannelError;
use crate::slack::ChatPlatform;

/// One recorded `deliver*` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub channel: String,
    pub text: String,
    pub correlation_id: Option<String>,
}

/// Chat platform that records calls, optionally failing every one.
#[derive(Debug, Default)]
pub struct RecordingChat {
    pub fail: bool,
    pub deliveries: Mutex<Vec<Delivery>>,
    pub responses: Mutex<Vec<(String, String)>>,
}

impl RecordingChat {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn responses(&self) -> Vec<(String, String)> {
        self.responses.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), ChannelError> {
        if self.fail {
            Err(ChannelError::Other("chat unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChatPlatform for RecordingChat {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn deliver(&self, channel: &str, text: &str) -> Result<(), ChannelError> {
        self.check()?;
        self.deliveries.lock().unwrap().push(Delivery {
            channel: channel.to_string(),
            text: text.to_string(),
            correlation_id: None,
        });
        Ok(())
    }

    async fn deliver_with_actions(
        &self,
        channel: &str,
        text: &str,
        correlation_id: &str,
    ) -> Result<(), ChannelError> {
        self.check()?;
        self.deliveries.lock().unwrap().push(Delivery {
            channel: channel.to_string(),
            text: text.to_string(),
            correlation_id: Some(correlation_id.to_string()),
        });
        Ok(())
    }

    async fn respond(&self, response_url: &str, text: &str) -> Result<(), ChannelError> {
        self.check()?;
        self.responses
            .lock()
            .unwrap()
            .push((response_url.to_string(), text.to_string()));
        Ok(())
    }
}
