//! Queue collaborator and the polling loop.
//!
//! Delivery is at-least-once: a message is deleted only after it was
//! dispatched successfully, so anything that fails reappears once its
//! visibility timeout expires.

use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::{DispatchError, Result};
use crate::pipeline::Dispatcher;

/// SQS accepts at most 10 messages per receive.
pub const MAX_BATCH_SIZE: i32 = 10;

/// SQS long polling waits at most 20 seconds.
pub const MAX_WAIT_TIME_SECS: i32 = 20;

/// Pause after a failed receive.
pub const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// One received message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Queue-assigned id
    pub id: String,
    /// Raw body
    pub body: String,
    /// Handle needed to delete the message
    pub receipt_handle: String,
}

/// Source of raw alert bodies.
#[async_trait]
pub trait QueueSource: Send + Sync {
    /// Receive up to one batch, waiting for messages if the source supports it.
    async fn receive(&self) -> Result<Vec<QueueMessage>>;

    /// Acknowledge a processed message.
    async fn delete(&self, message: &QueueMessage) -> Result<()>;
}

/// SQS queue.
#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
    batch_size: i32,
    wait_time_secs: i32,
}

impl SqsQueue {
    /// Create a queue from the default AWS credential chain.
    pub async fn from_env(queue_url: impl Into<String>, batch_size: i32, wait_time_secs: i32) -> Self {
        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        Self::new(
            aws_sdk_sqs::Client::new(&aws_config),
            queue_url,
            batch_size,
            wait_time_secs,
        )
    }

    /// Create a queue over an existing client. Limits are clamped to what SQS accepts.
    #[must_use]
    pub fn new(
        client: aws_sdk_sqs::Client,
        queue_url: impl Into<String>,
        batch_size: i32,
        wait_time_secs: i32,
    ) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
            wait_time_secs: wait_time_secs.clamp(0, MAX_WAIT_TIME_SECS),
        }
    }
}

#[async_trait]
impl QueueSource for SqsQueue {
    async fn receive(&self) -> Result<Vec<QueueMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(self.batch_size)
            .wait_time_seconds(self.wait_time_secs)
            .send()
            .await
            .map_err(|e| DispatchError::Queue(format!("receive failed: {}", DisplayErrorContext(&e))))?;

        let messages = output
            .messages()
            .iter()
            .filter_map(|m| {
                let (Some(body), Some(receipt_handle)) = (m.body(), m.receipt_handle()) else {
                    warn!(message_id = ?m.message_id(), "Skipping SQS message without body or receipt handle");
                    return None;
                };
                Some(QueueMessage {
                    id: m.message_id().unwrap_or_default().to_string(),
                    body: body.to_string(),
                    receipt_handle: receipt_handle.to_string(),
                })
            })
            .collect();

        Ok(messages)
    }

    async fn delete(&self, message: &QueueMessage) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(&message.receipt_handle)
            .send()
            .await
            .map_err(|e| DispatchError::Queue(format!("delete failed: {}", DisplayErrorContext(&e))))?;
        Ok(())
    }
}

/// Outcome of one polling cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Messages received
    pub received: usize,
    /// Dispatched and deleted
    pub processed: usize,
    /// Left for redelivery
    pub failed: usize,
}

/// Receives batches and dispatches each message in order.
pub struct Poller<Q> {
    queue: Q,
    dispatcher: Dispatcher,
    idle_interval: Duration,
}

impl<Q: QueueSource> Poller<Q> {
    /// Create a poller. `idle_interval` is the pause after an empty cycle.
    #[must_use]
    pub const fn new(queue: Q, dispatcher: Dispatcher, idle_interval: Duration) -> Self {
        Self {
            queue,
            dispatcher,
            idle_interval,
        }
    }

    /// Run a single receive/dispatch/delete cycle.
    pub async fn poll_once(&self) -> Result<PollReport> {
        let messages = self.queue.receive().await?;
        let mut report = PollReport {
            received: messages.len(),
            ..PollReport::default()
        };

        for message in &messages {
            debug!(message_id = %message.id, "Processing queue message");

            match self.dispatcher.dispatch(&message.body).await {
                Ok(prepared) => {
                    report.processed += 1;
                    debug!(
                        message_id = %message.id,
                        alert = %prepared.alert.name,
                        "Queue message dispatched"
                    );
                    // Redelivery after a failed delete is re-dispatched, which the contract allows
                    if let Err(e) = self.queue.delete(message).await {
                        warn!(message_id = %message.id, error = %e, "Failed to delete queue message");
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    error!(
                        message_id = %message.id,
                        error = %e,
                        "Failed to process queue message, leaving it for redelivery"
                    );
                }
            }
        }

        Ok(report)
    }

    /// Poll forever. Stop it by dropping the future.
    pub async fn run(&self) {
        info!("Queue poller started");
        loop {
            match self.poll_once().await {
                Ok(report) if report.received == 0 => {
                    tokio::time::sleep(self.idle_interval).await;
                }
                Ok(report) => {
                    info!(
                        received = report.received,
                        processed = report.processed,
                        failed = report.failed,
                        "Poll cycle complete"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Queue receive failed");
                    tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
                }
            }
        }
    }
}
