//! Best-effort publication of booking notifications.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};

/// Errors raised while handing a notification to the transport.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("notification queue is full")]
    QueueFull,

    #[error("notification channel closed")]
    ChannelClosed,

    #[error("publish rejected: {0}")]
    Rejected(String),
}

/// A notification as handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub key: String,
    pub payload: serde_json::Value,
}

/// Transport for booking notifications.
///
/// Delivery is at most once. Callers log failures and carry on.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: serde_json::Value,
    ) -> Result<(), PublishError>;
}

#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: serde_json::Value,
    ) -> Result<(), PublishError> {
        (**self).publish(topic, key, payload).await
    }
}

#[derive(Debug, Default)]
struct RecordingState {
    published: Vec<PublishedMessage>,
    attempts: usize,
    fail_on_publish: bool,
}

/// Publisher that records messages in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventPublisher {
    state: Arc<Mutex<RecordingState>>,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent publish fail until reset.
    pub async fn set_fail_on_publish(&self, fail: bool) {
        self.state.lock().await.fail_on_publish = fail;
    }

    /// Successfully published messages, in order.
    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.state.lock().await.published.clone()
    }

    /// Published messages on one topic.
    pub async fn published_on(&self, topic: &str) -> Vec<PublishedMessage> {
        self.state
            .lock()
            .await
            .published
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Number of publish calls, failed ones included.
    pub async fn attempts(&self) -> usize {
        self.state.lock().await.attempts
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: serde_json::Value,
    ) -> Result<(), PublishError> {
        let mut state = self.state.lock().await;
        state.attempts += 1;

        if state.fail_on_publish {
            return Err(PublishError::Rejected("broker unavailable".to_string()));
        }

        state.published.push(PublishedMessage {
            topic: topic.to_string(),
            key: key.to_string(),
            payload,
        });
        Ok(())
    }
}

/// Publisher that hands messages to a bounded in-process queue.
///
/// Never waits: a full queue drops the message with [`PublishError::QueueFull`].
#[derive(Debug, Clone)]
pub struct ChannelEventPublisher {
    sender: mpsc::Sender<PublishedMessage>,
}

impl ChannelEventPublisher {
    /// Creates a publisher and the receiving end of its queue.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PublishedMessage>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventPublisher for ChannelEventPublisher {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: serde_json::Value,
    ) -> Result<(), PublishError> {
        let message = PublishedMessage {
            topic: topic.to_string(),
            key: key.to_string(),
            payload,
        };
        self.sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PublishError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => PublishError::ChannelClosed,
        })
    }
}
