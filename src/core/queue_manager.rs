use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::error::QueueError;
use super::message::Payload;
use super::publisher::Publisher;
use super::queue::Connector;
use super::subscriber::{MessageHandler, Subscriber, DEFAULT_ERROR_BACKOFF, DEFAULT_POLL_TIMEOUT};

/// Channel names and loop timings for a [`QueueManager`].
#[derive(Debug, Clone)]
pub struct QueueManagerOptions {
    pub send_channel: Option<String>,
    pub receive_channel: Option<String>,
    pub poll_timeout: Duration,
    pub error_backoff: Duration,
}

impl Default for QueueManagerOptions {
    fn default() -> Self {
        Self {
            send_channel: None,
            receive_channel: None,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            error_backoff: DEFAULT_ERROR_BACKOFF,
        }
    }
}

impl QueueManagerOptions {
    pub fn send_to(mut self, channel: impl Into<String>) -> Self {
        self.send_channel = Some(channel.into());
        self
    }

    pub fn receive_from(mut self, channel: impl Into<String>) -> Self {
        self.receive_channel = Some(channel.into());
        self
    }

    pub fn poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    pub fn error_backoff(mut self, error_backoff: Duration) -> Self {
        self.error_backoff = error_backoff;
        self
    }
}

/// A publisher and/or subscriber bound to fixed channel names.
///
/// Which halves exist depends on which channel names were supplied; each
/// half owns its own connection to the queue service.
#[derive(Debug)]
pub struct QueueManager {
    send_channel: Option<String>,
    receive_channel: Option<String>,
    publisher: Option<Publisher>,
    subscriber: Option<Subscriber>,
}

impl QueueManager {
    pub async fn connect(
        connector: &dyn Connector,
        options: QueueManagerOptions,
    ) -> Result<Self, QueueError> {
        let publisher = match options.send_channel {
            Some(_) => Some(Publisher::connect(connector).await?),
            None => None,
        };
        let subscriber = match options.receive_channel {
            Some(_) => Some(
                Subscriber::connect(connector)
                    .await?
                    .with_poll_timeout(options.poll_timeout)
                    .with_error_backoff(options.error_backoff),
            ),
            None => None,
        };

        Ok(Self {
            send_channel: options.send_channel,
            receive_channel: options.receive_channel,
            publisher,
            subscriber,
        })
    }

    /// Send-only manager.
    pub async fn sender(connector: &dyn Connector, channel: impl Into<String>) -> Result<Self, QueueError> {
        Self::connect(connector, QueueManagerOptions::default().send_to(channel)).await
    }

    /// Receive-only manager.
    pub async fn receiver(connector: &dyn Connector, channel: impl Into<String>) -> Result<Self, QueueError> {
        Self::connect(connector, QueueManagerOptions::default().receive_from(channel)).await
    }

    fn send_half(&self) -> Result<(&Publisher, &str), QueueError> {
        match (&self.publisher, &self.send_channel) {
            (Some(publisher), Some(channel)) => Ok((publisher, channel.as_str())),
            _ => Err(QueueError::NoPublisher),
        }
    }

    /// Serializes `message` and publishes it on the send channel.
    pub async fn send_message<T>(&self, message: &T) -> Result<(), QueueError>
    where
        T: Serialize + ?Sized,
    {
        let (publisher, channel) = self.send_half()?;
        publisher.publish_json(channel, message).await
    }

    pub async fn send_payload(&self, payload: &Payload) -> Result<(), QueueError> {
        let (publisher, channel) = self.send_half()?;
        publisher.publish(channel, payload).await
    }

    /// Starts draining the receive channel into `handler`.
    pub fn start_background_processing(&self, handler: Arc<dyn MessageHandler>) -> Result<(), QueueError> {
        match (&self.subscriber, &self.receive_channel) {
            (Some(subscriber), Some(channel)) => subscriber.start(channel.clone(), handler),
            _ => Err(QueueError::NoSubscriber),
        }
    }

    /// Stops background processing; a no-op without a subscriber.
    pub async fn stop_background_processing(&self) -> Result<(), QueueError> {
        match &self.subscriber {
            Some(subscriber) => subscriber.stop().await,
            None => Ok(()),
        }
    }

    pub fn publisher(&self) -> Option<&Publisher> {
        self.publisher.as_ref()
    }

    pub fn subscriber(&self) -> Option<&Subscriber> {
        self.subscriber.as_ref()
    }

    pub fn send_channel(&self) -> Option<&str> {
        self.send_channel.as_deref()
    }

    pub fn receive_channel(&self) -> Option<&str> {
        self.receive_channel.as_deref()
    }
}
