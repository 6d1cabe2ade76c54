use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{assign_request_id, RequestResponse};
use crate::core::error::QueueError;
use crate::core::message::{Message, Response};
use crate::core::publisher::Publisher;
use crate::core::queue::{deadline_after, Connector, QueueTransport};
use crate::core::subscriber::DEFAULT_POLL_TIMEOUT;

/// Publishes a request and polls the response channel for its reply.
///
/// Responses for other request ids are discarded, not requeued, so two
/// waiters sharing a response channel can steal each other's replies. Use
/// [`ResponseRouter`](super::ResponseRouter) for concurrent callers.
#[derive(Debug)]
pub struct ResponseWaiter {
    publisher: Publisher,
    request_channel: String,
    responses: Arc<dyn QueueTransport>,
    response_channel: String,
    poll_timeout: Duration,
}

impl ResponseWaiter {
    pub fn new(
        publisher: Publisher,
        request_channel: impl Into<String>,
        responses: Arc<dyn QueueTransport>,
        response_channel: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            request_channel: request_channel.into(),
            responses,
            response_channel: response_channel.into(),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Opens one connection for publishing and another for the response channel.
    pub async fn connect(
        connector: &dyn Connector,
        request_channel: impl Into<String>,
        response_channel: impl Into<String>,
    ) -> Result<Self, QueueError> {
        let publisher = Publisher::connect(connector).await?;
        let responses = connector.connect().await?;
        Ok(Self::new(publisher, request_channel, responses, response_channel))
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Sends `message` and waits up to `timeout` for the matching response.
    pub async fn request(&self, mut message: Message, timeout: Duration) -> Result<Response, QueueError> {
        let request_id = assign_request_id(&mut message);
        self.publisher.publish_json(&self.request_channel, &message).await?;
        debug!(target: "waiter", %request_id, channel = %self.request_channel, "Sent request");
        self.wait_for(&request_id, timeout).await
    }

    /// Polls the response channel until a response for `request_id` arrives.
    pub async fn wait_for(&self, request_id: &str, timeout: Duration) -> Result<Response, QueueError> {
        let deadline = deadline_after(timeout);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(target: "waiter", %request_id, ?timeout, "Timed out waiting for response");
                return Err(QueueError::ResponseTimeout {
                    request_id: request_id.to_string(),
                    timeout,
                });
            }

            let popped = self
                .responses
                .pop(&self.response_channel, remaining.min(self.poll_timeout))
                .await?;
            let Some(text) = popped else { continue };

            match serde_json::from_str::<Response>(&text) {
                Ok(response) if response.request_id == request_id => return Ok(response),
                Ok(response) => debug!(
                    target: "waiter",
                    expected = %request_id,
                    got = %response.request_id,
                    "Discarding response for another request"
                ),
                Err(e) => warn!(target: "waiter", error = %e, "Discarding undecodable response"),
            }
        }
    }
}

#[async_trait]
impl RequestResponse for ResponseWaiter {
    async fn request(&self, message: Message, timeout: Duration) -> Result<Response, QueueError> {
        ResponseWaiter::request(self, message, timeout).await
    }
}
