use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::{assign_request_id, RequestResponse};
use crate::core::error::QueueError;
use crate::core::message::{Message, Payload, Response};
use crate::core::publisher::Publisher;
use crate::core::queue::Connector;
use crate::core::subscriber::{MessageHandler, Subscriber};

/// Waiters keyed by request id.
#[derive(Debug, Default)]
struct PendingReplies {
    waiters: DashMap<String, oneshot::Sender<Response>>,
}

#[async_trait]
impl MessageHandler for PendingReplies {
    async fn handle(&self, payload: Payload) -> anyhow::Result<()> {
        let Some(object) = payload.into_object() else {
            warn!(target: "waiter", "Dropping non-object response");
            return Ok(());
        };
        let response: Response = match serde_json::from_value(object.into()) {
            Ok(response) => response,
            Err(e) => {
                warn!(target: "waiter", error = %e, "Dropping undecodable response");
                return Ok(());
            }
        };

        match self.waiters.remove(&response.request_id) {
            Some((request_id, waiter)) => {
                if waiter.send(response).is_err() {
                    debug!(target: "waiter", %request_id, "Waiter gave up before the response arrived");
                }
            }
            None => warn!(
                target: "waiter",
                request_id = %response.request_id,
                "No waiter registered for response"
            ),
        }
        Ok(())
    }
}

/// Correlates responses for any number of concurrent requests.
///
/// One subscriber drains the response channel and hands each response to the
/// caller that registered its request id.
#[derive(Debug)]
pub struct ResponseRouter {
    publisher: Publisher,
    request_channel: String,
    pending: Arc<PendingReplies>,
    subscriber: Subscriber,
}

impl ResponseRouter {
    /// Connects and starts draining `response_channel`.
    pub async fn start(
        connector: &dyn Connector,
        request_channel: impl Into<String>,
        response_channel: impl Into<String>,
        poll_timeout: Duration,
    ) -> Result<Self, QueueError> {
        let publisher = Publisher::connect(connector).await?;
        let subscriber = Subscriber::connect(connector)
            .await?
            .with_poll_timeout(poll_timeout);
        let pending = Arc::new(PendingReplies::default());
        subscriber.start(response_channel, pending.clone())?;

        Ok(Self {
            publisher,
            request_channel: request_channel.into(),
            pending,
            subscriber,
        })
    }

    /// Sends `message` and waits up to `timeout` for its own response.
    pub async fn request(&self, mut message: Message, timeout: Duration) -> Result<Response, QueueError> {
        let request_id = assign_request_id(&mut message);
        let (tx, rx) = oneshot::channel();
        match self.pending.waiters.entry(request_id.clone()) {
            Entry::Occupied(_) => return Err(QueueError::DuplicateRequest(request_id)),
            Entry::Vacant(slot) => {
                slot.insert(tx);
            }
        }

        if let Err(e) = self.publisher.publish_json(&self.request_channel, &message).await {
            self.pending.waiters.remove(&request_id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            // sender dropped: the router was shut down
            Ok(Err(_)) => Err(QueueError::RouterClosed(request_id)),
            Err(_) => {
                self.pending.waiters.remove(&request_id);
                warn!(target: "waiter", %request_id, ?timeout, "Timed out waiting for response");
                Err(QueueError::ResponseTimeout { request_id, timeout })
            }
        }
    }

    /// Requests still waiting for a response.
    pub fn pending(&self) -> usize {
        self.pending.waiters.len()
    }

    /// Stops the response subscriber and fails every outstanding request.
    pub async fn shutdown(&self) -> Result<(), QueueError> {
        self.subscriber.stop().await?;
        self.pending.waiters.clear();
        Ok(())
    }
}

#[async_trait]
impl RequestResponse for ResponseRouter {
    async fn request(&self, message: Message, timeout: Duration) -> Result<Response, QueueError> {
        ResponseRouter::request(self, message, timeout).await
    }
}
