use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error};

use crate::core::error::QueueError;
use crate::core::message::Payload;
use crate::core::queue::{Connector, QueueTransport};

/// Appends messages to the tail of named channels.
///
/// - Fire-and-forget: no acknowledgment and no retry.
/// - Transport failures are returned to the caller untouched, so from the
///   caller's side delivery is at most once.
#[derive(Debug, Clone)]
pub struct Publisher {
    transport: Arc<dyn QueueTransport>,
}

impl Publisher {
    /// Creates a publisher over an existing connection.
    pub fn new(transport: Arc<dyn QueueTransport>) -> Self {
        Self { transport }
    }

    /// Creates a publisher with its own connection from `connector`.
    pub async fn connect(connector: &dyn Connector) -> Result<Self, QueueError> {
        Ok(Self::new(connector.connect().await?))
    }

    /// Publishes a payload to `channel`.
    ///
    /// Raw strings are sent verbatim; JSON values are serialized first.
    pub async fn publish(&self, channel: &str, payload: &Payload) -> Result<(), QueueError> {
        let text = payload.encode()?;
        self.publish_text(channel, text).await
    }

    /// Serializes `message` to JSON and publishes it to `channel`.
    pub async fn publish_json<T>(&self, channel: &str, message: &T) -> Result<(), QueueError>
    where
        T: Serialize + ?Sized,
    {
        let text = serde_json::to_string(message)?;
        self.publish_text(channel, text).await
    }

    async fn publish_text(&self, channel: &str, text: String) -> Result<(), QueueError> {
        match self.transport.push(channel, text).await {
            Ok(()) => {
                debug!(target: "publisher", %channel, "Published message");
                Ok(())
            }
            Err(e) => {
                error!(target: "publisher", %channel, error = %e, "Error publishing message");
                Err(e)
            }
        }
    }
}
