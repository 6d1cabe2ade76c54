//! Client side of the request/response exchange.
//!
//! - [`ResponseWaiter`]: one request at a time, polling the response channel
//! - [`ResponseRouter`]: concurrent requests over one shared subscriber
//! - [`VectorStoreClient`]: typed actions on top of either

pub mod router;
pub mod waiter;

pub use router::ResponseRouter;
pub use waiter::ResponseWaiter;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::core::error::QueueError;
use crate::core::message::{Action, Message, Response};

/// Sends one message and returns its correlated response.
#[async_trait]
pub trait RequestResponse: Send + Sync {
    async fn request(&self, message: Message, timeout: Duration) -> Result<Response, QueueError>;
}

/// Returns the message's `request_id`, inserting a fresh UUID v4 if it has none.
pub fn assign_request_id(message: &mut Message) -> String {
    if let Some(id) = message
        .get("request_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
    {
        return id.to_owned();
    }
    let id = Uuid::new_v4().to_string();
    message.insert("request_id".into(), Value::String(id.clone()));
    id
}

fn action_message(action: Action) -> Message {
    let mut message = Message::new();
    message.insert("action".into(), Value::String(action.as_str().into()));
    message
}

/// Typed helpers for each vector store action.
#[derive(Debug)]
pub struct VectorStoreClient<R> {
    transport: R,
    timeout: Duration,
}

impl<R: RequestResponse> VectorStoreClient<R> {
    pub fn new(transport: R, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends an arbitrary message.
    pub async fn send(&self, message: Message) -> Result<Response, QueueError> {
        self.transport.request(message, self.timeout).await
    }

    pub async fn create_collection(&self, collection: &str) -> Result<Response, QueueError> {
        let mut message = action_message(Action::CreateCollection);
        message.insert("collection_name".into(), collection.into());
        self.send(message).await
    }

    pub async fn add_data<I, K, V>(&self, collection: &str, data: I) -> Result<Response, QueueError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let data: Map<String, Value> = data
            .into_iter()
            .map(|(k, v)| (k.into(), Value::String(v.into())))
            .collect();
        let mut message = action_message(Action::AddData);
        message.insert("collection_name".into(), collection.into());
        message.insert("data".into(), Value::Object(data));
        self.send(message).await
    }

    pub async fn search(
        &self,
        collection: &str,
        query: &str,
        n_results: Option<usize>,
    ) -> Result<Response, QueueError> {
        let mut message = action_message(Action::Search);
        message.insert("collection_name".into(), collection.into());
        message.insert("query".into(), query.into());
        if let Some(n) = n_results {
            message.insert("n_results".into(), n.into());
        }
        self.send(message).await
    }

    pub async fn delete_collection(&self, collection: &str) -> Result<Response, QueueError> {
        let mut message = action_message(Action::DeleteCollection);
        message.insert("collection_name".into(), collection.into());
        self.send(message).await
    }

    pub async fn list_collections(&self) -> Result<Response, QueueError> {
        self.send(action_message(Action::ListCollections)).await
    }

    /// The answer is in [`Response::exists`].
    pub async fn collection_exists(&self, collection: &str) -> Result<Response, QueueError> {
        let mut message = action_message(Action::CollectionExists);
        message.insert("collection_name".into(), collection.into());
        self.send(message).await
    }

    pub fn into_inner(self) -> R {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_request_id_is_kept() {
        let mut message = Message::new();
        message.insert("request_id".into(), "abc".into());
        assert_eq!(assign_request_id(&mut message), "abc");
    }

    #[test]
    fn missing_request_id_gets_a_uuid() {
        let mut message = action_message(Action::ListCollections);
        let id = assign_request_id(&mut message);
        assert!(Uuid::parse_str(&id).is_ok());
        assert_eq!(message.get("request_id"), Some(&Value::String(id)));
    }
}
