use std::time::Duration;

use thiserror::Error;

use crate::core::protocol::FrameError;
use crate::store::StoreError;

/// Failures of the queue layer: transport, lifecycle and correlation.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("queue protocol error: {0}")]
    Protocol(#[from] FrameError),

    #[error("queue service rejected request: {0}")]
    Broker(String),

    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("subscriber already running on channel {0}")]
    AlreadyRunning(String),

    #[error("no publisher configured")]
    NoPublisher,

    #[error("no subscriber configured")]
    NoSubscriber,

    #[error("request {0} is already awaiting a response")]
    DuplicateRequest(String),

    #[error("response router shut down before request {0} was answered")]
    RouterClosed(String),

    #[error("no response received for request {request_id} within {timeout:?}")]
    ResponseTimeout { request_id: String, timeout: Duration },

    #[error("subscriber loop failed to join: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Per-message failures inside the dispatcher.
///
/// None of these ever leave the dispatcher: each is turned into a
/// `status: error` response carrying `to_string()`.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0}")]
    Validation(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("{0}")]
    Handler(#[from] StoreError),
}
