//! vsmq Subscriber module.
//!
//! Provides the `Subscriber` background listener and the `MessageHandler`
//! callback it drives.

pub mod handler;
#[allow(clippy::module_inception)]
pub mod subscriber;

pub use handler::{handler_fn, FnHandler, MessageHandler};
pub use subscriber::{Subscriber, SubscriberState, DEFAULT_ERROR_BACKOFF, DEFAULT_POLL_TIMEOUT};
