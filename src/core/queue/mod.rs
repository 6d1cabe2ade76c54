//! Queue service abstraction.
//!
//! A queue service exposes named FIFO channels with two operations: append
//! to the tail, and a blocking pop from the head bounded by a timeout.
//! Backends:
//! - [`MemoryQueue`]: in-process channels (embedding, tests, the broker's store)
//! - [`TcpQueue`]: one TCP connection to a `vsmq-broker`
//!
//! Publishers and subscribers never share a transport: each asks a
//! [`Connector`] for its own connection.

pub mod memory;
pub mod tcp;

pub use memory::MemoryQueue;
pub use tcp::{TcpConnector, TcpQueue};

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::core::error::QueueError;

/// Roughly 30 years; stands in for "no deadline".
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + timeout`, saturating far in the future instead of overflowing.
pub fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// One live connection to the queue service.
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait QueueTransport: Send + Sync + Debug {
    /// Append `payload` to the tail of `channel`.
    async fn push(&self, channel: &str, payload: String) -> Result<(), QueueError>;

    /// Put `payload` back at the head of `channel`.
    async fn push_front(&self, channel: &str, payload: String) -> Result<(), QueueError>;

    /// Remove the head of `channel`, waiting up to `timeout` for one to arrive.
    ///
    /// `Ok(None)` means the timeout elapsed with the channel empty.
    async fn pop(&self, channel: &str, timeout: Duration) -> Result<Option<String>, QueueError>;

    /// Number of entries currently waiting on `channel`.
    async fn len(&self, channel: &str) -> Result<usize, QueueError>;

    /// Finishes any request abandoned mid-flight, returning an item it may
    /// have claimed to its channel. Called when a consumer stops.
    async fn settle(&self) -> Result<(), QueueError> {
        Ok(())
    }
}

/// Opens connections to a queue service.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn QueueTransport>, QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn huge_timeouts_saturate_instead_of_panicking() {
        let before = Instant::now();
        let deadline = deadline_after(Duration::MAX);
        assert!(deadline >= before + FAR_FUTURE);

        let short = deadline_after(Duration::from_millis(5));
        assert!(short < before + Duration::from_secs(60));
    }
}
