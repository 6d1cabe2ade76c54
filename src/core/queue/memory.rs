//! In-process queue service.
//!
//! Uses DashMap so that channels are created and looked up without a global
//! lock; each channel is a mutex-guarded deque plus a `Notify` that wakes one
//! blocked popper per push. Cloning a `MemoryQueue` yields another handle to
//! the same channels.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Notify;
use tokio::time::timeout_at;

use crate::core::error::QueueError;
use crate::core::queue::{deadline_after, Connector, QueueTransport};

#[derive(Debug, Default)]
struct ChannelQueue {
    items: Mutex<VecDeque<String>>,
    notify: Notify,
}

impl ChannelQueue {
    fn items(&self) -> MutexGuard<'_, VecDeque<String>> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Named FIFO channels held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueue {
    channels: Arc<DashMap<String, Arc<ChannelQueue>>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn channel(&self, name: &str) -> Arc<ChannelQueue> {
        if let Some(existing) = self.channels.get(name) {
            return Arc::clone(&*existing);
        }
        let entry = self.channels.entry(name.to_string()).or_default();
        Arc::clone(&*entry)
    }

    fn enqueue(&self, channel: &str, payload: String, front: bool) {
        let queue = self.channel(channel);
        {
            let mut items = queue.items();
            if front {
                items.push_front(payload);
            } else {
                items.push_back(payload);
            }
        }
        queue.notify.notify_one();
    }

    /// Non-blocking pop.
    pub fn try_pop(&self, channel: &str) -> Option<String> {
        self.channels
            .get(channel)
            .and_then(|queue| queue.items().pop_front())
    }

}

#[async_trait]
impl QueueTransport for MemoryQueue {
    async fn push(&self, channel: &str, payload: String) -> Result<(), QueueError> {
        self.enqueue(channel, payload, false);
        Ok(())
    }

    async fn push_front(&self, channel: &str, payload: String) -> Result<(), QueueError> {
        self.enqueue(channel, payload, true);
        Ok(())
    }

    async fn pop(&self, channel: &str, timeout: Duration) -> Result<Option<String>, QueueError> {
        let queue = self.channel(channel);
        let deadline = deadline_after(timeout);

        loop {
            // Register interest before looking, so a push landing between the
            // check and the wait still wakes us.
            let notified = queue.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next = queue.items().pop_front();
            if let Some(item) = next {
                return Ok(Some(item));
            }
            if timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn len(&self, channel: &str) -> Result<usize, QueueError> {
        Ok(self
            .channels
            .get(channel)
            .map(|queue| queue.items().len())
            .unwrap_or(0))
    }
}

#[async_trait]
impl Connector for MemoryQueue {
    async fn connect(&self) -> Result<Arc<dyn QueueTransport>, QueueError> {
        Ok(Arc::new(self.clone()))
    }
}
