//! Fixed-delay backoff used after a failed loop iteration.
//!
//! Keeps a persistently failing loop (queue service down, handler erroring on
//! every message) from spinning, while still letting a stop request cut the
//! wait short.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub struct FixedBackoff {
    delay: Duration,
}

impl FixedBackoff {
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Waits out the delay.
    ///
    /// Returns `false` without waiting (or as soon as it happens) if `cancel`
    /// is triggered.
    pub async fn snooze(&self, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.delay) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn snooze_waits_the_full_delay() {
        let backoff = FixedBackoff::new(Duration::from_millis(30));
        let started = Instant::now();
        assert!(backoff.snooze(&CancellationToken::new()).await);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn cancellation_cuts_the_wait_short() {
        let backoff = FixedBackoff::new(Duration::from_secs(30));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let started = Instant::now();
        assert!(!backoff.snooze(&cancel).await);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
