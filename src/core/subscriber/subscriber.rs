use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::error::QueueError;
use crate::core::message::Payload;
use crate::core::queue::{Connector, QueueTransport};
use crate::core::subscriber::MessageHandler;
use crate::util::backoff::FixedBackoff;

pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    /// No loop running.
    Idle,
    /// Background loop active, polling and dispatching.
    Listening,
    /// Stop requested; the loop is finishing its current iteration.
    Stopping,
}

struct Listener {
    channel: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drains one channel on a background task, handing each message to a handler.
///
/// At most one loop runs per subscriber. Once [`stop`](Self::stop) returns
/// the loop task has exited, so the handler is never invoked again.
pub struct Subscriber {
    transport: Arc<dyn QueueTransport>,
    poll_timeout: Duration,
    backoff: FixedBackoff,
    listener: Mutex<Option<Listener>>,
    stopping: AtomicBool,
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("channel", &self.channel())
            .field("state", &self.state())
            .field("poll_timeout", &self.poll_timeout)
            .finish()
    }
}

impl Subscriber {
    pub fn new(transport: Arc<dyn QueueTransport>) -> Self {
        Self {
            transport,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            backoff: FixedBackoff::new(DEFAULT_ERROR_BACKOFF),
            listener: Mutex::new(None),
            stopping: AtomicBool::new(false),
        }
    }

    /// Creates a subscriber with its own connection from `connector`.
    pub async fn connect(connector: &dyn Connector) -> Result<Self, QueueError> {
        Ok(Self::new(connector.connect().await?))
    }

    /// Upper bound on a single blocking pop; also bounds how long a stop
    /// request can go unnoticed by a backend that ignores cancellation.
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Pause after a failed iteration before polling again.
    pub fn with_error_backoff(mut self, error_backoff: Duration) -> Self {
        self.backoff = FixedBackoff::new(error_backoff);
        self
    }

    fn listener(&self) -> MutexGuard<'_, Option<Listener>> {
        self.listener.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Starts draining `channel` into `handler` on a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        &self,
        channel: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), QueueError> {
        let mut slot = self.listener();
        if let Some(active) = slot.as_ref() {
            if !active.handle.is_finished() {
                return Err(QueueError::AlreadyRunning(active.channel.clone()));
            }
        }

        let channel = channel.into();
        let cancel = CancellationToken::new();
        let listen = ListenLoop {
            transport: Arc::clone(&self.transport),
            channel: channel.clone(),
            handler,
            cancel: cancel.clone(),
            poll_timeout: self.poll_timeout,
            backoff: self.backoff,
        };
        let handle = tokio::spawn(listen.run());

        info!(target: "subscriber", %channel, "Started subscriber");
        *slot = Some(Listener {
            channel,
            cancel,
            handle,
        });
        Ok(())
    }

    /// Signals the loop to exit and waits until its task has finished.
    ///
    /// A pop interrupted by the stop is then settled on the transport, which
    /// can take up to the poll timeout. A no-op when no loop is running. Only
    /// a failure to join the loop task is reported.
    pub async fn stop(&self) -> Result<(), QueueError> {
        let listener = self.listener().take();
        let Some(listener) = listener else {
            return Ok(());
        };

        self.stopping.store(true, Ordering::SeqCst);
        listener.cancel.cancel();
        let joined = listener.handle.await;
        if let Err(e) = self.transport.settle().await {
            warn!(target: "subscriber", channel = %listener.channel, error = %e, "Failed to settle queue connection");
        }
        self.stopping.store(false, Ordering::SeqCst);

        info!(target: "subscriber", channel = %listener.channel, "Stopped subscriber");
        joined.map_err(QueueError::from)
    }

    pub fn state(&self) -> SubscriberState {
        if self.stopping.load(Ordering::SeqCst) {
            return SubscriberState::Stopping;
        }
        match self.listener().as_ref() {
            Some(active) if !active.handle.is_finished() => SubscriberState::Listening,
            _ => SubscriberState::Idle,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.state() == SubscriberState::Listening
    }

    /// Channel of the current (or last started, not yet stopped) loop.
    pub fn channel(&self) -> Option<String> {
        self.listener().as_ref().map(|active| active.channel.clone())
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        let slot = self
            .listener
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(active) = slot.take() {
            active.cancel.cancel();
        }
    }
}

struct ListenLoop {
    transport: Arc<dyn QueueTransport>,
    channel: String,
    handler: Arc<dyn MessageHandler>,
    cancel: CancellationToken,
    poll_timeout: Duration,
    backoff: FixedBackoff,
}

impl ListenLoop {
    async fn run(self) {
        debug!(target: "subscriber", channel = %self.channel, "Listen loop running");

        loop {
            let popped = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                popped = self.transport.pop(&self.channel, self.poll_timeout) => popped,
            };

            let outcome = match popped {
                Ok(None) => continue,
                Ok(Some(text)) => self.deliver(Payload::decode(&text)).await,
                Err(e) => Err(anyhow::Error::from(e)),
            };

            if let Err(e) = outcome {
                let reason = format!("{e:#}");
                error!(
                    target: "subscriber",
                    channel = %self.channel,
                    error = %reason,
                    "Error listening to queue"
                );
                if !self.backoff.snooze(&self.cancel).await {
                    break;
                }
            }
        }

        debug!(target: "subscriber", channel = %self.channel, "Listen loop exited");
    }

    async fn deliver(&self, payload: Payload) -> anyhow::Result<()> {
        match AssertUnwindSafe(self.handler.handle(payload)).catch_unwind().await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!("message handler panicked")),
        }
    }
}
