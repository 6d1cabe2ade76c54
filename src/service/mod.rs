//! The vector store service: a dispatcher draining the work queue and
//! answering on the response queue.

pub mod dispatcher;

pub use dispatcher::{Dispatcher, DEFAULT_N_RESULTS};

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::core::error::QueueError;
use crate::core::queue::Connector;
use crate::core::queue_manager::{QueueManager, QueueManagerOptions};
use crate::store::VectorStore;

#[derive(Debug)]
pub struct VectorStoreService {
    requests: QueueManager,
    responses: QueueManager,
    dispatcher: Arc<Dispatcher>,
}

impl VectorStoreService {
    /// Connects both queue managers and starts processing the work queue.
    pub async fn start(
        connector: &dyn Connector,
        config: &Config,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self, QueueError> {
        let responses = QueueManager::sender(connector, config.queue.response_queue.clone()).await?;
        let publisher = responses.publisher().cloned().ok_or(QueueError::NoPublisher)?;

        let dispatcher = Arc::new(
            Dispatcher::new(store)
                .with_responses(publisher, config.queue.response_queue.clone())
                .with_default_n_results(config.store.default_n_results),
        );

        let options = QueueManagerOptions::default()
            .receive_from(config.queue.work_queue.clone())
            .poll_timeout(config.queue.poll_timeout())
            .error_backoff(config.queue.error_backoff());
        let requests = QueueManager::connect(connector, options).await?;
        requests.start_background_processing(dispatcher.clone())?;

        info!(
            target: "service",
            work_queue = %config.queue.work_queue,
            response_queue = %config.queue.response_queue,
            "Vector store service started"
        );
        Ok(Self {
            requests,
            responses,
            dispatcher,
        })
    }

    /// Stops the work-queue subscriber; returns once no message is in flight.
    pub async fn shutdown(&self) -> Result<(), QueueError> {
        self.requests.stop_background_processing().await?;
        info!(target: "service", "Vector store service stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.requests
            .subscriber()
            .is_some_and(|subscriber| subscriber.is_listening())
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn response_queue(&self) -> Option<&str> {
        self.responses.send_channel()
    }
}
