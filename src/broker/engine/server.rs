//! Accept loop for the queue service.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::broker::client::handle_client;
use crate::core::queue::MemoryQueue;

/// Binds `bind_addr` and serves until `shutdown` fires.
pub async fn start_broker(
    bind_addr: &str,
    shutdown: CancellationToken,
    max_frame_bytes: usize,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    serve(listener, shutdown, max_frame_bytes).await
}

/// Serves queue requests on `listener` against one shared [`MemoryQueue`].
///
/// Each connection runs on its own task. On shutdown the listener stops
/// accepting and every connection task is awaited.
pub async fn serve(
    listener: TcpListener,
    shutdown: CancellationToken,
    max_frame_bytes: usize,
) -> anyhow::Result<()> {
    let queue = MemoryQueue::new();
    serve_with(listener, queue, shutdown, max_frame_bytes).await
}

/// Like [`serve`], over a caller-provided queue.
pub async fn serve_with(
    listener: TcpListener,
    queue: MemoryQueue,
    shutdown: CancellationToken,
    max_frame_bytes: usize,
) -> anyhow::Result<()> {
    info!(target: "broker", addr = %listener.local_addr()?, "Queue service listening");
    let queue = Arc::new(queue);
    let mut clients = JoinSet::new();

    loop {
        let (socket, peer_addr) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(target: "broker", error = %e, "Failed to accept connection");
                    continue;
                }
            },
        };
        socket.set_nodelay(true)?;
        info!(target: "broker", peer = %peer_addr, "Client connected");

        let queue = Arc::clone(&queue);
        let shutdown = shutdown.clone();
        clients.spawn(async move {
            if let Err(e) = handle_client(socket, peer_addr, &queue, max_frame_bytes, shutdown).await {
                let reason = format!("{e:#}");
                error!(target: "broker", peer = %peer_addr, error = %reason, "Error handling client");
            }
        });

        // reap finished connections
        while clients.try_join_next().is_some() {}
    }

    info!(target: "broker", active = clients.len(), "Queue service shutting down");
    while clients.join_next().await.is_some() {}
    Ok(())
}
