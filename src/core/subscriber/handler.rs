use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::message::Payload;

/// Callback invoked by a [`Subscriber`](super::Subscriber) for every dequeued message.
///
/// Invocations for one subscriber are strictly sequential. An `Err` is logged
/// by the listen loop, which then backs off before polling again.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: Payload) -> anyhow::Result<()>;
}

/// Adapter turning an async closure into a [`MessageHandler`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, payload: Payload) -> anyhow::Result<()> {
        (self.0)(payload).await
    }
}

pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}
