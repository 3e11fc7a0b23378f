use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::{CallbackResult, TxContext};

/// Side effect to run once its transaction has committed.
///
/// Callbacks are registered against a transaction with
/// [`Manager::register_callback`](crate::Manager::register_callback) and run
/// concurrently, each on its own task, after a successful commit. They never
/// run when the transaction rolls back or the operation failed.
///
/// The context is advisory. A long-running callback may watch it and stop
/// early, but the engine will wait for it either way.
#[async_trait]
pub trait CommitCallback: Send + Sync + 'static {
    async fn on_commit(&self, ctx: &TxContext) -> CallbackResult;
}

/// Shared, immutable handle to a registered callback.
pub type CallbackRef = Arc<dyn CommitCallback>;

/// Callback built from a zero-argument closure returning a future.
pub struct FnCallback<F> {
    f: F,
}

/// Wrap a closure such as `|| async { cache.invalidate().await }` as a callback.
pub fn callback_fn<F, Fut>(f: F) -> CallbackRef
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallbackResult> + Send + 'static,
{
    Arc::new(FnCallback { f })
}

#[async_trait]
impl<F, Fut> CommitCallback for FnCallback<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallbackResult> + Send + 'static,
{
    async fn on_commit(&self, _ctx: &TxContext) -> CallbackResult {
        (self.f)().await
    }
}
