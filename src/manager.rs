use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    BoxError, CallbackEngine, CallbackRef, CallbackRegistry, Committer, EngineConfig, Failure,
    JoinedError, RecoveredPanic, TransactionHandle, TxContext, TxKey,
};

/// Registers post-commit callbacks and drives transaction completion.
#[async_trait]
pub trait Manager<H>: Send + Sync
where
    H: TransactionHandle + ?Sized + 'static,
{
    /// Queue `callback` to run after `handle` commits. `None` is ignored.
    fn register_callback(&self, handle: Option<&H>, callback: Option<CallbackRef>);

    /// Commit or roll back `handle` through `committer`, then run its callbacks.
    ///
    /// Callbacks run only when the commit succeeded and neither `recovered`
    /// nor `operation_error` is present. Pending callbacks for `handle` are
    /// cleared whatever the outcome. The returned error joins the operation
    /// error (first, when present), the commit error and every callback
    /// failure.
    async fn complete_transaction(
        &self,
        ctx: &TxContext,
        committer: &dyn Committer<H>,
        handle: Option<&H>,
        recovered: Option<RecoveredPanic>,
        operation_error: Option<BoxError>,
    ) -> Result<(), JoinedError>;
}

/// Default [`Manager`]: a sharded callback registry plus the task engine.
///
/// Clones share the same registry, so one instance can be created by the
/// owning service and handed to every repository that registers callbacks.
#[derive(Clone, Debug, Default)]
pub struct TxManager {
    registry: Arc<CallbackRegistry>,
    engine: CallbackEngine,
}

impl TxManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_registry(Arc::new(CallbackRegistry::new()), config)
    }

    /// Build a manager over an existing registry.
    pub fn with_registry(registry: Arc<CallbackRegistry>, config: EngineConfig) -> Self {
        Self {
            registry,
            engine: CallbackEngine::new(config),
        }
    }

    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        self.engine.config()
    }

    /// Number of callbacks waiting on `handle`.
    pub fn pending_count<H>(&self, handle: Option<&H>) -> usize
    where
        H: TransactionHandle + ?Sized,
    {
        self.registry.pending_count(TxKey::of(handle))
    }

    /// Drop the callbacks pending on `handle` without running them.
    ///
    /// For transactions finished outside `complete_transaction`. Returns how
    /// many callbacks were discarded.
    pub fn discard<H>(&self, handle: Option<&H>) -> usize
    where
        H: TransactionHandle + ?Sized,
    {
        let key = TxKey::of(handle);
        let discarded = self.registry.claim_and_clear(key).len();
        if discarded > 0 {
            debug!(target: "txmanager", tx = %key, discarded, "discarded pending callbacks");
        }
        discarded
    }
}

#[async_trait]
impl<H> Manager<H> for TxManager
where
    H: TransactionHandle + ?Sized + 'static,
{
    fn register_callback(&self, handle: Option<&H>, callback: Option<CallbackRef>) {
        self.registry.register(TxKey::of(handle), callback);
    }

    async fn complete_transaction(
        &self,
        ctx: &TxContext,
        committer: &dyn Committer<H>,
        handle: Option<&H>,
        recovered: Option<RecoveredPanic>,
        operation_error: Option<BoxError>,
    ) -> Result<(), JoinedError> {
        let key = TxKey::of(handle);
        let commit_result = committer
            .commit_rollback(handle, ctx, recovered.as_ref(), operation_error.as_ref())
            .await;

        let committed = commit_result.is_ok() && operation_error.is_none() && recovered.is_none();

        // Claimed unconditionally so nothing outlives the transaction.
        let claimed = self.registry.claim_and_clear(key);
        let callback_error = if committed {
            self.engine.run_all(ctx, claimed).await.err()
        } else {
            if !claimed.is_empty() {
                debug!(
                    target: "txmanager",
                    tx = %key,
                    discarded = claimed.len(),
                    "transaction not committed, skipping callbacks"
                );
            }
            None
        };

        if let Some(panic) = &recovered {
            warn!(target: "txmanager", tx = %key, %panic, "operation panicked, transaction rolled back");
        }

        let mut failures = Vec::with_capacity(2);
        if let Some(err) = operation_error {
            failures.push(Failure::Operation(err));
        }
        if let Err(err) = commit_result {
            warn!(target: "txmanager", tx = %key, error = %err, "commit/rollback failed");
            failures.push(Failure::Commit(err));
        }

        match JoinedError::merge(failures, callback_error) {
            None => Ok(()),
            Some(joined) => Err(joined),
        }
    }
}
