use async_trait::async_trait;
use tracing::debug;

use crate::{BoxError, Executor, RecoveredPanic, TransactionError, TransactionHandle, TxContext};

/// The commit-or-rollback decision for one transaction.
///
/// Implementations commit when neither `recovered` nor `operation_error` is
/// present and roll back otherwise, returning whatever error the database
/// reported. [`Manager::complete_transaction`](crate::Manager::complete_transaction)
/// calls this exactly once per completion.
#[async_trait]
pub trait Committer<H>: Send + Sync
where
    H: TransactionHandle + ?Sized + 'static,
{
    async fn commit_rollback(
        &self,
        handle: Option<&H>,
        ctx: &TxContext,
        recovered: Option<&RecoveredPanic>,
        operation_error: Option<&BoxError>,
    ) -> Result<(), BoxError>;
}

/// Commits or rolls back the sqlx transaction held by an [`Executor`].
#[derive(Clone, Copy, Debug, Default)]
pub struct PostgresCommitter;

impl PostgresCommitter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Committer<Executor> for PostgresCommitter {
    async fn commit_rollback(
        &self,
        handle: Option<&Executor>,
        _ctx: &TxContext,
        recovered: Option<&RecoveredPanic>,
        operation_error: Option<&BoxError>,
    ) -> Result<(), BoxError> {
        let executor = handle.ok_or(TransactionError::MissingHandle)?;
        let tx = executor.take_transaction().await?;

        if recovered.is_some() || operation_error.is_some() {
            debug!(target: "txmanager", tx = %executor.key(), "rolling back transaction");
            tx.rollback()
                .await
                .map_err(TransactionError::RollbackFailed)?;
        } else {
            tx.commit()
                .await
                .map_err(TransactionError::CommitFailed)?;
            debug!(target: "txmanager", tx = %executor.key(), "transaction committed");
        }
        Ok(())
    }
}
