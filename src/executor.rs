use sqlx::{Postgres, Transaction};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{TransactionError, TransactionHandle, TransactionResult, TxKey};

/// Executor wraps a database transaction for use by repositories.
///
/// This struct provides a shared reference to a PostgreSQL transaction
/// that can be passed to multiple repositories within a unit of work.
/// Every clone carries the same [`TxKey`], which is what commit callbacks
/// are registered under.
#[derive(Clone, Debug)]
pub struct Executor {
    key: TxKey,
    pub tx: Arc<Mutex<Option<Transaction<'static, Postgres>>>>,
}

impl Executor {
    /// Creates a new Executor from a PostgreSQL transaction.
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self {
            key: TxKey::new(),
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }

    pub fn key(&self) -> TxKey {
        self.key
    }

    /// Whether the transaction is still open (not yet committed or rolled back).
    pub async fn is_open(&self) -> bool {
        self.tx.lock().await.is_some()
    }

    /// Takes ownership of the transaction, leaving None in its place.
    /// This should only be called when committing or rolling back.
    pub(crate) async fn take_transaction(&self) -> TransactionResult<Transaction<'static, Postgres>> {
        self.tx
            .lock()
            .await
            .take()
            .ok_or(TransactionError::TransactionClosed)
    }
}

impl TransactionHandle for Executor {
    fn tx_key(&self) -> TxKey {
        self.key
    }
}
