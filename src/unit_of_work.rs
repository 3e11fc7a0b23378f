use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

use crate::{Executor, TransactionHandle, TransactionResult};

/// Unit of Work pattern for managing database transactions.
///
/// Each call to `begin` opens a transaction and returns a handle that
/// repositories share and that commit callbacks are registered against.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    type Handle: TransactionHandle + 'static;

    /// Begin a new transaction.
    async fn begin(&self) -> TransactionResult<Self::Handle>;
}

/// Default implementation of UnitOfWork for PostgreSQL.
#[derive(Clone, Debug)]
pub struct PostgresUnitOfWork {
    pool: Arc<PgPool>,
}

impl PostgresUnitOfWork {
    /// Create a new PostgresUnitOfWork with the given connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    type Handle = Executor;

    async fn begin(&self) -> TransactionResult<Self::Handle> {
        let tx = self.pool.begin().await?;
        Ok(Executor::new(tx))
    }
}
