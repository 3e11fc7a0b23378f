//! Post-commit callbacks for Postgres transactions.
//!
//! Side effects such as cache invalidation or notifications are registered
//! against an in-flight transaction and run, concurrently and isolated from
//! each other, only once that transaction has committed. If the operation
//! failed, panicked, or the commit itself failed, they are dropped.
//!
//! ```ignore
//! let manager = TxManager::new();
//! let tx = uow.begin().await?;
//!
//! manager.register_callback(Some(&tx), Some(callback_fn(|| async { Ok(()) })));
//! let result = repo.create(&tx, &user).await.err().map(Into::into);
//!
//! manager
//!     .complete_transaction(&TxContext::background(), &PostgresCommitter, Some(&tx), None, result)
//!     .await?;
//! ```

pub mod callback;
pub mod committer;
pub mod context;
pub mod engine;
pub mod error;
pub mod executor;
pub mod handle;
pub mod manager;
pub mod recovery;
pub mod registry;
pub mod unit_of_work;

pub use callback::{callback_fn, CallbackRef, CommitCallback, FnCallback};
pub use committer::{Committer, PostgresCommitter};
pub use context::TxContext;
pub use engine::{CallbackEngine, EngineConfig};
pub use error::{
    BoxError, CallbackResult, Failure, JoinedError, TransactionError, TransactionResult,
};
pub use executor::Executor;
pub use handle::{TransactionHandle, TxKey};
pub use manager::{Manager, TxManager};
pub use recovery::{panic_message, RecoveredPanic};
pub use registry::{CallbackRegistry, PendingCallbacks};
pub use unit_of_work::{PostgresUnitOfWork, UnitOfWork};
