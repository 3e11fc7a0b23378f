//! Per-transaction store of pending commit callbacks.
//!
//! Sharded via DashMap: an append only locks the shard owning the
//! transaction's key, so registrations for unrelated transactions proceed
//! in parallel.

use dashmap::DashMap;

use crate::{CallbackRef, TxKey};

/// Callbacks awaiting a transaction's commit, in registration order.
pub type PendingCallbacks = Vec<CallbackRef>;

#[derive(Default)]
pub struct CallbackRegistry {
    pending: DashMap<TxKey, PendingCallbacks>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `callback` to the list for `key`. `None` is ignored.
    ///
    /// The push happens under the key's shard lock, so concurrent
    /// registrations on the same key are never lost.
    pub fn register(&self, key: TxKey, callback: Option<CallbackRef>) {
        let Some(callback) = callback else {
            return;
        };
        self.pending.entry(key).or_default().push(callback);
    }

    /// Atomically remove and return every callback registered under `key`.
    ///
    /// A second claim for the same key gets an empty list until new
    /// callbacks are registered.
    pub fn claim_and_clear(&self, key: TxKey) -> PendingCallbacks {
        self.pending
            .remove(&key)
            .map(|(_, callbacks)| callbacks)
            .unwrap_or_default()
    }

    /// Number of callbacks currently pending for `key`.
    pub fn pending_count(&self, key: TxKey) -> usize {
        self.pending.get(&key).map(|list| list.len()).unwrap_or(0)
    }

    /// Number of transactions with outstanding callbacks.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("transactions", &self.pending.len())
            .finish()
    }
}
