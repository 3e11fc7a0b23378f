use std::fmt;

use uuid::Uuid;

/// Stable identity of one transaction, used as the callback registry key.
///
/// Keys are generated, never derived from memory addresses, so two live
/// transactions can't collide and the same handle always yields the same key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxKey(Uuid);

impl TxKey {
    /// Key used when no transaction handle is supplied.
    pub const NIL: TxKey = TxKey(Uuid::nil());

    /// Generate a fresh, unique key.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Registry key for an optional handle; `None` maps to [`TxKey::NIL`].
    pub fn of<H>(handle: Option<&H>) -> Self
    where
        H: TransactionHandle + ?Sized,
    {
        handle.map(TransactionHandle::tx_key).unwrap_or(Self::NIL)
    }
}

impl fmt::Display for TxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            write!(f, "nil-tx")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Anything that identifies an in-flight transaction.
pub trait TransactionHandle: Send + Sync {
    fn tx_key(&self) -> TxKey;
}

impl TransactionHandle for TxKey {
    fn tx_key(&self) -> TxKey {
        *self
    }
}

impl<T: TransactionHandle + ?Sized> TransactionHandle for std::sync::Arc<T> {
    fn tx_key(&self) -> TxKey {
        (**self).tx_key()
    }
}
