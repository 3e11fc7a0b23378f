use std::fmt;

/// Boxed error used for caller-supplied and callback errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result returned by a commit callback.
pub type CallbackResult = Result<(), BoxError>;

/// Error type for the Postgres commit adapter
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("Transaction commit failed")]
    CommitFailed(#[source] sqlx::Error),

    #[error("Transaction rollback failed")]
    RollbackFailed(#[source] sqlx::Error),

    #[error("Transaction already committed or rolled back")]
    TransactionClosed,

    #[error("No transaction handle supplied")]
    MissingHandle,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for transaction operations
pub type TransactionResult<T> = Result<T, TransactionError>;

/// One cause inside a [`JoinedError`].
#[derive(Debug, thiserror::Error)]
pub enum Failure {
    /// Failure upstream of the commit decision, supplied by the caller.
    #[error(transparent)]
    Operation(BoxError),

    /// Error returned by the commit/rollback capability.
    #[error("commit failed: {0}")]
    Commit(#[source] BoxError),

    /// A callback returned an error.
    #[error("callback #{index} error: {source}")]
    Callback {
        index: usize,
        #[source]
        source: BoxError,
    },

    /// A callback panicked; the panic was contained in its task.
    #[error("callback #{index} panic: {message}")]
    CallbackPanic {
        index: usize,
        message: String,
        trace: Option<String>,
    },
}

impl Failure {
    /// Registration index of the callback this failure came from, if any.
    pub fn callback_index(&self) -> Option<usize> {
        match self {
            Failure::Callback { index, .. } | Failure::CallbackPanic { index, .. } => Some(*index),
            Failure::Operation(_) | Failure::Commit(_) => None,
        }
    }
}

/// An error aggregating several independent causes, none discarded.
///
/// Never empty: [`JoinedError::join`] returns `None` when there is nothing
/// to report.
#[derive(Debug)]
pub struct JoinedError {
    causes: Vec<Failure>,
}

impl JoinedError {
    /// Join the given failures, or `None` if the iterator is empty.
    pub fn join<I>(failures: I) -> Option<Self>
    where
        I: IntoIterator<Item = Failure>,
    {
        let causes: Vec<Failure> = failures.into_iter().collect();
        if causes.is_empty() {
            None
        } else {
            Some(Self { causes })
        }
    }

    /// Join failures with already-joined errors, flattening the latter.
    pub fn merge<I>(failures: I, nested: Option<JoinedError>) -> Option<Self>
    where
        I: IntoIterator<Item = Failure>,
    {
        let flattened = nested.into_iter().flat_map(JoinedError::into_causes);
        Self::join(failures.into_iter().chain(flattened))
    }

    pub fn causes(&self) -> &[Failure] {
        &self.causes
    }

    pub fn into_causes(self) -> Vec<Failure> {
        self.causes
    }

    pub fn len(&self) -> usize {
        self.causes.len()
    }

    /// Always false for a value built by `join` or `merge`.
    pub fn is_empty(&self) -> bool {
        self.causes.is_empty()
    }

    /// The caller-supplied operation error, if it is part of this error.
    pub fn operation_error(&self) -> Option<&BoxError> {
        self.causes.iter().find_map(|cause| match cause {
            Failure::Operation(err) => Some(err),
            _ => None,
        })
    }

    /// The commit capability's error, if it is part of this error.
    pub fn commit_error(&self) -> Option<&BoxError> {
        self.causes.iter().find_map(|cause| match cause {
            Failure::Commit(err) => Some(err),
            _ => None,
        })
    }

    /// Failures reported by callbacks, returned errors and panics alike.
    pub fn callback_failures(&self) -> impl Iterator<Item = &Failure> {
        self.causes
            .iter()
            .filter(|cause| cause.callback_index().is_some())
    }

    /// Callback panics only.
    pub fn panics(&self) -> impl Iterator<Item = &Failure> {
        self.causes
            .iter()
            .filter(|cause| matches!(cause, Failure::CallbackPanic { .. }))
    }
}

impl fmt::Display for JoinedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cause) in self.causes.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for JoinedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.causes
            .first()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}
