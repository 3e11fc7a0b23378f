use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use postgres_commit_callbacks::{
    BoxError, CallbackRef, CallbackResult, CommitCallback, Committer, JoinedError, Manager,
    RecoveredPanic, TxContext, TxKey, TxManager,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Committer that records what it was asked to do.
#[derive(Default)]
pub struct MockCommitter {
    commit_err: Option<String>,
    calls: AtomicUsize,
    committed: AtomicBool,
    rolled_back: AtomicBool,
}

impl MockCommitter {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            commit_err: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn committed(&self) -> bool {
        self.committed.load(Ordering::SeqCst)
    }

    pub fn rolled_back(&self) -> bool {
        self.rolled_back.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Committer<TxKey> for MockCommitter {
    async fn commit_rollback(
        &self,
        _handle: Option<&TxKey>,
        _ctx: &TxContext,
        recovered: Option<&RecoveredPanic>,
        operation_error: Option<&BoxError>,
    ) -> Result<(), BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if recovered.is_some() || operation_error.is_some() {
            self.rolled_back.store(true, Ordering::SeqCst);
        } else {
            self.committed.store(true, Ordering::SeqCst);
        }
        match &self.commit_err {
            Some(message) => Err(message.clone().into()),
            None => Ok(()),
        }
    }
}

/// Drive `complete_transaction` for a key-identified transaction.
pub async fn complete(
    manager: &TxManager,
    committer: &MockCommitter,
    handle: Option<&TxKey>,
    recovered: Option<RecoveredPanic>,
    operation_error: Option<BoxError>,
) -> Result<(), JoinedError> {
    manager
        .complete_transaction(
            &TxContext::background(),
            committer,
            handle,
            recovered,
            operation_error,
        )
        .await
}

enum Behavior {
    Succeed,
    Fail(&'static str),
    Panic(&'static str),
    Sleep(Duration),
}

struct RecordingCallback {
    id: usize,
    behavior: Behavior,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl CommitCallback for RecordingCallback {
    async fn on_commit(&self, _ctx: &TxContext) -> CallbackResult {
        match self.behavior {
            Behavior::Succeed => {}
            Behavior::Fail(message) => {
                self.recorder.record(self.id);
                return Err(message.into());
            }
            Behavior::Panic(message) => panic!("{}", message),
            Behavior::Sleep(delay) => tokio::time::sleep(delay).await,
        }
        self.recorder.record(self.id);
        Ok(())
    }
}

/// Collects the ids of callbacks that ran.
#[derive(Default)]
pub struct Recorder {
    calls: Mutex<Vec<usize>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, id: usize) {
        self.calls.lock().push(id);
    }

    fn make(self: &Arc<Self>, id: usize, behavior: Behavior) -> CallbackRef {
        Arc::new(RecordingCallback {
            id,
            behavior,
            recorder: Arc::clone(self),
        })
    }

    pub fn callback(self: &Arc<Self>, id: usize) -> CallbackRef {
        self.make(id, Behavior::Succeed)
    }

    pub fn failing(self: &Arc<Self>, id: usize, message: &'static str) -> CallbackRef {
        self.make(id, Behavior::Fail(message))
    }

    pub fn panicking(self: &Arc<Self>, id: usize, message: &'static str) -> CallbackRef {
        self.make(id, Behavior::Panic(message))
    }

    pub fn slow(self: &Arc<Self>, id: usize, delay: Duration) -> CallbackRef {
        self.make(id, Behavior::Sleep(delay))
    }

    /// Ids recorded so far, sorted since execution order is unspecified.
    pub fn calls(&self) -> Vec<usize> {
        let mut calls = self.calls.lock().clone();
        calls.sort_unstable();
        calls
    }

    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }
}
