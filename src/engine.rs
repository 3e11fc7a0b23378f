//! Concurrent execution of claimed commit callbacks.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error};

use crate::recovery::{CatchPanic, CaughtPanic};
use crate::{CallbackResult, Failure, JoinedError, PendingCallbacks, TxContext};

/// Tuning for callback execution.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Upper bound on one transaction's callbacks running at once. `None`
    /// runs them all in parallel; `Some(0)` is treated as 1.
    pub max_concurrency: Option<usize>,
    /// Attach the panicking callback's backtrace to panic failures.
    pub capture_backtrace: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            capture_backtrace: true,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values below 1 are treated as 1.
    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit.max(1));
        self
    }

    pub fn capture_backtrace(mut self, enabled: bool) -> Self {
        self.capture_backtrace = enabled;
        self
    }

    /// Permits for one run, or `None` when unbounded.
    fn limiter(&self) -> Option<Arc<Semaphore>> {
        self.max_concurrency
            .map(|limit| Arc::new(Semaphore::new(limit.max(1))))
    }
}

type TaskOutcome = Result<CallbackResult, CaughtPanic>;

/// Runs a snapshot of callbacks, one tokio task each, and joins their failures.
#[derive(Clone, Debug, Default)]
pub struct CallbackEngine {
    config: EngineConfig,
}

impl CallbackEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run every callback and wait for all of them to finish.
    ///
    /// A panicking callback is caught inside its task and reported as
    /// [`Failure::CallbackPanic`]; siblings keep running. Failures are tagged
    /// with the callback's position in `callbacks`, not completion order.
    /// The concurrency cap applies to this snapshot only, so callbacks that
    /// complete other transactions on the same manager never wait on it.
    pub async fn run_all(
        &self,
        ctx: &TxContext,
        callbacks: PendingCallbacks,
    ) -> Result<(), JoinedError> {
        if callbacks.is_empty() {
            return Ok(());
        }

        let total = callbacks.len();
        let limiter = self.config.limiter();
        let capture_trace = self.config.capture_backtrace;
        let handles: Vec<JoinHandle<TaskOutcome>> = callbacks
            .into_iter()
            .map(|callback| {
                let ctx = ctx.clone();
                let limiter = limiter.clone();
                tokio::spawn(CatchPanic::new(
                    async move {
                        // The semaphore is never closed, so a failed acquire can't happen.
                        let _permit = match limiter {
                            Some(limiter) => limiter.acquire_owned().await.ok(),
                            None => None,
                        };
                        callback.on_commit(&ctx).await
                    },
                    capture_trace,
                ))
            })
            .collect();

        let mut failures = Vec::new();
        for (index, handle) in handles.into_iter().enumerate() {
            if let Some(failure) = outcome(index, handle.await) {
                failures.push(failure);
            }
        }

        match JoinedError::join(failures) {
            None => {
                debug!(target: "txmanager", callbacks = total, "commit callbacks completed");
                Ok(())
            }
            Some(joined) => Err(joined),
        }
    }
}

fn outcome(index: usize, result: Result<TaskOutcome, JoinError>) -> Option<Failure> {
    match result {
        Ok(Ok(Ok(()))) => None,
        Ok(Ok(Err(source))) => {
            error!(target: "txmanager", index, error = %source, "callback #{} error", index);
            Some(Failure::Callback { index, source })
        }
        Ok(Err(CaughtPanic { message, trace })) => {
            error!(
                target: "txmanager",
                index,
                panic = %message,
                trace = trace.as_deref().unwrap_or(""),
                "callback #{} panic",
                index
            );
            Some(Failure::CallbackPanic {
                index,
                message,
                trace,
            })
        }
        Err(join_error) => {
            let message = if join_error.is_panic() {
                crate::panic_message(&*join_error.into_panic())
            } else {
                "task cancelled before completion".to_string()
            };
            error!(target: "txmanager", index, panic = %message, "callback #{} panic", index);
            Some(Failure::CallbackPanic {
                index,
                message,
                trace: None,
            })
        }
    }
}
