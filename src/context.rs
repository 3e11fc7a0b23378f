use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Cancellation and deadline context handed to commit and callback code.
///
/// Cancellation is advisory: nothing in this crate aborts a running callback
/// when its context is cancelled. Callbacks that care can poll
/// [`TxContext::is_cancelled`] or await [`TxContext::cancelled`].
///
/// Clones share the same cancellation state. A [`child`](TxContext::child)
/// is cancelled together with its parent, but cancelling the child leaves the
/// parent untouched.
#[derive(Clone, Debug)]
pub struct TxContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    cancel: watch::Sender<bool>,
    deadline: Option<Instant>,
    parent: Option<TxContext>,
}

impl TxContext {
    /// A root context that is never cancelled unless [`cancel`](Self::cancel) is called.
    pub fn background() -> Self {
        Self::build(None, None)
    }

    /// A context cancelled when `self` is, or when cancelled directly.
    pub fn child(&self) -> Self {
        Self::build(Some(self.clone()), None)
    }

    /// A child context that also expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// A child context that also expires at `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self::build(Some(self.clone()), Some(deadline))
    }

    fn build(parent: Option<TxContext>, deadline: Option<Instant>) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            inner: Arc::new(ContextInner {
                cancel,
                deadline,
                parent,
            }),
        }
    }

    /// Cancel this context and every child derived from it.
    pub fn cancel(&self) {
        self.inner.cancel.send_replace(true);
    }

    /// True once cancelled, once the deadline has passed, or once any parent is.
    pub fn is_cancelled(&self) -> bool {
        if *self.inner.cancel.borrow() {
            return true;
        }
        if let Some(deadline) = self.inner.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }
        self.inner
            .parent
            .as_ref()
            .map(TxContext::is_cancelled)
            .unwrap_or(false)
    }

    /// Earliest deadline along the parent chain.
    pub fn deadline(&self) -> Option<Instant> {
        let inherited = self.inner.parent.as_ref().and_then(TxContext::deadline);
        match (self.inner.deadline, inherited) {
            (Some(own), Some(parent)) => Some(own.min(parent)),
            (own, parent) => own.or(parent),
        }
    }

    /// Resolves when this context is cancelled or expires.
    pub fn cancelled(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let mut rx = self.inner.cancel.subscribe();
            let own = async move {
                // The sender lives as long as `self`, so this only returns on cancel.
                let _ = rx.wait_for(|cancelled| *cancelled).await;
            };
            let expiry = async {
                match self.inner.deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };
            let parent = async {
                match &self.inner.parent {
                    Some(parent) => parent.cancelled().await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = own => {}
                _ = expiry => {}
                _ = parent => {}
            }
        })
    }
}

impl Default for TxContext {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_is_not_cancelled() {
        let ctx = TxContext::background();
        assert!(!ctx.is_cancelled());
        assert!(ctx.deadline().is_none());
    }

    #[tokio::test]
    async fn test_cancel_propagates_to_children_only() {
        let parent = TxContext::background();
        let child = parent.child();
        let sibling = parent.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
        assert!(!sibling.is_cancelled());

        parent.cancel();
        assert!(sibling.is_cancelled());
        sibling.cancelled().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_expires() {
        let ctx = TxContext::background().with_timeout(Duration::from_secs(5));
        assert!(!ctx.is_cancelled());

        ctx.cancelled().await;
        assert!(ctx.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_is_earliest_in_chain() {
        let outer = TxContext::background().with_timeout(Duration::from_secs(1));
        let inner = outer.with_timeout(Duration::from_secs(10));
        assert_eq!(inner.deadline(), outer.deadline());
    }
}
