use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Once;
use std::task::{Context, Poll};

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "(non-string panic)".to_string()
    }
}

/// A panic caught by the caller while running the transactional operation.
///
/// Built from the payload returned by `std::panic::catch_unwind` or
/// `tokio::task::JoinError::into_panic`. Only the message is kept, which
/// makes the value `Send + Sync` and safe to hold across `.await`. The caller
/// keeps the original payload if it wants to resume unwinding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecoveredPanic {
    message: String,
}

impl RecoveredPanic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        Self::new(panic_message(payload))
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for RecoveredPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panic: {}", self.message)
    }
}

thread_local! {
    static CAPTURE_TRACE: Cell<bool> = Cell::new(false);
    static LAST_TRACE: RefCell<Option<String>> = RefCell::new(None);
}

static TRACE_HOOK: Once = Once::new();

/// Chain a panic hook that records the panicking thread's backtrace while a
/// [`CatchPanic`] with tracing enabled is being polled on it.
fn install_trace_hook() {
    TRACE_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if CAPTURE_TRACE.with(Cell::get) {
                let trace = Backtrace::force_capture().to_string();
                LAST_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            }
            previous(info);
        }));
    });
}

/// A panic caught while polling a [`CatchPanic`] future.
#[derive(Debug)]
pub(crate) struct CaughtPanic {
    pub message: String,
    /// Stack of the panicking frame, when tracing was enabled.
    pub trace: Option<String>,
}

/// Future adapter that turns a panic inside `inner` into an `Err`.
///
/// The backtrace is taken by the panic hook on the thread that panicked, so
/// it shows the callback's own frames rather than wherever the result is
/// later awaited.
pub(crate) struct CatchPanic<F> {
    inner: Pin<Box<F>>,
    capture_trace: bool,
}

impl<F: Future> CatchPanic<F> {
    pub(crate) fn new(inner: F, capture_trace: bool) -> Self {
        if capture_trace {
            install_trace_hook();
        }
        Self {
            inner: Box::pin(inner),
            capture_trace,
        }
    }
}

impl<F: Future> Future for CatchPanic<F> {
    type Output = Result<F::Output, CaughtPanic>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let capture = self.capture_trace;
        let inner = self.inner.as_mut();

        let previous = CAPTURE_TRACE.with(|flag| flag.replace(capture));
        LAST_TRACE.with(|slot| slot.borrow_mut().take());
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| inner.poll(cx)));
        CAPTURE_TRACE.with(|flag| flag.set(previous));

        match result {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(output)) => Poll::Ready(Ok(output)),
            Err(payload) => {
                let trace = LAST_TRACE.with(|slot| slot.borrow_mut().take());
                Poll::Ready(Err(CaughtPanic {
                    message: panic_message(&*payload),
                    trace: if capture { trace } else { None },
                }))
            }
        }
    }
}
