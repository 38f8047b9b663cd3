//! Per-call cancellation handle threaded through query execution.
//!
//! Every backend exec/query is a suspension point; the engine checks the
//! handle before each statement. A cancellation mid-request leaves the
//! statements already executed inside the transaction until the enclosing
//! path rolls back to its savepoint, which sits on the common error path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::StorageError;

/// A cooperative cancellation signal with an optional deadline.
///
/// Cloned handles share state: `cancel()` on any clone is observed by
/// all of them.
#[derive(Debug, Clone)]
pub struct Interrupt {
    inner: Arc<InterruptInner>,
}

#[derive(Debug)]
struct InterruptInner {
    canceled: AtomicBool,
    deadline: Option<Instant>,
}

impl Interrupt {
    /// A handle that only fires when `cancel()` is called.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(InterruptInner {
                canceled: AtomicBool::new(false),
                deadline: None,
            }),
        }
    }

    /// A handle that also fires once `timeout` has elapsed.
    pub fn with_deadline(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(InterruptInner {
                canceled: AtomicBool::new(false),
                deadline: Some(Instant::now() + timeout),
            }),
        }
    }

    /// Request cancellation. Observed at the next statement boundary.
    pub fn cancel(&self) {
        self.inner.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.canceled.load(Ordering::SeqCst)
            || self.inner.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Error-returning check used before each statement execution.
    pub fn check(&self) -> Result<(), StorageError> {
        if self.inner.canceled.load(Ordering::SeqCst) {
            return Err(StorageError::Interrupted);
        }
        if self.inner.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(StorageError::DeadlineExceeded);
        }
        Ok(())
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}
