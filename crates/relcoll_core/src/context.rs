//! Cancellable read contexts.
//!
//! A [`ReadContext`] travels with a read-only view. Scans check it before
//! issuing a query and between rows, and backends may register a hook that
//! aborts an in-flight statement when the context is cancelled.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{CollError, CollResult};

type CancelHook = Box<dyn Fn() + Send + Sync>;

struct ContextInner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    next_hook: AtomicU64,
    hooks: Mutex<HashMap<u64, CancelHook>>,
}

/// A cancellation token with an optional deadline.
///
/// Clones share state: cancelling any clone cancels them all.
#[derive(Clone)]
pub struct ReadContext {
    inner: Arc<ContextInner>,
}

impl fmt::Debug for ReadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadContext")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}

impl Default for ReadContext {
    fn default() -> Self {
        Self::background()
    }
}

impl ReadContext {
    fn with_deadline(deadline: Option<Instant>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                cancelled: AtomicBool::new(false),
                deadline,
                next_hook: AtomicU64::new(0),
                hooks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// A context that is only cancelled explicitly.
    #[must_use]
    pub fn background() -> Self {
        Self::with_deadline(None)
    }

    /// A context that expires after `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Some(Instant::now() + timeout))
    }

    /// Cancels the context and fires every registered hook.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        for hook in self.inner.hooks.lock().values() {
            hook();
        }
    }

    /// True once [`ReadContext::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Fails if the context is cancelled or past its deadline.
    pub fn check(&self) -> CollResult<()> {
        if self.is_cancelled() {
            return Err(CollError::Cancelled);
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(CollError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Registers `hook` to run when the context is cancelled.
    ///
    /// The hook stays registered until the returned guard is dropped. If the
    /// context is already cancelled the hook runs immediately. A cancel that
    /// lands during registration can run the hook twice, so hooks must be
    /// idempotent.
    pub fn on_cancel<F>(&self, hook: F) -> CancelGuard
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.inner.next_hook.fetch_add(1, Ordering::Relaxed);
        self.inner.hooks.lock().insert(id, Box::new(hook));
        // A cancel that raced the insert may have missed the hook.
        if self.is_cancelled() {
            if let Some(hook) = self.inner.hooks.lock().get(&id) {
                hook();
            }
        }
        CancelGuard {
            inner: Arc::clone(&self.inner),
            id,
        }
    }

    /// Number of hooks currently registered.
    #[must_use]
    pub fn hook_count(&self) -> usize {
        self.inner.hooks.lock().len()
    }
}

/// Deregisters a cancel hook on drop.
#[must_use = "the hook is removed when the guard is dropped"]
pub struct CancelGuard {
    inner: Arc<ContextInner>,
    id: u64,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.inner.hooks.lock().remove(&self.id);
    }
}
