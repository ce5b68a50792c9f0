//! Cancellation token for cooperative cancellation.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use tracing::warn;

/// A callback type for cancellation notifications. Receives the reason.
pub type CancelCallback = Box<dyn FnOnce(&str) + Send>;

/// A token for cooperative cancellation.
///
/// Cancellation is one-shot and idempotent: only the first reason is kept
/// and the token never resets. Child tokens created with
/// [`CancellationToken::child_token`] are cancelled together with their
/// parent, while cancelling a child leaves the parent untouched.
#[derive(Default)]
pub struct CancellationToken {
    /// Whether cancellation has been requested.
    cancelled: AtomicBool,
    /// Whether children, waiters and callbacks have been notified.
    propagated: AtomicBool,
    /// The reason for cancellation (first one wins).
    reason: RwLock<Option<String>>,
    /// Callbacks to invoke on cancellation.
    callbacks: Mutex<Vec<CancelCallback>>,
    /// Child scopes cancelled together with this token.
    children: Mutex<Vec<Weak<CancellationToken>>>,
    /// Wakes tasks parked in [`CancellationToken::cancelled`].
    notify: Notify,
}

impl CancellationToken {
    /// Creates a new cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a child scope of this token.
    ///
    /// If this token is already cancelled the child is returned cancelled
    /// with the same reason.
    #[must_use]
    pub fn child_token(&self) -> Arc<Self> {
        let child = Arc::new(Self::new());
        let mut children = self.children.lock();
        if self.is_cancelled() {
            drop(children);
            child.cancel(self.reason().unwrap_or_default());
        } else {
            children.retain(|c| c.strong_count() > 0);
            children.push(Arc::downgrade(&child));
        }
        child
    }

    /// Requests cancellation with a reason.
    ///
    /// This is idempotent - only the first reason is kept.
    /// Children are cancelled first, then callbacks run. Panics in callbacks
    /// are logged and suppressed.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.mark_cancelled(reason);
        self.propagate();
    }

    /// Flips the token to cancelled without running any user code.
    ///
    /// Children, waiters and callbacks are not notified until the next call
    /// to [`CancellationToken::cancel`]. This is safe to call while holding
    /// locks that callbacks might take. Returns true if this call set the
    /// reason.
    pub fn mark_cancelled(&self, reason: impl Into<String>) -> bool {
        // The reason is published under the same lock that flips the
        // flag, so a reader that sees `is_cancelled` also sees the reason.
        let mut slot = self.reason.write();
        if self.is_cancelled() {
            return false;
        }
        *slot = Some(reason.into());
        self.cancelled.store(true, Ordering::SeqCst);
        true
    }

    fn propagate(&self) {
        if !self.is_cancelled() || self.propagated.swap(true, Ordering::SeqCst) {
            return;
        }
        let reason = self.reason().unwrap_or_default();
        self.notify.notify_waiters();

        let children: Vec<_> = std::mem::take(&mut *self.children.lock());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel(reason.as_str());
        }

        let callbacks: Vec<_> = std::mem::take(&mut *self.callbacks.lock());
        for callback in callbacks {
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(&reason);
            })) {
                warn!("Cancellation callback panicked: {:?}", e);
            }
        }
    }

    /// Registers a callback to be invoked on cancellation.
    ///
    /// If already cancelled, the callback is invoked immediately.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: FnOnce(&str) + Send + 'static,
    {
        let mut callbacks = self.callbacks.lock();
        if self.is_cancelled() {
            drop(callbacks);
            let reason = self.reason().unwrap_or_default();
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(&reason);
            })) {
                warn!("Cancellation callback panicked: {:?}", e);
            }
        } else {
            callbacks.push(Box::new(callback));
        }
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    /// Waits until the token is cancelled.
    ///
    /// Long-running handler work should race against this future so an
    /// evicted or reclaimed context abandons its I/O.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_token_default_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.reason().is_none());
    }

    #[test]
    fn test_token_cancel_idempotent() {
        let token = CancellationToken::new();
        token.cancel("First reason");
        token.cancel("Second reason");

        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some("First reason".to_string()));
    }

    #[test]
    fn test_on_cancel_runs_once() {
        let token = CancellationToken::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        token.on_cancel(move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        token.cancel("test");
        token.cancel("again");

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_on_cancel_after_cancellation_gets_reason() {
        let token = CancellationToken::new();
        token.cancel("evicted");

        let seen = Arc::new(Mutex::new(String::new()));
        let seen_clone = seen.clone();
        token.on_cancel(move |reason| {
            *seen_clone.lock() = reason.to_string();
        });

        assert_eq!(*seen.lock(), "evicted");
    }

    #[test]
    fn test_callback_panic_suppressed() {
        let token = CancellationToken::new();
        token.on_cancel(|_| panic!("Intentional panic"));

        token.cancel("test");
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_parent_cancels_child() {
        let parent = CancellationToken::new();
        let child = parent.child_token();
        let grandchild = child.child_token();

        parent.cancel("shutdown");

        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
        assert_eq!(grandchild.reason().as_deref(), Some("shutdown"));
    }

    #[test]
    fn test_child_cancel_leaves_parent() {
        let parent = CancellationToken::new();
        let child = parent.child_token();

        child.cancel("disposed");

        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_child_of_cancelled_parent_starts_cancelled() {
        let parent = CancellationToken::new();
        parent.cancel("gone");

        let child = parent.child_token();
        assert!(child.is_cancelled());
        assert_eq!(child.reason().as_deref(), Some("gone"));
    }

    #[test]
    fn test_mark_cancelled_defers_callbacks_until_cancel() {
        let parent = CancellationToken::new();
        let child = parent.child_token();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        parent.on_cancel(move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(parent.mark_cancelled("evicted"));
        assert!(!parent.mark_cancelled("other"));
        assert!(parent.is_cancelled());
        assert_eq!(parent.reason().as_deref(), Some("evicted"));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!child.is_cancelled());

        parent.cancel("disposed");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(child.reason().as_deref(), Some("evicted"));

        parent.cancel("again");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_future_wakes() {
        let token = Arc::new(CancellationToken::new());
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel("wake");

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .expect("waiter should not panic");
    }

    #[tokio::test]
    async fn test_cancelled_future_ready_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel("done");
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .expect("should resolve immediately");
    }
}
