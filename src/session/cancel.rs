//! Cancellation signal shared by a session and its background tasks

use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;

type Callback = Box<dyn FnOnce() + Send>;

/// A one-shot cancellation signal.
///
/// Clones share the same signal. Cancelling is terminal: there is no reset.
/// Tokens form a tree through [`child_token`](Self::child_token); cancelling
/// a token cancels every descendant, never an ancestor.
///
/// The signal can be observed three ways: synchronously with
/// [`is_cancelled`](Self::is_cancelled), asynchronously with
/// [`cancelled`](Self::cancelled), and through callbacks registered with
/// [`on_cancel`](Self::on_cancel).
///
/// # Examples
///
/// ```
/// use ptyexpect::CancelToken;
///
/// let scope = CancelToken::new();
/// let child = scope.child_token();
///
/// child.cancel();
/// assert!(child.is_cancelled());
/// assert!(!scope.is_cancelled());
///
/// let other = scope.child_token();
/// scope.cancel();
/// assert!(other.is_cancelled());
/// ```
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    state: watch::Sender<bool>,
    hooks: Mutex<Hooks>,
}

#[derive(Default)]
struct Hooks {
    callbacks: Vec<Callback>,
    children: Vec<Weak<Inner>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// Create a new, uncancelled root token.
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                state,
                hooks: Mutex::new(Hooks::default()),
            }),
        }
    }

    /// Create a token that is cancelled together with `self`.
    ///
    /// If `self` is already cancelled the child starts out cancelled.
    pub fn child_token(&self) -> CancelToken {
        let child = CancelToken::new();
        {
            let mut hooks = self.inner.lock_hooks();
            if !self.inner.is_cancelled() {
                hooks.children.retain(|c| c.strong_count() > 0);
                hooks.children.push(Arc::downgrade(&child.inner));
                return child;
            }
        }
        child.cancel();
        child
    }

    /// Fire the signal. Later calls do nothing.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Whether the signal has fired.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Wait until the signal fires.
    pub async fn cancelled(&self) {
        let mut rx = self.inner.state.subscribe();
        // The sender lives in `self`, so this only returns once cancelled
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Run `callback` once when the signal fires.
    ///
    /// Runs immediately, on the calling thread, if the token is already
    /// cancelled. Otherwise it runs on whichever thread calls `cancel`.
    pub fn on_cancel(&self, callback: impl FnOnce() + Send + 'static) {
        {
            let mut hooks = self.inner.lock_hooks();
            if !self.inner.is_cancelled() {
                hooks.callbacks.push(Box::new(callback));
                return;
            }
        }
        callback();
    }
}

impl Inner {
    fn lock_hooks(&self) -> MutexGuard<'_, Hooks> {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    fn cancel(&self) {
        let (callbacks, children) = {
            let mut hooks = self.lock_hooks();
            if self.is_cancelled() {
                return;
            }
            self.state.send_replace(true);
            (
                mem::take(&mut hooks.callbacks),
                mem::take(&mut hooks.children),
            )
        };

        for callback in callbacks {
            callback();
        }
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_cancel_is_idempotent() {
        let token = CancelToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        token.on_cancel(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!token.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_on_cancel_after_cancel_runs_immediately() {
        let token = CancelToken::new();
        token.cancel();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        token.on_cancel(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parent_cancels_children_not_reverse() {
        let parent = CancelToken::new();
        let child = parent.child_token();
        let grandchild = child.child_token();
        let sibling = parent.child_token();

        sibling.cancel();
        assert!(!parent.is_cancelled());
        assert!(!child.is_cancelled());

        parent.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
    }

    #[test]
    fn test_child_of_cancelled_parent_starts_cancelled() {
        let parent = CancelToken::new();
        parent.cancel();
        assert!(parent.child_token().is_cancelled());
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter not woken")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_returns_when_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .expect("already cancelled token must not block");
    }
}
