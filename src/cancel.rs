//! Cancellation tokens for long-running services
//!
//! Location sources, listening sessions and the navigator loop all take a
//! [`CancelToken`]. Cancelling the token (or every clone of it) stops them.

use tokio::sync::watch;

/// Cloneable cancellation signal
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: std::sync::Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// Create a token that has not been cancelled
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: std::sync::Arc::new(tx),
            rx,
        }
    }

    /// Signal cancellation to every holder of this token
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether [`cancel`](Self::cancel) has been called
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Create a token that is cancelled with this one but can also be
    /// cancelled on its own
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn child(&self) -> Self {
        let child = Self::new();
        let parent = self.clone();
        let linked = child.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = parent.cancelled() => linked.cancel(),
                () = linked.cancelled() => {}
            }
        });
        child
    }

    /// Wait until the token is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // Sender lives as long as any clone, so `wait_for` only fails if the
        // value can no longer change; treat that as never cancelled.
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_cancel_wakes_waiters() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });

        assert!(!token.is_cancelled());
        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should wake")
            .expect("task should not panic");
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_child_follows_parent() {
        let parent = CancelToken::new();
        let child = parent.child();

        parent.cancel();
        tokio::time::timeout(Duration::from_secs(1), child.cancelled())
            .await
            .expect("child should be cancelled with parent");
    }

    #[tokio::test]
    async fn test_child_cancel_leaves_parent() {
        let parent = CancelToken::new();
        let child = parent.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }
}
