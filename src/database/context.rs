//! Cancellation contexts
//!
//! A `Context` is a cheaply cloneable cancellation signal. Cancelling any
//! clone cancels all of them; cancellation happens at most once.

use tokio::sync::watch;

/// Cooperative cancellation signal
#[derive(Debug, Clone)]
pub struct Context {
    tx: std::sync::Arc<watch::Sender<bool>>,
}

impl Context {
    /// Create a new, live context
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            tx: std::sync::Arc::new(tx),
        }
    }

    /// A context nobody holds a cancel handle for
    pub fn background() -> Self {
        Self::new()
    }

    /// Cancel the context. Returns true for the call that cancelled it.
    pub fn cancel(&self) -> bool {
        self.tx.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the context is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives in self, so wait_for only fails if it is dropped
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
