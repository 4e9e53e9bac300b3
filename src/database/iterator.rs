//! # Record Iterator
//!
//! A bounded stream of records from one producer to one consumer.
//!
//! `RecordIterator::new` returns two halves: the consumer side, which
//! reads with `next()` and may `cancel()`, and a `Finisher` which is the
//! only way to offer records and to end the stream. Both `cancel` and
//! `finish` are close-once: concurrent and repeated calls are safe and
//! only the first one takes effect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;

use super::context::Context;
use super::errors::DbError;
use crate::record::RecordRef;

struct Shared {
    /// Producer end of `Next`; taken on finish
    tx: Mutex<Option<mpsc::Sender<RecordRef>>>,
    finished: AtomicBool,
    finish_signal: watch::Sender<bool>,
    cancelled: AtomicBool,
    cancel_signal: watch::Sender<bool>,
    err: Mutex<Option<DbError>>,
    warnings: Mutex<Vec<String>>,
}

impl Shared {
    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Consumer half of a record stream
pub struct RecordIterator {
    rx: mpsc::Receiver<RecordRef>,
    shared: Arc<Shared>,
}

/// Producer half of a record stream
#[derive(Clone)]
pub struct Finisher {
    shared: Arc<Shared>,
}

impl RecordIterator {
    /// Create a stream buffering up to `queue_size` records. A size of 0
    /// is raised to 1.
    pub fn new(queue_size: usize) -> (RecordIterator, Finisher) {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        let (finish_signal, _) = watch::channel(false);
        let (cancel_signal, _) = watch::channel(false);

        let shared = Arc::new(Shared {
            tx: Mutex::new(Some(tx)),
            finished: AtomicBool::new(false),
            finish_signal,
            cancelled: AtomicBool::new(false),
            cancel_signal,
            err: Mutex::new(None),
            warnings: Mutex::new(Vec::new()),
        });

        (
            RecordIterator {
                rx,
                shared: shared.clone(),
            },
            Finisher { shared },
        )
    }

    /// Receive the next record; `None` once the stream has been finished
    /// and drained.
    pub async fn next(&mut self) -> Option<RecordRef> {
        self.rx.recv().await
    }

    /// Ask the producer to stop. Returns true for the call that cancelled.
    pub fn cancel(&self) -> bool {
        if self
            .shared
            .cancelled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.shared.cancel_signal.send_replace(true);
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// Whether the producer has finished the stream
    pub fn is_finished(&self) -> bool {
        self.shared.is_finished()
    }

    /// The error the stream was finished with. `None` means clean
    /// completion, or that the stream has not finished yet.
    pub fn err(&self) -> Option<DbError> {
        self.shared.err.lock().ok().and_then(|e| e.clone())
    }

    /// Non-fatal problems reported while producing the stream
    pub fn warnings(&self) -> Vec<String> {
        self.shared
            .warnings
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }

    /// Wait until the producer has finished the stream
    pub async fn done(&self) {
        let mut rx = self.shared.finish_signal.subscribe();
        let _ = rx.wait_for(|finished| *finished).await;
    }

    /// Drain the stream into a vector and return the terminal error
    pub async fn collect(mut self) -> (Vec<RecordRef>, Option<DbError>) {
        let mut records = Vec::new();
        while let Some(record) = self.next().await {
            records.push(record);
        }
        (records, self.err())
    }
}

impl Drop for RecordIterator {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for RecordIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordIterator")
            .field("finished", &self.is_finished())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Finisher {
    /// End the stream. Only the first call has an effect; returns whether
    /// this call finished it.
    pub fn finish(&self, err: Option<DbError>) -> bool {
        if self
            .shared
            .finished
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        if let Ok(mut slot) = self.shared.err.lock() {
            *slot = err;
        }
        if let Ok(mut tx) = self.shared.tx.lock() {
            tx.take();
        }
        self.shared.finish_signal.send_replace(true);
        true
    }

    /// Whether the stream no longer accepts records
    pub fn is_closed(&self) -> bool {
        self.shared.is_finished() || self.shared.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.shared.is_finished()
    }

    /// Whether the consumer asked to stop
    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// The error the stream was finished with
    pub fn err(&self) -> Option<DbError> {
        self.shared.err.lock().ok().and_then(|e| e.clone())
    }

    /// Record a non-fatal problem
    pub fn warn(&self, warning: impl Into<String>) {
        if let Ok(mut warnings) = self.shared.warnings.lock() {
            warnings.push(warning.into());
        }
    }

    /// Check for cancellation by the consumer or the caller context and
    /// finish the stream if either happened. Returns true when the stream
    /// is done.
    pub fn poll_done(&self, ctx: &Context) -> bool {
        if self.shared.is_finished() {
            return true;
        }
        if self.shared.is_cancelled() {
            self.finish(None);
            return true;
        }
        if ctx.is_cancelled() {
            self.finish(Some(DbError::Canceled));
            return true;
        }
        false
    }

    /// Offer a record to the consumer.
    ///
    /// Admission happens in three steps: an immediate send if there is
    /// room, a second attempt after yielding to the scheduler so a waiting
    /// consumer can drain, and finally a send bounded by `timeout` that
    /// also watches for cancellation. When the timeout elapses the stream
    /// is finished with `DbError::Timeout`.
    ///
    /// Returns true if the record was delivered.
    pub async fn offer(&self, ctx: &Context, record: RecordRef, timeout: Duration) -> bool {
        if self.poll_done(ctx) {
            return false;
        }
        let tx = match self.shared.tx.lock() {
            Ok(tx) => tx.clone(),
            Err(_) => None,
        };
        let Some(tx) = tx else {
            return false;
        };

        let record = match tx.try_send(record) {
            Ok(()) => return true,
            Err(TrySendError::Closed(_)) => return self.receiver_gone(),
            Err(TrySendError::Full(record)) => record,
        };

        tokio::task::yield_now().await;
        if self.poll_done(ctx) {
            return false;
        }
        let record = match tx.try_send(record) {
            Ok(()) => return true,
            Err(TrySendError::Closed(_)) => return self.receiver_gone(),
            Err(TrySendError::Full(record)) => record,
        };

        let mut cancel_rx = self.shared.cancel_signal.subscribe();
        let mut finish_rx = self.shared.finish_signal.subscribe();

        tokio::select! {
            biased;
            _ = cancel_rx.wait_for(|c| *c) => {
                self.finish(None);
                false
            }
            _ = finish_rx.wait_for(|f| *f) => false,
            _ = ctx.cancelled() => {
                self.finish(Some(DbError::Canceled));
                false
            }
            sent = tx.send(record) => match sent {
                Ok(()) => true,
                Err(_) => self.receiver_gone(),
            },
            _ = tokio::time::sleep(timeout) => {
                self.finish(Some(DbError::Timeout));
                false
            }
        }
    }

    fn receiver_gone(&self) -> bool {
        self.finish(None);
        false
    }
}

impl std::fmt::Debug for Finisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Finisher")
            .field("finished", &self.shared.is_finished())
            .finish()
    }
}
