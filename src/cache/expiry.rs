//! One-shot cache expiry
//!
//! An [`ExpiryTimer`] runs at most one pending callback. Arming replaces the
//! pending callback, cancelling stops it. Cancellation only interrupts the
//! wait: once a callback has fired it runs to completion, and it must check
//! its [`ExpiryTicket`] after taking the cache lock to find out whether a
//! newer arm or a cancel superseded it in the meantime.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

/// Proof of which arm a fired callback belongs to
#[derive(Debug, Clone)]
pub struct ExpiryTicket {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl ExpiryTicket {
    /// Whether no arm or cancel happened since this ticket was issued
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    /// Generation this ticket was issued for
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Cancellable one-shot deferred task
#[derive(Debug, Default)]
pub struct ExpiryTimer {
    generation: Arc<AtomicU64>,
    pending: Mutex<Option<oneshot::Sender<()>>>,
}

impl ExpiryTimer {
    /// Create a timer with nothing armed
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `on_fire` once after `delay`, replacing anything already armed
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F, Fut>(&self, delay: Duration, on_fire: F) -> ExpiryTicket
    where
        F: FnOnce(ExpiryTicket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.lock_pending();
        // Dropping the sender wakes the previous task, which then exits.
        pending.take();

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let ticket = ExpiryTicket {
            generation,
            current: Arc::clone(&self.generation),
        };

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let fired_ticket = ticket.clone();
        tokio::spawn(async move {
            let fired = tokio::select! {
                _ = tokio::time::sleep(delay) => true,
                _ = cancel_rx => false,
            };

            if fired {
                debug!("Expiry timer {} fired", fired_ticket.generation);
                on_fire(fired_ticket).await;
            } else {
                debug!("Expiry timer {} cancelled", fired_ticket.generation);
            }
        });

        *pending = Some(cancel_tx);
        ticket
    }

    /// Cancel the pending callback, if any
    ///
    /// Safe to call when nothing is armed. A callback that already fired is
    /// not interrupted, but its ticket stops being current.
    pub fn cancel(&self) {
        let mut pending = self.lock_pending();
        self.generation.fetch_add(1, Ordering::SeqCst);
        pending.take();
    }

    /// Whether a callback is waiting to fire
    pub fn is_armed(&self) -> bool {
        self.lock_pending()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Number of arms and cancels so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn lock_pending(&self) -> MutexGuard<'_, Option<oneshot::Sender<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ExpiryTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
