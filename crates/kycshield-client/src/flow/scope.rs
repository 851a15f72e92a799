//! Cancellable run scopes
//!
//! Every check runs inside a [`RunScope`]. Beginning a new scope cancels
//! the previous one, so a stale in-flight request is dropped instead of
//! racing the newer run to update the UI.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use kycshield_common::{KycError, Result};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

/// Hands out scopes; at most one is live at a time
#[derive(Debug, Default)]
pub struct ScopeRegistry {
    generation: Arc<AtomicU64>,
    current: Mutex<Option<watch::Sender<bool>>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new scope, cancelling whichever one was live
    pub fn begin(&self) -> RunScope {
        // id and sender change together under the lock
        let mut current = self.current.lock();
        let id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = watch::channel(false);

        if let Some(previous) = current.replace(tx) {
            // receiver may already be gone if that run finished
            let _ = previous.send(true);
            debug!(superseded_by = id, "Cancelled previous run scope");
        }
        drop(current);

        RunScope {
            id,
            generation: Arc::clone(&self.generation),
            cancelled: rx,
        }
    }

    /// Cancel the live scope without starting another
    pub fn cancel_all(&self) {
        let mut current = self.current.lock();
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = current.take() {
            let _ = previous.send(true);
        }
    }

    /// Identifier of the most recently issued scope
    pub fn current_id(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// One cancellable unit of work
#[derive(Debug, Clone)]
pub struct RunScope {
    id: u64,
    generation: Arc<AtomicU64>,
    cancelled: watch::Receiver<bool>,
}

impl RunScope {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// True while no newer scope has begun and nothing cancelled this one
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.id && !*self.cancelled.borrow()
    }

    /// Run `fut` unless the scope is cancelled first
    pub async fn guard<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if !self.is_current() {
            return Err(KycError::Cancelled);
        }

        let mut cancelled = self.cancelled.clone();
        tokio::select! {
            biased;
            _ = wait_cancelled(&mut cancelled) => Err(KycError::Cancelled),
            result = fut => result,
        }
    }
}

async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // registry dropped without cancelling: never resolves
            std::future::pending::<()>().await;
        }
    }
}
