//! Bounded dispatcher for recognition calls
//!
//! A process-wide semaphore caps the number of outbound recognition calls in
//! flight at once, across all concurrent identification runs. Work is
//! submitted as futures; each submission runs on its own task and waits for
//! a permit before starting. A permit is released when the work finishes or
//! fails, so the in-flight count never exceeds capacity and never leaks.
//!
//! Cancellation only affects work that has not started: cancelled work still
//! waiting for a permit is skipped, work already holding a permit runs to
//! completion. [`Dispatcher::shutdown`] cancels every run and refuses new
//! submissions; a token from [`Dispatcher::run_token`] cancels one run.

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Dispatcher errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    /// Dispatcher no longer accepts work
    #[error("Dispatcher is shut down")]
    ShutDown,

    /// Work was cancelled before it completed
    #[error("Work was cancelled")]
    Cancelled,

    /// Work panicked
    #[error("Work panicked: {0}")]
    Panicked(String),
}

/// Process-wide bounded executor
#[derive(Debug)]
pub struct Dispatcher {
    permits: Arc<Semaphore>,
    capacity: usize,
    shutdown: CancellationToken,
}

impl Dispatcher {
    /// Create a dispatcher allowing `capacity` concurrent calls (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        tracing::info!(capacity, "Recognition dispatcher created");
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Calls currently holding a permit
    pub fn in_flight(&self) -> usize {
        self.capacity
            .saturating_sub(self.permits.available_permits())
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Token for one run; cancelled by [`Dispatcher::shutdown`] as well
    pub fn run_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Submit `work`, to start once a permit is free
    ///
    /// Cancelling `cancel` before a permit is granted skips the work.
    /// Submission order is permit order (the semaphore is fair).
    pub fn submit<F, T>(&self, cancel: &CancellationToken, work: F) -> Result<Dispatched<T>, DispatchError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            return Err(DispatchError::ShutDown);
        }

        let permits = Arc::clone(&self.permits);
        let cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let _permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DispatchError::Cancelled),
                permit = permits.acquire_owned() => {
                    permit.map_err(|_| DispatchError::ShutDown)?
                }
            };

            Ok(work.await)
        });

        Ok(Dispatched { handle })
    }

    /// Stop accepting work and skip everything still waiting for a permit
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            tracing::info!(in_flight = self.in_flight(), "Recognition dispatcher shutting down");
            self.shutdown.cancel();
        }
    }
}

/// Handle to submitted work
#[derive(Debug)]
pub struct Dispatched<T> {
    handle: JoinHandle<Result<T, DispatchError>>,
}

impl<T> Dispatched<T> {
    /// Wait for the work to finish
    pub async fn outcome(self) -> Result<T, DispatchError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(DispatchError::Panicked(e.to_string())),
            Err(_) => Err(DispatchError::Cancelled),
        }
    }
}
