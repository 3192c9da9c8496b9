//! Debounced, cancelable fetch cycles.
//!
//! Each view change starts a new cycle. Starting one aborts whatever cycle
//! was running (dropping its in-flight requests) and bumps a shared
//! generation counter. Code that resumes after an `.await` checks its
//! [`CycleToken`] before touching shared state, so a cycle that lost the race
//! can never publish or mutate anything.

use futures::future::{AbortHandle, Abortable};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Cancellation token owned by one cycle
#[derive(Debug, Clone)]
pub struct CycleToken {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl CycleToken {
    /// A token that is never cancelled, for one-off cycles outside a scheduler
    pub fn detached() -> Self {
        Self {
            generation: 0,
            current: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True once a newer cycle has started or the scheduler was shut down
    pub fn is_cancelled(&self) -> bool {
        self.current.load(Ordering::SeqCst) != self.generation
    }
}

/// Runs at most one cycle at a time, newest wins.
#[derive(Debug)]
pub struct CycleScheduler {
    current: Arc<AtomicU64>,
    running: Mutex<Option<AbortHandle>>,
    debounce: Duration,
}

impl CycleScheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            current: Arc::new(AtomicU64::new(0)),
            running: Mutex::new(None),
            debounce,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Cancels the running cycle and hands out a token for the next one.
    pub fn begin(&self) -> CycleToken {
        let generation = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut running) = self.running.lock() {
            if let Some(handle) = running.take() {
                handle.abort();
            }
        }
        CycleToken {
            generation,
            current: self.current.clone(),
        }
    }

    /// Schedules `cycle` to run after the debounce period.
    ///
    /// A later call within the debounce window replaces this one before it
    /// ever starts, which coalesces bursts of pans and zooms into one cycle.
    pub fn schedule<F, Fut>(&self, cycle: F) -> JoinHandle<()>
    where
        F: FnOnce(CycleToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = self.begin();
        let (handle, registration) = AbortHandle::new_pair();
        if let Ok(mut running) = self.running.lock() {
            *running = Some(handle);
        }

        let debounce = self.debounce;
        let task = async move {
            if !debounce.is_zero() {
                tokio::time::sleep(debounce).await;
            }
            if token.is_cancelled() {
                return;
            }
            log::debug!("starting cycle {}", token.generation());
            cycle(token).await;
        };

        tokio::spawn(async move {
            let _ = Abortable::new(task, registration).await;
        })
    }

    /// Cancels the running cycle without starting another.
    pub fn cancel(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut running) = self.running.lock() {
            if let Some(handle) = running.take() {
                handle.abort();
            }
        }
    }
}
