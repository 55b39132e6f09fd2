//! Timer handles for background refresh: a fixed-interval [`Poller`] and a
//! trailing-edge [`Debouncer`].
//!
//! Both own their background tasks. Dropping a handle stops it.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, instrument};

// ============================================================================
// Poller
// ============================================================================

struct RunningPoll {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

/// Runs a tick function at a fixed interval until stopped.
///
/// The first tick fires one interval after [`Poller::start`]. Ticks never
/// overlap: the next interval starts once the previous tick has finished.
pub struct Poller {
    interval: Duration,
    running: Mutex<Option<RunningPoll>>,
}

impl Poller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start polling in the background.
    ///
    /// Returns `false` without replacing anything if already running.
    #[instrument(skip(self, tick), fields(interval = ?self.interval))]
    pub fn start<F, Fut>(&self, mut tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.as_ref().is_some_and(|r| !r.task.is_finished()) {
            debug!("Poller already running");
            return false;
        }

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let interval = self.interval;
        let task = tokio::spawn(async move {
            debug!("Starting poll loop");
            loop {
                tokio::select! {
                    _ = sleep(interval) => {
                        tick().await;
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Poll loop received shutdown signal");
                        break;
                    }
                }
            }
            debug!("Poll loop ended");
        });

        *running = Some(RunningPoll { shutdown_tx, task });
        true
    }

    /// Stop polling. A tick that is mid-flight is cancelled.
    ///
    /// Returns `false` if the poller was not running.
    pub fn stop(&self) -> bool {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match running {
            Some(running) => {
                let _ = running.shutdown_tx.send(());
                running.task.abort();
                debug!("Stopped poller");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|r| !r.task.is_finished())
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

// ============================================================================
// Debouncer
// ============================================================================

/// Collapses bursts of calls into one, fired after a quiet period.
///
/// Each [`Debouncer::schedule`] supersedes any action that has not fired yet,
/// so a burst runs only the last action. A fired action runs in its own task
/// and is never cancelled by later calls, [`Debouncer::cancel`], or drop.
pub struct Debouncer {
    delay: Duration,
    generation: Arc<AtomicU64>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: Arc::new(AtomicU64::new(0)),
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `action` once the delay passes without another call.
    pub fn schedule<F>(&self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = Arc::clone(&self.generation);
        let delay = self.delay;

        let timer = tokio::spawn(async move {
            sleep(delay).await;
            if current.load(Ordering::SeqCst) == generation {
                debug!(generation, "Debounce delay elapsed");
                tokio::spawn(action);
            }
        });

        if let Some(previous) = pending.replace(timer) {
            if !previous.is_finished() {
                debug!("Superseding pending action");
            }
            previous.abort();
        }
    }

    /// Drop the pending action, if any.
    ///
    /// Returns `true` if an action was waiting and will now never fire.
    pub fn cancel(&self) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::SeqCst);
        match pending.take() {
            Some(timer) => {
                let waiting = !timer.is_finished();
                timer.abort();
                waiting
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &self.is_pending())
            .finish()
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
