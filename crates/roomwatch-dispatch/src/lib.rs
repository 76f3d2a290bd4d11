//! Windowed rate-limited dispatch queue for Roomwatch.
//!
//! Every outbound connection start goes through a [`DispatchQueue`]: tasks
//! run in FIFO order, at most `capacity` per refresh window, and whatever
//! does not fit waits for the next window.
//!
//! # Capacity
//!
//! The queue always refreshes on a fixed one-second reference window. A
//! caller asking for `count` tasks per `window_ms` gets
//! `round(count × 1000 / window_ms)` tasks per reference window, so
//! "10 per 1000 ms" is a 10/s cap and "10 per 100 ms" a 100/s cap. A missing
//! or zero count means no throttling at all.
//!
//! # Integration
//!
//! The queue owns no task of its own. It is meant to sit inside an actor's
//! `tokio::select!` loop, next to the actor's command channel:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* may call queue.add(..) */ }
//!         _ = queue.wait_for_refresh() => queue.refresh(),
//!     }
//! }
//! ```
//!
//! Tasks are invoked synchronously, inside `add`, `start` or `refresh`. A
//! task that fails or panics is logged and counted; it never stops the
//! tasks behind it and never reaches the caller.

use std::any::Any;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// Error a dispatched task may report. Logged, never propagated.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// A deferred zero-argument unit of work.
pub type Task = Box<dyn FnOnce() -> Result<(), TaskError> + Send>;

/// Runs `task` now, turning a panic into an error.
///
/// The queue runs every task through this. Callers that must invoke
/// external code outside the queue use it too.
pub fn run_task<F, E>(task: F) -> Result<(), TaskError>
where
    F: FnOnce() -> Result<(), E>,
    E: Into<TaskError>,
{
    match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(result) => result.map_err(Into::into),
        Err(payload) => Err(format!("task panicked: {}", panic_message(&*payload)).into()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Rate configuration for a dispatch queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Tasks allowed per `window_ms`. `None` or `Some(0)` = unbounded.
    pub count: Option<u32>,
    /// Length of the caller's window in milliseconds.
    pub window_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            count: Some(10),
            window_ms: 1_000,
        }
    }
}

impl DispatchConfig {
    /// The fixed cadence at which the dispatched count resets.
    pub const REFERENCE_WINDOW: Duration = Duration::from_millis(1_000);

    /// `count` tasks per `window_ms`.
    pub fn per_window(count: u32, window_ms: u64) -> Self {
        Self {
            count: Some(count),
            window_ms,
        }
    }

    /// A queue that never throttles.
    pub fn unbounded() -> Self {
        Self {
            count: None,
            window_ms: Self::REFERENCE_WINDOW.as_millis() as u64,
        }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`DispatchQueue::new`]. A zero window would
    /// divide by zero, so it becomes 1 ms.
    pub fn validated(mut self) -> Self {
        if self.window_ms == 0 {
            warn!("dispatch window of 0 ms, clamping to 1 ms");
            self.window_ms = 1;
        }
        self
    }

    /// Tasks per reference window, or `None` when unbounded.
    ///
    /// A positive count never rounds down to zero: the smallest bounded
    /// capacity is one task per window.
    pub fn capacity(&self) -> Option<usize> {
        let count = match self.count {
            Some(count) if count > 0 => count,
            _ => return None,
        };
        let window_ms = self.window_ms.max(1) as f64;
        let rate = Self::REFERENCE_WINDOW.as_millis() as f64 / window_ms;
        Some(((rate * count as f64).round() as usize).max(1))
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Counters kept across the queue's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchMetrics {
    /// Tasks invoked, successful or not.
    pub total_dispatched: u64,
    /// Tasks that returned an error or panicked.
    pub total_failed: u64,
    /// Refresh windows that fired.
    pub total_windows: u64,
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// FIFO task queue draining at most `capacity` tasks per reference window.
///
/// A new queue is running. [`stop`](Self::stop) pauses dispatch and cancels
/// the refresh timer; queued tasks stay queued until
/// [`start`](Self::start).
pub struct DispatchQueue {
    config: DispatchConfig,
    capacity: Option<usize>,
    queue: VecDeque<Task>,
    /// Tasks run since the last refresh.
    dispatched: usize,
    running: bool,
    /// When the next refresh fires. `None` = timer idle.
    next_refresh: Option<Instant>,
    metrics: DispatchMetrics,
}

impl DispatchQueue {
    pub fn new(config: DispatchConfig) -> Self {
        let config = config.validated();
        let capacity = config.capacity();

        match capacity {
            Some(cap) => debug!(
                count = ?config.count,
                window_ms = config.window_ms,
                capacity = cap,
                "dispatch queue created"
            ),
            None => debug!("dispatch queue created without throttling"),
        }

        Self {
            config,
            capacity,
            queue: VecDeque::new(),
            dispatched: 0,
            running: true,
            next_refresh: None,
            metrics: DispatchMetrics::default(),
        }
    }

    /// `count` tasks per `window_ms`.
    pub fn per_window(count: u32, window_ms: u64) -> Self {
        Self::new(DispatchConfig::per_window(count, window_ms))
    }

    /// Enqueue a task and try to run it right away.
    ///
    /// If the current window still has capacity the task runs before this
    /// call returns; otherwise it waits for a later refresh.
    pub fn add<F>(&mut self, task: F)
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static,
    {
        self.queue.push_back(Box::new(task));
        trace!(queued = self.queue.len(), "task queued");
        self.arm();
        self.dispatch();
    }

    /// Run queued tasks until the window's capacity is used up.
    ///
    /// Returns how many tasks ran. Does nothing while stopped.
    pub fn dispatch(&mut self) -> usize {
        if !self.running {
            return 0;
        }

        let mut ran = 0;
        while self.has_capacity() {
            let Some(task) = self.queue.pop_front() else {
                break;
            };
            if let Err(e) = run_task(task) {
                self.metrics.total_failed += 1;
                warn!(error = %e, "dispatched task failed");
            }
            // Failed tasks still consume capacity.
            self.dispatched += 1;
            self.metrics.total_dispatched += 1;
            ran += 1;
        }
        ran
    }

    /// Wait until the refresh timer fires.
    ///
    /// Pends forever while stopped or idle, so `tokio::select!` keeps
    /// serving its other branches. The future does not borrow the queue.
    pub fn wait_for_refresh(&self) -> impl Future<Output = ()> + Send + 'static {
        let next = self.next_refresh.filter(|_| self.running);
        async move {
            match next {
                Some(next) => time::sleep_until(next).await,
                None => std::future::pending::<()>().await,
            }
        }
    }

    /// Start a new window: reset the count, drain what fits, and rearm the
    /// timer only if tasks are still waiting.
    pub fn refresh(&mut self) {
        self.dispatched = 0;
        self.metrics.total_windows += 1;
        self.next_refresh = None;

        let ran = self.dispatch();
        if !self.queue.is_empty() {
            self.arm();
        }
        trace!(ran, remaining = self.queue.len(), "dispatch window refreshed");
    }

    /// Resume dispatching. Idempotent.
    pub fn start(&mut self) {
        if !self.running {
            self.running = true;
            debug!(queued = self.queue.len(), "dispatch queue started");
            self.arm();
            self.dispatch();
        }
    }

    /// Pause dispatching and cancel the timer. Queued tasks are kept.
    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            self.next_refresh = None;
            debug!(queued = self.queue.len(), "dispatch queue stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Number of tasks waiting to run.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Tasks per reference window, or `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Tasks run since the last refresh.
    pub fn dispatched_in_window(&self) -> usize {
        self.dispatched
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }

    fn has_capacity(&self) -> bool {
        self.capacity.is_none_or(|cap| self.dispatched < cap)
    }

    fn arm(&mut self) {
        if self.running && self.next_refresh.is_none() {
            self.next_refresh = Some(Instant::now() + DispatchConfig::REFERENCE_WINDOW);
        }
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new(DispatchConfig::default())
    }
}

impl std::fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("capacity", &self.capacity)
            .field("queued", &self.queue.len())
            .field("dispatched", &self.dispatched)
            .field("running", &self.running)
            .finish()
    }
}
