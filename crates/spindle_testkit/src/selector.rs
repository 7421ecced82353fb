//! Dispatcher stand-ins: interest recording, manual executors, polling.

use parking_lot::Mutex;
use spindle_core::{Executor, Selector, Task};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// A selector that counts interest requests.
#[derive(Debug, Default)]
pub struct RecordingSelector {
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl RecordingSelector {
    /// Read interest requests so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Write interest requests so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Selector for RecordingSelector {
    fn request_read_interest(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    fn request_write_interest(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

/// An executor that only runs tasks when the test says so.
#[derive(Default)]
pub struct QueuedExecutor {
    tasks: Mutex<VecDeque<Task>>,
}

impl QueuedExecutor {
    /// Runs the oldest queued task on the calling thread.
    ///
    /// Returns false if nothing was queued.
    pub fn run_one(&self) -> bool {
        let task = self.tasks.lock().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Number of queued tasks.
    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }
}

impl Executor for QueuedExecutor {
    fn execute(&self, task: Task) {
        self.tasks.lock().push_back(task);
    }
}

impl std::fmt::Debug for QueuedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedExecutor")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Polls `condition` until it holds or `timeout` passes.
///
/// Returns the final value of `condition`.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return condition();
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[test]
    fn counts_interest() {
        let selector = RecordingSelector::default();
        selector.request_read_interest();
        selector.request_read_interest();
        selector.request_write_interest();
        assert_eq!(selector.reads(), 2);
        assert_eq!(selector.writes(), 1);
    }

    #[test]
    fn queued_tasks_run_on_demand() {
        let executor = QueuedExecutor::default();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        executor.execute(Box::new(move || flag.store(true, Ordering::SeqCst)));

        assert_eq!(executor.pending(), 1);
        assert!(!ran.load(Ordering::SeqCst));
        assert!(executor.run_one());
        assert!(ran.load(Ordering::SeqCst));
        assert!(!executor.run_one());
    }

    #[test]
    fn wait_until_times_out() {
        assert!(wait_until(Duration::from_millis(5), || true));
        assert!(!wait_until(Duration::from_millis(5), || false));
    }
}
