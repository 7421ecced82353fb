//! Off-dispatch task execution.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::error;

/// A unit of work handed to an [`Executor`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks away from the I/O dispatch thread.
///
/// Replicators block on the sequencer inside these tasks, so an executor
/// must not run them on a thread that delivers readiness callbacks.
pub trait Executor: Send + Sync {
    /// Schedules `task` to run.
    fn execute(&self, task: Task);
}

/// Runs every task on a fresh named OS thread.
#[derive(Debug)]
pub struct ThreadExecutor {
    name: String,
    spawned: AtomicU64,
}

impl ThreadExecutor {
    /// Creates an executor whose threads are named `{name}-{n}`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spawned: AtomicU64::new(0),
        }
    }
}

impl Default for ThreadExecutor {
    fn default() -> Self {
        Self::new("spindle-worker")
    }
}

impl Executor for ThreadExecutor {
    fn execute(&self, task: Task) {
        let n = self.spawned.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}-{n}", self.name);
        if let Err(e) = std::thread::Builder::new().name(name.clone()).spawn(task) {
            error!(thread = %name, error = %e, "failed to spawn worker thread");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn runs_task_on_named_thread() {
        let executor = ThreadExecutor::new("test-exec");
        let (tx, rx) = mpsc::channel();
        executor.execute(Box::new(move || {
            let name = std::thread::current().name().map(str::to_owned);
            tx.send(name).unwrap();
        }));

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("test-exec-0"));
    }
}
