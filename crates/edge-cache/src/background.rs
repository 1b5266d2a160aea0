//! Fire-and-forget work that outlives the response.
//!
//! Store writes, version bumps and refreshes run here. The host runtime may
//! call [`BackgroundTasks::flush`] to wait for them, e.g. before shutdown.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::Instrument;

/// Outcome of [`BackgroundTasks::flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Tasks that ran to completion.
    pub completed: usize,
    /// Tasks that panicked or were cancelled.
    pub panicked: usize,
}

/// Handle to the set of in-flight background tasks.
///
/// Cloning shares the same set.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task on the current tokio runtime.
    pub fn spawn<F>(&self, label: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let span = tracing::debug_span!("background", task = label);
        let handle = tokio::spawn(future.instrument(span));

        let mut handles = self.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Number of tasks not yet joined.
    pub fn pending(&self) -> usize {
        self.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// Wait for every task, including ones spawned while waiting.
    pub async fn flush(&self) -> FlushReport {
        let mut report = FlushReport::default();

        loop {
            let batch = std::mem::take(&mut *self.lock());
            if batch.is_empty() {
                break;
            }

            for handle in batch {
                match handle.await {
                    Ok(()) => report.completed += 1,
                    Err(err) => {
                        tracing::warn!(error = %err, "background task failed");
                        report.panicked += 1;
                    }
                }
            }
        }

        report
    }

    fn lock(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_flush_waits_for_tasks() {
        let tasks = BackgroundTasks::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = counter.clone();
            tasks.spawn("count", async move {
                tokio::task::yield_now().await;
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        let report = tasks.flush().await;

        assert_eq!(report.completed, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(tasks.pending(), 0);
    }

    #[tokio::test]
    async fn test_flush_joins_nested_tasks() {
        let tasks = BackgroundTasks::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let inner_tasks = tasks.clone();
        let inner_counter = counter.clone();
        tasks.spawn("outer", async move {
            inner_tasks.spawn("inner", async move {
                inner_counter.fetch_add(1, Ordering::SeqCst);
            });
        });

        let report = tasks.flush().await;

        assert_eq!(report.completed, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_task_is_reported() {
        let tasks = BackgroundTasks::new();
        tasks.spawn("boom", async {
            panic!("boom");
        });
        tasks.spawn("fine", async {});

        let report = tasks.flush().await;

        assert_eq!(report, FlushReport { completed: 1, panicked: 1 });
    }

    #[tokio::test]
    async fn test_flush_with_nothing_pending() {
        let tasks = BackgroundTasks::new();
        assert_eq!(tasks.flush().await, FlushReport::default());
    }
}
