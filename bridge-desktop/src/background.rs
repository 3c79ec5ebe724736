//! Task Scheduling Implementation using Tokio timers

use bridge_traits::{
    background::{TaskFactory, TaskFuture, TaskHandle, TaskId, TaskScheduler},
    error::{BridgeError, Result},
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Tokio-based scheduler for desktop.
///
/// Every scheduled task runs as its own tokio task and stops as soon as its
/// cancellation token fires.
#[derive(Clone)]
pub struct TokioTaskScheduler {
    handle: Handle,
    active: Arc<AtomicUsize>,
}

impl TokioTaskScheduler {
    /// Create a scheduler that spawns onto the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a scheduler bound to the runtime of the calling context.
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| {
            BridgeError::NotAvailable(format!("No tokio runtime available for scheduler: {}", e))
        })?;
        Ok(Self::new(handle))
    }

    /// Number of tasks that are scheduled and not yet finished or cancelled.
    pub fn active_tasks(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn handle_for(id: TaskId, token: &CancellationToken) -> TaskHandle {
        let token = token.clone();
        TaskHandle::new(id, move || token.cancel())
    }
}

impl TaskScheduler for TokioTaskScheduler {
    fn schedule_once(&self, task_id: &str, delay: Duration, task: TaskFuture) -> TaskHandle {
        let id = TaskId::new(task_id);
        let token = CancellationToken::new();
        let child = token.clone();
        let active = Arc::clone(&self.active);
        let log_id = id.clone();

        active.fetch_add(1, Ordering::SeqCst);
        debug!(task_id = %id, delay_ms = delay.as_millis() as u64, "Scheduled one-shot task");

        self.handle.spawn(async move {
            tokio::select! {
                _ = child.cancelled() => {
                    debug!(task_id = %log_id, "One-shot task cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    task.await;
                }
            }
            active.fetch_sub(1, Ordering::SeqCst);
        });

        Self::handle_for(id, &token)
    }

    fn schedule_repeating(
        &self,
        task_id: &str,
        period: Duration,
        task: TaskFactory,
    ) -> TaskHandle {
        let id = TaskId::new(task_id);
        let token = CancellationToken::new();
        let child = token.clone();
        let active = Arc::clone(&self.active);
        let log_id = id.clone();

        active.fetch_add(1, Ordering::SeqCst);
        debug!(task_id = %id, period_ms = period.as_millis() as u64, "Scheduled repeating task");

        self.handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = child.cancelled() => {
                        debug!(task_id = %log_id, "Repeating task cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        task().await;
                    }
                }
            }
            active.fetch_sub(1, Ordering::SeqCst);
        });

        Self::handle_for(id, &token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::AtomicU32;

    #[tokio::test(start_paused = true)]
    async fn test_schedule_once_runs_after_delay() {
        let scheduler = TokioTaskScheduler::current().unwrap();
        let runs = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&runs);

        scheduler.schedule_once(
            "retry",
            Duration::from_secs(2),
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed(),
        );

        tokio::time::sleep(Duration::from_millis(1_900)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_once_never_runs() {
        let scheduler = TokioTaskScheduler::current().unwrap();
        let runs = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&runs);

        let handle = scheduler.schedule_once(
            "retry",
            Duration::from_secs(1),
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed(),
        );
        handle.cancel();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.active_tasks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeating_task_ticks_until_cancelled() {
        let scheduler = TokioTaskScheduler::current().unwrap();
        let runs = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&runs);

        let factory: TaskFactory = Arc::new(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        });

        let handle = scheduler.schedule_repeating("auto-sync", Duration::from_secs(60), factory);

        tokio::time::sleep(Duration::from_secs(185)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        handle.cancel();
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
