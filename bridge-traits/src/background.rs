//! Background Task Scheduling
//!
//! Provides an injectable timer so that delayed and periodic work (retry
//! backoff, auto-sync) can be driven by the host runtime in production and
//! stepped manually in tests.

use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Future executed by a scheduled task.
pub type TaskFuture = BoxFuture<'static, ()>;

/// Produces a fresh future for every tick of a repeating task.
pub type TaskFactory = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// Scheduled task identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to a scheduled task.
///
/// Dropping the handle does not cancel the task; call [`cancel`](Self::cancel).
#[derive(Clone)]
pub struct TaskHandle {
    id: TaskId,
    canceller: Arc<dyn Fn() + Send + Sync>,
}

impl TaskHandle {
    pub fn new<F>(id: TaskId, canceller: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            id,
            canceller: Arc::new(canceller),
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Cancel the task. Cancelling twice, or after the task ran, is a no-op.
    pub fn cancel(&self) {
        (self.canceller)();
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle").field("id", &self.id).finish()
    }
}

/// Timer abstraction used for retries and periodic sync.
///
/// # Platform Notes
///
/// - **Desktop**: tokio timers (`bridge_desktop::TokioTaskScheduler`)
/// - **Browser extension**: `chrome.alarms` / `setTimeout`
/// - **Tests**: a manual scheduler that records delays and runs tasks on demand
///
/// # Example
///
/// ```ignore
/// use bridge_traits::background::TaskScheduler;
/// use futures::FutureExt;
/// use std::time::Duration;
///
/// fn schedule_retry(scheduler: &dyn TaskScheduler) {
///     scheduler.schedule_once(
///         "sync-retry",
///         Duration::from_secs(2),
///         async { /* retry */ }.boxed(),
///     );
/// }
/// ```
pub trait TaskScheduler: Send + Sync {
    /// Run `task` once after `delay`.
    fn schedule_once(&self, task_id: &str, delay: Duration, task: TaskFuture) -> TaskHandle;

    /// Run a future produced by `task` every `period`, first tick after one period.
    fn schedule_repeating(&self, task_id: &str, period: Duration, task: TaskFactory)
        -> TaskHandle;
}
