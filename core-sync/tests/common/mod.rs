//! Shared fixtures for coordinator integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_desktop::{JsonFileStore, StaticAuthProvider};
use bridge_traits::{
    auth::{AuthProvider, Identity},
    background::{TaskFactory, TaskFuture, TaskHandle, TaskId, TaskScheduler},
    error::{BridgeError, Result as BridgeResult},
    storage::{RemotePayload, RemoteStore, UploadAck},
    time::FixedClock,
};
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use core_runtime::config::{CoreConfig, SyncSettings};
use core_runtime::events::{CoreEvent, EventBus};
use core_sync::{
    checksum, LocalSnapshotRepository, PayloadCodec, SnapshotCodec, SnapshotRepository,
    SyncCoordinator, SyncSnapshot, VocabularyRecord,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast::Receiver, Semaphore};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap()
}

pub fn word(id: &str, at: DateTime<Utc>) -> VocabularyRecord {
    VocabularyRecord::new(id, format!("word-{}", id), format!("meaning of {}", id), at)
}

pub fn snapshot(device: &str, ids: &[&str]) -> SyncSnapshot {
    let mut snapshot = SyncSnapshot::empty(device, t0());
    snapshot.words = ids.iter().map(|id| word(id, t0())).collect();
    snapshot
}

pub fn codec() -> SnapshotCodec {
    SnapshotCodec::plain().with_compression(3)
}

// ============================================================================
// Remote store
// ============================================================================

/// In-memory remote store with failure injection and an optional gate that
/// holds `fetch` until permits are added.
pub struct MemoryRemoteStore {
    payload: Mutex<Option<RemotePayload>>,
    fail_fetch: AtomicBool,
    fail_upload: AtomicBool,
    gated: AtomicBool,
    gate: Semaphore,
    pub fetch_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self {
            payload: Mutex::new(None),
            fail_fetch: AtomicBool::new(false),
            fail_upload: AtomicBool::new(false),
            gated: AtomicBool::new(false),
            gate: Semaphore::new(0),
            fetch_calls: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
        }
    }
}

impl MemoryRemoteStore {
    pub fn seed(&self, snapshot: &SyncSnapshot) {
        let blob = codec().encode(snapshot).unwrap();
        self.seed_raw(blob.clone(), checksum(&blob));
    }

    pub fn seed_raw(&self, blob: Bytes, checksum: String) {
        *self.payload.lock() = Some(RemotePayload {
            blob,
            checksum,
            uploaded_at: Some(t0()),
        });
    }

    pub fn stored(&self) -> Option<SyncSnapshot> {
        self.payload
            .lock()
            .as_ref()
            .map(|payload| codec().decode(&payload.blob).unwrap())
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_upload(&self, fail: bool) {
        self.fail_upload.store(fail, Ordering::SeqCst);
    }

    pub fn hold_fetches(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn release_fetches(&self) {
        self.gated.store(false, Ordering::SeqCst);
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch(&self, _identity: &Identity) -> BridgeResult<Option<RemotePayload>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        if self.gated.load(Ordering::SeqCst) {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;
        }

        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(BridgeError::Network("connection reset".to_string()));
        }
        Ok(self.payload.lock().clone())
    }

    async fn upload(&self, _identity: &Identity, blob: Bytes, checksum: &str) -> BridgeResult<UploadAck> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(BridgeError::Network("503 Service Unavailable".to_string()));
        }

        let ack = UploadAck {
            checksum: checksum.to_string(),
            size_bytes: blob.len() as u64,
            uploaded_at: t0(),
        };
        self.seed_raw(blob, checksum.to_string());
        Ok(ack)
    }
}

// ============================================================================
// Scheduler
// ============================================================================

struct OnceTask {
    id: String,
    delay: Duration,
    task: Option<TaskFuture>,
    cancelled: Arc<AtomicBool>,
}

struct RepeatingTask {
    period: Duration,
    factory: TaskFactory,
    cancelled: Arc<AtomicBool>,
}

/// Records every request and runs tasks only when the test asks.
#[derive(Default)]
pub struct ManualScheduler {
    once: Mutex<Vec<OnceTask>>,
    repeating: Mutex<Vec<RepeatingTask>>,
}

impl ManualScheduler {
    /// Delays of every one-shot task ever scheduled, cancelled or not.
    pub fn scheduled_delays(&self) -> Vec<Duration> {
        self.once.lock().iter().map(|t| t.delay).collect()
    }

    pub fn pending_once(&self) -> usize {
        self.once
            .lock()
            .iter()
            .filter(|t| t.task.is_some() && !t.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Run the oldest pending one-shot task. Returns `false` if none is left.
    pub async fn run_next(&self) -> bool {
        let task = {
            let mut once = self.once.lock();
            once.iter_mut()
                .filter(|t| !t.cancelled.load(Ordering::SeqCst))
                .find_map(|t| t.task.take())
        };

        match task {
            Some(task) => {
                task.await;
                true
            }
            None => false,
        }
    }

    pub fn active_repeating(&self) -> Vec<Duration> {
        self.repeating
            .lock()
            .iter()
            .filter(|t| !t.cancelled.load(Ordering::SeqCst))
            .map(|t| t.period)
            .collect()
    }

    /// Fire every active repeating task once.
    pub async fn tick(&self) {
        let futures: Vec<TaskFuture> = self
            .repeating
            .lock()
            .iter()
            .filter(|t| !t.cancelled.load(Ordering::SeqCst))
            .map(|t| (t.factory)())
            .collect();

        for future in futures {
            future.await;
        }
    }
}

impl TaskScheduler for ManualScheduler {
    fn schedule_once(&self, task_id: &str, delay: Duration, task: TaskFuture) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        self.once.lock().push(OnceTask {
            id: task_id.to_string(),
            delay,
            task: Some(task),
            cancelled,
        });
        TaskHandle::new(TaskId::new(task_id), move || flag.store(true, Ordering::SeqCst))
    }

    fn schedule_repeating(&self, task_id: &str, period: Duration, task: TaskFactory) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        self.repeating.lock().push(RepeatingTask {
            period,
            factory: task,
            cancelled,
        });
        TaskHandle::new(TaskId::new(task_id), move || flag.store(true, Ordering::SeqCst))
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub coordinator: Arc<SyncCoordinator>,
    pub local: Arc<JsonFileStore>,
    pub remote: Arc<MemoryRemoteStore>,
    pub scheduler: Arc<ManualScheduler>,
    pub clock: Arc<FixedClock>,
    pub events: Receiver<CoreEvent>,
}

impl Harness {
    pub fn new(settings: SyncSettings) -> Self {
        Self::with_auth(settings, Arc::new(StaticAuthProvider::signed_in("token", "user-1")))
    }

    pub fn with_auth(settings: SyncSettings, auth: Arc<dyn AuthProvider>) -> Self {
        let remote = Arc::new(MemoryRemoteStore::default());
        Self::build(settings, auth, remote, |coordinator| coordinator)
    }

    pub fn build(
        settings: SyncSettings,
        auth: Arc<dyn AuthProvider>,
        remote: Arc<MemoryRemoteStore>,
        customize: impl FnOnce(SyncCoordinator) -> SyncCoordinator,
    ) -> Self {
        let local = Arc::new(JsonFileStore::in_memory());
        let scheduler = Arc::new(ManualScheduler::default());
        let clock = Arc::new(FixedClock::new(t0()));

        let config = CoreConfig::builder()
            .local_store(local.clone())
            .remote_store(remote.clone())
            .auth_provider(auth)
            .scheduler(scheduler.clone())
            .clock(clock.clone())
            .settings(settings)
            .build()
            .unwrap();

        let event_bus = EventBus::new(256);
        let events = event_bus.subscribe();
        let coordinator = customize(SyncCoordinator::new(config, Arc::new(codec()), event_bus));

        Self {
            coordinator: Arc::new(coordinator),
            local,
            remote,
            scheduler,
            clock,
            events,
        }
    }

    pub fn repository(&self) -> LocalSnapshotRepository {
        LocalSnapshotRepository::new(self.local.clone())
    }

    pub async fn seed_local(&self, snapshot: &SyncSnapshot) {
        self.repository().save_snapshot(snapshot).await.unwrap();
    }

    pub async fn local_snapshot(&self) -> SyncSnapshot {
        self.repository().load_snapshot(t0()).await.unwrap()
    }

    pub fn drain_events(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
