//! Best-effort synchronization of the local collections with a remote store.
//!
//! Remote writes go through one serialized queue drained by a single task, so
//! they reach the remote store in the order the local mutations happened. A
//! failed write marks the engine as errored and the queue moves on. Nothing in
//! here is ever reported to domain operations; callers read [`SyncState`].

mod bootstrap;
mod push;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::clock::Clock;
use crate::models::{AppSettings, BucketNames, DailyHighlight, Task};
use crate::remote::{RemoteResult, RemoteStore, Scope};
use crate::store::LocalStore;

pub use bootstrap::BootstrapOutcome;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Disabled,
    Connecting,
    Ready,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    IdentityUnavailable,
    ReadFailed,
    WriteFailed,
    TableMissing,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SyncState {
    pub configured: bool,
    pub status: SyncStatus,
    pub message: String,
    pub last_error: Option<SyncErrorKind>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Tasks and highlights are visible to every identity; stale rows are never pruned.
    pub shared_mode: bool,
}

/// A remote write, carrying the snapshot taken when it was queued.
#[derive(Debug, Clone)]
pub enum SyncJob {
    PushTasks(Vec<Task>),
    PushHighlights(Vec<DailyHighlight>),
    PushSettings(AppSettings),
    PushBucketNames(BucketNames),
    DeleteTask(Uuid),
    DeleteHighlight(Uuid),
    RemoveAll,
}

impl SyncJob {
    pub fn label(&self) -> &'static str {
        match self {
            SyncJob::PushTasks(_) => "push_tasks",
            SyncJob::PushHighlights(_) => "push_highlights",
            SyncJob::PushSettings(_) => "push_settings",
            SyncJob::PushBucketNames(_) => "push_bucket_names",
            SyncJob::DeleteTask(_) => "delete_task",
            SyncJob::DeleteHighlight(_) => "delete_highlight",
            SyncJob::RemoveAll => "remove_all",
        }
    }
}

enum QueueMessage {
    Job(SyncJob),
    /// Reconciliation runs in queue order so its prune never races a queued push.
    Bootstrap { force: bool, done: oneshot::Sender<SyncState> },
    Flush(oneshot::Sender<()>),
}

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

struct Inner {
    remote: Option<Arc<dyn RemoteStore>>,
    store: Arc<LocalStore>,
    clock: Arc<dyn Clock>,
    options: SyncOptions,
    state: Mutex<SyncState>,
    identity: Mutex<Option<String>>,
    identity_gate: tokio::sync::Mutex<()>,
    identity_attempts: AtomicU64,
    initialized: AtomicBool,
    suppress_writes: AtomicBool,
}

pub struct SyncEngine {
    inner: Arc<Inner>,
    queue: Option<mpsc::UnboundedSender<QueueMessage>>,
}

impl SyncEngine {
    /// Engine with no remote: permanently `disabled`, every enqueue is a no-op.
    pub fn disabled(store: Arc<LocalStore>, clock: Arc<dyn Clock>) -> Self {
        Self::new(store, None, SyncOptions::default(), clock)
    }

    /// With a remote this spawns the queue task, so it must run inside a tokio runtime.
    pub fn new(
        store: Arc<LocalStore>,
        remote: Option<Arc<dyn RemoteStore>>,
        options: SyncOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let configured = remote.is_some();
        let state = if configured {
            SyncState {
                configured,
                status: SyncStatus::Connecting,
                message: "remote sync pending".to_string(),
                last_error: None,
            }
        } else {
            SyncState {
                configured,
                status: SyncStatus::Disabled,
                message: "remote sync not configured".to_string(),
                last_error: None,
            }
        };

        let inner = Arc::new(Inner {
            remote,
            store,
            clock,
            options,
            state: Mutex::new(state),
            identity: Mutex::new(None),
            identity_gate: tokio::sync::Mutex::new(()),
            identity_attempts: AtomicU64::new(0),
            initialized: AtomicBool::new(false),
            suppress_writes: AtomicBool::new(false),
        });

        let queue = configured.then(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(drain_queue(Arc::clone(&inner), rx));
            tx
        });

        Self { inner, queue }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.remote.is_some()
    }

    pub fn state(&self) -> SyncState {
        self.inner.state()
    }

    /// Append a remote write behind every write queued before it. Never blocks.
    pub fn enqueue(&self, job: SyncJob) {
        let Some(queue) = &self.queue else {
            return;
        };
        if self.inner.suppress_writes.load(Ordering::SeqCst) {
            tracing::debug!(job = job.label(), "remote write suppressed while applying remote data");
            return;
        }
        tracing::debug!(job = job.label(), "remote write queued");
        if queue.send(QueueMessage::Job(job)).is_err() {
            tracing::warn!("remote write queue is closed");
        }
    }

    /// Wait until every write queued so far has been attempted.
    pub async fn flush(&self) {
        let Some(queue) = &self.queue else {
            return;
        };
        let (done, finished) = oneshot::channel();
        if queue.send(QueueMessage::Flush(done)).is_ok() {
            let _ = finished.await;
        }
    }

    /// Remote identity, resolved once and cached for the engine's lifetime.
    pub async fn ensure_identity(&self) -> Option<String> {
        self.inner.ensure_identity().await
    }

    /// One-time bootstrap reconciliation; `force` runs it again regardless.
    ///
    /// Runs on the queue task behind every write queued before the call.
    pub async fn initialize(&self, force: bool) -> SyncState {
        let Some(queue) = &self.queue else {
            return self.inner.initialize(force).await;
        };
        let (done, finished) = oneshot::channel();
        if queue.send(QueueMessage::Bootstrap { force, done }).is_err() {
            tracing::warn!("remote write queue is closed");
            return self.state();
        }
        finished.await.unwrap_or_else(|_| self.state())
    }

    pub async fn force_resync(&self) -> SyncState {
        self.initialize(true).await
    }
}

async fn drain_queue(inner: Arc<Inner>, mut rx: mpsc::UnboundedReceiver<QueueMessage>) {
    while let Some(message) = rx.recv().await {
        match message {
            QueueMessage::Job(job) => inner.run_job(job).await,
            QueueMessage::Bootstrap { force, done } => {
                let state = inner.initialize(force).await;
                let _ = done.send(state);
            }
            QueueMessage::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!("remote write queue drained and closed");
}

async fn resolve_identity(remote: &dyn RemoteStore) -> RemoteResult<String> {
    match remote.current_user().await {
        Ok(Some(user_id)) => return Ok(user_id),
        Ok(None) => {}
        Err(err) => tracing::warn!(error = %err, "could not read existing remote session"),
    }
    remote.sign_in_anonymously().await
}

impl Inner {
    fn state(&self) -> SyncState {
        guard(&self.state).clone()
    }

    fn set_state(&self, status: SyncStatus, message: impl Into<String>, last_error: Option<SyncErrorKind>) {
        let message = message.into();
        let mut state = guard(&self.state);
        if state.status != status {
            tracing::info!(from = ?state.status, to = ?status, %message, "sync status changed");
        }
        state.status = status;
        state.message = message;
        state.last_error = last_error;
    }

    fn cached_identity(&self) -> Option<String> {
        guard(&self.identity).clone()
    }

    fn collection_scope(&self, user_id: &str) -> Scope {
        if self.options.shared_mode {
            Scope::Everyone
        } else {
            Scope::Owner(user_id.to_string())
        }
    }

    async fn ensure_identity(&self) -> Option<String> {
        let remote = self.remote.as_deref()?;
        if let Some(user_id) = self.cached_identity() {
            return Some(user_id);
        }

        let attempt = self.identity_attempts.load(Ordering::SeqCst);
        let _gate = self.identity_gate.lock().await;
        if let Some(user_id) = self.cached_identity() {
            return Some(user_id);
        }
        if self.identity_attempts.load(Ordering::SeqCst) != attempt {
            // the attempt we waited on already failed; share its outcome
            return None;
        }

        self.set_state(SyncStatus::Connecting, "connecting to remote store", None);
        let resolved = resolve_identity(remote).await;
        self.identity_attempts.fetch_add(1, Ordering::SeqCst);

        match resolved {
            Ok(user_id) => {
                *guard(&self.identity) = Some(user_id.clone());
                self.set_state(SyncStatus::Ready, "anonymous remote session active", None);
                Some(user_id)
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not establish remote session");
                self.set_state(
                    SyncStatus::Error,
                    format!("could not establish remote session: {err}"),
                    Some(SyncErrorKind::IdentityUnavailable),
                );
                None
            }
        }
    }

    async fn run_job(&self, job: SyncJob) {
        let Some(remote) = self.remote.as_deref() else {
            return;
        };
        let label = job.label();
        let Some(user_id) = self.ensure_identity().await else {
            tracing::warn!(job = label, "remote write skipped, no remote identity");
            return;
        };

        match self.apply(remote, &user_id, job).await {
            Ok(()) => self.set_state(SyncStatus::Ready, "remote data in sync", None),
            Err(err) => {
                tracing::warn!(job = label, error = %err, "remote write failed");
                self.set_state(
                    SyncStatus::Error,
                    format!("remote write failed: {err}"),
                    Some(SyncErrorKind::WriteFailed),
                );
            }
        }
    }
}
