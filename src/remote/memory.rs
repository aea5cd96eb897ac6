use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::{
    BucketNamesRow, HighlightRow, RemoteError, RemoteResult, RemoteStore, Scope, SettingsRow, Tables,
    TaskRow,
};

/// One applied remote write, in the order the store observed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOp {
    pub action: &'static str,
    pub ids: Vec<String>,
}

#[derive(Debug, Default)]
struct Shared {
    tables: Mutex<Tables>,
    log: Mutex<Vec<RemoteOp>>,
    delays: Mutex<VecDeque<Duration>>,
    failing_writes: AtomicUsize,
    failing_sign_ins: AtomicUsize,
    sign_in_delay: Mutex<Duration>,
    sign_ins: AtomicUsize,
}

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// In-memory remote store.
///
/// Clones share tables and session. `new_device` shares the tables but starts
/// a separate session, like a second device talking to the same backend.
#[derive(Debug, Clone)]
pub struct MemoryRemote {
    shared: Arc<Shared>,
    session: Arc<Mutex<Option<String>>>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::with_tables(Tables::new(true))
    }

    /// Remote whose optional bucket-names table was never provisioned.
    pub fn without_bucket_names_table() -> Self {
        Self::with_tables(Tables::new(false))
    }

    fn with_tables(tables: Tables) -> Self {
        let shared = Shared {
            tables: Mutex::new(tables),
            ..Shared::default()
        };
        Self {
            shared: Arc::new(shared),
            session: Arc::new(Mutex::new(None)),
        }
    }

    pub fn new_device(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            session: Arc::new(Mutex::new(None)),
        }
    }

    /// The next write sleeps `by` before it is applied.
    pub fn delay_next_write(&self, by: Duration) {
        guard(&self.shared.delays).push_back(by);
    }

    pub fn fail_next_writes(&self, count: usize) {
        self.shared.failing_writes.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_sign_ins(&self, count: usize) {
        self.shared.failing_sign_ins.store(count, Ordering::SeqCst);
    }

    pub fn set_sign_in_delay(&self, by: Duration) {
        *guard(&self.shared.sign_in_delay) = by;
    }

    pub fn sign_in_count(&self) -> usize {
        self.shared.sign_ins.load(Ordering::SeqCst)
    }

    pub fn session(&self) -> Option<String> {
        guard(&self.session).clone()
    }

    pub fn ops(&self) -> Vec<RemoteOp> {
        guard(&self.shared.log).clone()
    }

    pub fn clear_ops(&self) {
        guard(&self.shared.log).clear();
    }

    pub fn snapshot(&self) -> Tables {
        guard(&self.shared.tables).clone()
    }

    async fn write<R, F>(&self, action: &'static str, ids: Vec<String>, apply: F) -> RemoteResult<R>
    where
        F: FnOnce(&mut Tables) -> RemoteResult<R> + Send,
        R: Send,
    {
        let delay = guard(&self.shared.delays).pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if take_one(&self.shared.failing_writes) {
            return Err(RemoteError::Rejected(format!("{action}: injected failure")));
        }
        let out = apply(&mut guard(&self.shared.tables))?;
        guard(&self.shared.log).push(RemoteOp { action, ids });
        Ok(out)
    }

    fn read<R>(&self, view: impl FnOnce(&Tables) -> R) -> R {
        view(&guard(&self.shared.tables))
    }
}

fn id_strings(ids: impl IntoIterator<Item = Uuid>) -> Vec<String> {
    ids.into_iter().map(|id| id.to_string()).collect()
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn current_user(&self) -> RemoteResult<Option<String>> {
        Ok(self.session())
    }

    async fn sign_in_anonymously(&self) -> RemoteResult<String> {
        let delay = *guard(&self.shared.sign_in_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.shared.sign_ins.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.shared.failing_sign_ins) {
            return Err(RemoteError::Auth("anonymous sign-in refused".to_string()));
        }

        let user_id = Uuid::new_v4().to_string();
        guard(&self.shared.tables).register_user(&user_id);
        *guard(&self.session) = Some(user_id.clone());
        Ok(user_id)
    }

    async fn upsert_tasks(&self, rows: Vec<TaskRow>) -> RemoteResult<()> {
        let ids = id_strings(rows.iter().map(|r| r.id));
        self.write("upsert_tasks", ids, |t| {
            t.upsert_tasks(rows);
            Ok(())
        })
        .await
    }

    async fn select_tasks(&self, scope: Scope) -> RemoteResult<Vec<TaskRow>> {
        Ok(self.read(|t| t.select_tasks(&scope)))
    }

    async fn delete_tasks(&self, scope: Scope, ids: Option<Vec<Uuid>>) -> RemoteResult<()> {
        let logged = ids.clone().map(id_strings).unwrap_or_default();
        self.write("delete_tasks", logged, |t| {
            t.delete_tasks(&scope, ids.as_deref());
            Ok(())
        })
        .await
    }

    async fn upsert_highlights(&self, rows: Vec<HighlightRow>) -> RemoteResult<()> {
        let ids = id_strings(rows.iter().map(|r| r.id));
        self.write("upsert_highlights", ids, |t| {
            t.upsert_highlights(rows);
            Ok(())
        })
        .await
    }

    async fn select_highlights(&self, scope: Scope) -> RemoteResult<Vec<HighlightRow>> {
        Ok(self.read(|t| t.select_highlights(&scope)))
    }

    async fn delete_highlights(&self, scope: Scope, ids: Option<Vec<Uuid>>) -> RemoteResult<()> {
        let logged = ids.clone().map(id_strings).unwrap_or_default();
        self.write("delete_highlights", logged, |t| {
            t.delete_highlights(&scope, ids.as_deref());
            Ok(())
        })
        .await
    }

    async fn upsert_settings(&self, row: SettingsRow) -> RemoteResult<()> {
        let ids = vec![row.user_id.clone()];
        self.write("upsert_settings", ids, |t| {
            t.upsert_settings(row);
            Ok(())
        })
        .await
    }

    async fn select_settings(&self, user_id: &str) -> RemoteResult<Option<SettingsRow>> {
        Ok(self.read(|t| t.select_settings(user_id)))
    }

    async fn delete_settings(&self, user_id: &str) -> RemoteResult<()> {
        let user_id = user_id.to_string();
        self.write("delete_settings", vec![user_id.clone()], move |t| {
            t.delete_settings(&user_id);
            Ok(())
        })
        .await
    }

    async fn upsert_bucket_names(&self, row: BucketNamesRow) -> RemoteResult<()> {
        let ids = vec![row.id.clone()];
        self.write("upsert_bucket_names", ids, |t| t.upsert_bucket_names(row))
            .await
    }

    async fn select_bucket_names(&self, id: &str) -> RemoteResult<Option<BucketNamesRow>> {
        self.read(|t| t.select_bucket_names(id))
    }

    async fn delete_bucket_names(&self, id: &str) -> RemoteResult<()> {
        let id = id.to_string();
        self.write("delete_bucket_names", vec![id.clone()], move |t| t.delete_bucket_names(&id))
            .await
    }
}
