use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use thiserror::Error;

use super::{Inner, SyncErrorKind, SyncState, SyncStatus};
use crate::error::StoreError;
use crate::logic::prepare_highlights;
use crate::models::{AppSettings, BucketNames, DailyHighlight, Task};
use crate::remote::{HighlightRow, RemoteError, RemoteStore, SettingsRow, TaskRow};

/// Which side won the collection-level reconciliation.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapOutcome {
    RemoteWins,
    LocalPushed,
    NothingToSync,
}

#[derive(Debug, Error)]
enum BootstrapError {
    #[error("fetch failed: {0}")]
    Fetch(#[source] RemoteError),
    #[error("push failed: {0}")]
    Push(#[source] RemoteError),
    #[error("local overwrite failed: {0}")]
    Local(#[from] StoreError),
}

impl BootstrapError {
    fn kind(&self) -> SyncErrorKind {
        match self {
            BootstrapError::Fetch(_) => SyncErrorKind::ReadFailed,
            BootstrapError::Push(_) | BootstrapError::Local(_) => SyncErrorKind::WriteFailed,
        }
    }
}

// Drops pushes enqueued while remote data is copied into local storage.
struct SuppressWrites<'a>(&'a AtomicBool);

impl<'a> SuppressWrites<'a> {
    fn engage(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for SuppressWrites<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Inner {
    pub(super) async fn initialize(&self, force: bool) -> SyncState {
        if self.initialized.swap(true, Ordering::SeqCst) && !force {
            return self.state();
        }

        let Some(remote) = self.remote.as_deref() else {
            self.set_state(SyncStatus::Disabled, "remote sync not configured", None);
            return self.state();
        };
        let Some(user_id) = self.ensure_identity().await else {
            return self.state();
        };

        match self.reconcile(remote, &user_id).await {
            Ok(outcome) => {
                tracing::info!(?outcome, "bootstrap reconciliation finished");
                self.set_state(SyncStatus::Ready, "remote sync active", None);
            }
            Err(err) => {
                tracing::warn!(error = %err, "bootstrap reconciliation failed");
                self.set_state(
                    SyncStatus::Error,
                    format!("could not reconcile with remote store: {err}"),
                    Some(err.kind()),
                );
            }
        }
        self.state()
    }

    /// Whole-collection merge: any remote data wins outright, otherwise local
    /// data is pushed. Bucket names are reconciled on their own.
    async fn reconcile(&self, remote: &dyn RemoteStore, user_id: &str) -> Result<BootstrapOutcome, BootstrapError> {
        let scope = self.collection_scope(user_id);
        let (task_rows, highlight_rows, settings_row) = tokio::try_join!(
            remote.select_tasks(scope.clone()),
            remote.select_highlights(scope),
            remote.select_settings(user_id),
        )
        .map_err(BootstrapError::Fetch)?;
        let remote_bucket_names = self.fetch_bucket_names(remote).await.map_err(BootstrapError::Fetch)?;

        let remote_tasks: Vec<Task> = task_rows.into_iter().map(TaskRow::into_task).collect();
        let remote_highlights: Vec<DailyHighlight> =
            highlight_rows.into_iter().map(HighlightRow::into_highlight).collect();
        let remote_settings = settings_row.map(SettingsRow::into_settings);
        let remote_has_data =
            !remote_tasks.is_empty() || !remote_highlights.is_empty() || remote_settings.is_some();

        let local_tasks = self.store.read_tasks();
        let local_highlights = prepare_highlights(self.store.read_highlights());
        let local_settings = self.store.read_settings();
        let local_bucket_names = self.store.read_bucket_names();
        let local_has_data = !local_tasks.is_empty()
            || !local_highlights.is_empty()
            || local_settings != AppSettings::default();

        let outcome = if remote_has_data {
            self.overwrite_local(remote_tasks, remote_highlights, remote_settings.unwrap_or_default())?;
            BootstrapOutcome::RemoteWins
        } else if local_has_data {
            tokio::try_join!(
                self.push_tasks(remote, user_id, &local_tasks),
                self.push_highlights(remote, user_id, &local_highlights),
                self.push_settings(remote, user_id, &local_settings),
            )
            .map_err(BootstrapError::Push)?;
            BootstrapOutcome::LocalPushed
        } else {
            BootstrapOutcome::NothingToSync
        };

        match remote_bucket_names {
            Some(names) => self.overwrite_local_bucket_names(&names)?,
            None if !local_bucket_names.is_default() => self
                .push_bucket_names(remote, &local_bucket_names)
                .await
                .map_err(BootstrapError::Push)?,
            None => self.overwrite_local_bucket_names(&BucketNames::default())?,
        }

        Ok(outcome)
    }

    fn overwrite_local(
        &self,
        tasks: Vec<Task>,
        highlights: Vec<DailyHighlight>,
        settings: AppSettings,
    ) -> Result<(), StoreError> {
        // writer lock first: an operation still holding it must get to enqueue its push
        let _writer = self.store.lock();
        let _suppress = SuppressWrites::engage(&self.suppress_writes);
        self.store.write_tasks(&tasks)?;
        self.store.write_highlights(&prepare_highlights(highlights))?;
        self.store.write_settings(&settings)
    }

    fn overwrite_local_bucket_names(&self, names: &BucketNames) -> Result<(), StoreError> {
        let _writer = self.store.lock();
        let _suppress = SuppressWrites::engage(&self.suppress_writes);
        self.store.write_bucket_names(names)
    }
}
