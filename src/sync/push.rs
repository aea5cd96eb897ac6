use std::collections::HashSet;

use uuid::Uuid;

use super::{Inner, SyncErrorKind, SyncJob};
use crate::models::{AppSettings, BucketNames, DailyHighlight, Task};
use crate::remote::{
    BucketNamesRow, HighlightRow, RemoteError, RemoteResult, RemoteStore, SHARED_BUCKET_NAMES_ROW_ID,
    Scope, SettingsRow, TaskRow,
};

fn soften_missing_table(result: RemoteResult<()>, what: &str) -> RemoteResult<()> {
    match result {
        Err(err) if err.is_table_missing() => {
            tracing::info!(kind = ?SyncErrorKind::TableMissing, error = %err, "{what} skipped");
            Ok(())
        }
        other => other,
    }
}

impl Inner {
    pub(super) async fn apply(&self, remote: &dyn RemoteStore, user_id: &str, job: SyncJob) -> RemoteResult<()> {
        match job {
            SyncJob::PushTasks(tasks) => self.push_tasks(remote, user_id, &tasks).await,
            SyncJob::PushHighlights(highlights) => self.push_highlights(remote, user_id, &highlights).await,
            SyncJob::PushSettings(settings) => self.push_settings(remote, user_id, &settings).await,
            SyncJob::PushBucketNames(names) => self.push_bucket_names(remote, &names).await,
            SyncJob::DeleteTask(id) => {
                remote.delete_tasks(self.collection_scope(user_id), Some(vec![id])).await
            }
            SyncJob::DeleteHighlight(id) => {
                remote.delete_highlights(self.collection_scope(user_id), Some(vec![id])).await
            }
            SyncJob::RemoveAll => self.remove_all(remote, user_id).await,
        }
    }

    /// Upsert every task, then (owner mode only) delete remote rows gone locally.
    pub(super) async fn push_tasks(&self, remote: &dyn RemoteStore, user_id: &str, tasks: &[Task]) -> RemoteResult<()> {
        if !tasks.is_empty() {
            let rows = tasks.iter().map(|t| TaskRow::from_task(t, user_id)).collect();
            remote.upsert_tasks(rows).await?;
        }

        // shared mode: another device may own rows we have not pulled yet
        if self.options.shared_mode {
            return Ok(());
        }

        let owner = Scope::Owner(user_id.to_string());
        let local: HashSet<Uuid> = tasks.iter().map(|t| t.id).collect();
        let stale: Vec<Uuid> = remote
            .select_tasks(owner.clone())
            .await?
            .into_iter()
            .map(|r| r.id)
            .filter(|id| !local.contains(id))
            .collect();

        if !stale.is_empty() {
            tracing::debug!(count = stale.len(), "pruning stale remote tasks");
            remote.delete_tasks(owner, Some(stale)).await?;
        }
        Ok(())
    }

    pub(super) async fn push_highlights(
        &self,
        remote: &dyn RemoteStore,
        user_id: &str,
        highlights: &[DailyHighlight],
    ) -> RemoteResult<()> {
        if !highlights.is_empty() {
            let rows = highlights.iter().map(|h| HighlightRow::from_highlight(h, user_id)).collect();
            remote.upsert_highlights(rows).await?;
        }

        if self.options.shared_mode {
            return Ok(());
        }

        let owner = Scope::Owner(user_id.to_string());
        let local: HashSet<Uuid> = highlights.iter().map(|h| h.id).collect();
        let stale: Vec<Uuid> = remote
            .select_highlights(owner.clone())
            .await?
            .into_iter()
            .map(|r| r.id)
            .filter(|id| !local.contains(id))
            .collect();

        if !stale.is_empty() {
            tracing::debug!(count = stale.len(), "pruning stale remote highlights");
            remote.delete_highlights(owner, Some(stale)).await?;
        }
        Ok(())
    }

    pub(super) async fn push_settings(
        &self,
        remote: &dyn RemoteStore,
        user_id: &str,
        settings: &AppSettings,
    ) -> RemoteResult<()> {
        let row = SettingsRow::from_settings(settings, user_id, self.clock.now());
        remote.upsert_settings(row).await
    }

    pub(super) async fn push_bucket_names(&self, remote: &dyn RemoteStore, names: &BucketNames) -> RemoteResult<()> {
        let row = BucketNamesRow::from_names(names, self.clock.now());
        soften_missing_table(remote.upsert_bucket_names(row).await, "bucket names upsert")
    }

    /// Remote bucket names; `None` when the row or the whole table is absent.
    pub(super) async fn fetch_bucket_names(&self, remote: &dyn RemoteStore) -> RemoteResult<Option<BucketNames>> {
        match remote.select_bucket_names(SHARED_BUCKET_NAMES_ROW_ID).await {
            Ok(row) => Ok(row.map(BucketNamesRow::into_names)),
            Err(RemoteError::TableMissing(table)) => {
                tracing::info!(kind = ?SyncErrorKind::TableMissing, table, "bucket names fetch skipped");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn remove_all(&self, remote: &dyn RemoteStore, user_id: &str) -> RemoteResult<()> {
        let scope = self.collection_scope(user_id);
        let (tasks, highlights, settings) = tokio::join!(
            remote.delete_tasks(scope.clone(), None),
            remote.delete_highlights(scope, None),
            remote.delete_settings(user_id),
        );
        let bucket_names = remote.delete_bucket_names(SHARED_BUCKET_NAMES_ROW_ID).await;

        tasks?;
        highlights?;
        settings?;
        soften_missing_table(bucket_names, "bucket names delete")
    }
}
