use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    BucketNamesRow, HighlightRow, RemoteResult, RemoteStore, Scope, SettingsRow, Tables, TaskRow,
};

#[derive(Debug, Serialize, Deserialize)]
struct Session {
    user_id: String,
}

/// Remote store kept in a shared directory (a synced folder, a network mount).
///
/// All tables live in `tables.json`, replaced atomically on every write. The
/// anonymous session of this device is kept in its own file outside the
/// shared directory.
#[derive(Debug)]
pub struct FsRemote {
    root: PathBuf,
    session_path: PathBuf,
    gate: Mutex<()>,
}

impl FsRemote {
    pub async fn open(
        root: impl Into<PathBuf>,
        session_path: impl Into<PathBuf>,
        provision_bucket_names: bool,
    ) -> RemoteResult<Self> {
        let remote = Self {
            root: root.into(),
            session_path: session_path.into(),
            gate: Mutex::new(()),
        };
        tokio::fs::create_dir_all(&remote.root).await?;

        if provision_bucket_names {
            remote
                .mutate(|t| {
                    if t.bucket_names.is_none() {
                        t.bucket_names = Some(BTreeMap::new());
                    }
                    Ok(())
                })
                .await?;
        }
        Ok(remote)
    }

    fn tables_path(&self) -> PathBuf {
        self.root.join("tables.json")
    }

    async fn load(&self) -> RemoteResult<Tables> {
        match tokio::fs::read(self.tables_path()).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Tables::new(false)),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, tables: &Tables) -> RemoteResult<()> {
        let bytes = serde_json::to_vec_pretty(tables)?;
        write_atomic(&self.tables_path(), &bytes).await
    }

    async fn mutate<R, F>(&self, apply: F) -> RemoteResult<R>
    where
        F: FnOnce(&mut Tables) -> RemoteResult<R> + Send,
        R: Send,
    {
        let _gate = self.gate.lock().await;
        let mut tables = self.load().await?;
        let out = apply(&mut tables)?;
        self.save(&tables).await?;
        Ok(out)
    }

    async fn view<R>(&self, view: impl FnOnce(&Tables) -> R + Send) -> RemoteResult<R> {
        let _gate = self.gate.lock().await;
        let tables = self.load().await?;
        Ok(view(&tables))
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> RemoteResult<()> {
    // unique temp name: several processes may share the directory
    let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4()));
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl RemoteStore for FsRemote {
    async fn current_user(&self) -> RemoteResult<Option<String>> {
        match tokio::fs::read(&self.session_path).await {
            Ok(bytes) => {
                let session: Session = serde_json::from_slice(&bytes)?;
                Ok(Some(session.user_id))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn sign_in_anonymously(&self) -> RemoteResult<String> {
        let user_id = Uuid::new_v4().to_string();
        let registered = user_id.clone();
        self.mutate(move |t| {
            t.register_user(&registered);
            Ok(())
        })
        .await?;

        if let Some(parent) = self.session_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec(&Session { user_id: user_id.clone() })?;
        write_atomic(&self.session_path, &bytes).await?;
        Ok(user_id)
    }

    async fn upsert_tasks(&self, rows: Vec<TaskRow>) -> RemoteResult<()> {
        self.mutate(|t| {
            t.upsert_tasks(rows);
            Ok(())
        })
        .await
    }

    async fn select_tasks(&self, scope: Scope) -> RemoteResult<Vec<TaskRow>> {
        self.view(|t| t.select_tasks(&scope)).await
    }

    async fn delete_tasks(&self, scope: Scope, ids: Option<Vec<Uuid>>) -> RemoteResult<()> {
        self.mutate(|t| {
            t.delete_tasks(&scope, ids.as_deref());
            Ok(())
        })
        .await
    }

    async fn upsert_highlights(&self, rows: Vec<HighlightRow>) -> RemoteResult<()> {
        self.mutate(|t| {
            t.upsert_highlights(rows);
            Ok(())
        })
        .await
    }

    async fn select_highlights(&self, scope: Scope) -> RemoteResult<Vec<HighlightRow>> {
        self.view(|t| t.select_highlights(&scope)).await
    }

    async fn delete_highlights(&self, scope: Scope, ids: Option<Vec<Uuid>>) -> RemoteResult<()> {
        self.mutate(|t| {
            t.delete_highlights(&scope, ids.as_deref());
            Ok(())
        })
        .await
    }

    async fn upsert_settings(&self, row: SettingsRow) -> RemoteResult<()> {
        self.mutate(|t| {
            t.upsert_settings(row);
            Ok(())
        })
        .await
    }

    async fn select_settings(&self, user_id: &str) -> RemoteResult<Option<SettingsRow>> {
        self.view(|t| t.select_settings(user_id)).await
    }

    async fn delete_settings(&self, user_id: &str) -> RemoteResult<()> {
        self.mutate(|t| {
            t.delete_settings(user_id);
            Ok(())
        })
        .await
    }

    async fn upsert_bucket_names(&self, row: BucketNamesRow) -> RemoteResult<()> {
        self.mutate(|t| t.upsert_bucket_names(row)).await
    }

    async fn select_bucket_names(&self, id: &str) -> RemoteResult<Option<BucketNamesRow>> {
        self.view(|t| t.select_bucket_names(id)).await?
    }

    async fn delete_bucket_names(&self, id: &str) -> RemoteResult<()> {
        self.mutate(|t| t.delete_bucket_names(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn session_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let session = dir.path().join("device/session.json");

        let remote = FsRemote::open(dir.path().join("remote"), &session, true).await.unwrap();
        assert_eq!(remote.current_user().await.unwrap(), None);
        let user = remote.sign_in_anonymously().await.unwrap();

        let reopened = FsRemote::open(dir.path().join("remote"), &session, true).await.unwrap();
        assert_eq!(reopened.current_user().await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn unprovisioned_bucket_names_table_is_missing() {
        let dir = TempDir::new().unwrap();
        let remote = FsRemote::open(dir.path().join("remote"), dir.path().join("s.json"), false)
            .await
            .unwrap();

        let err = remote.select_bucket_names("global").await.unwrap_err();
        assert!(matches!(err, RemoteError::TableMissing(_)));
    }

    #[tokio::test]
    async fn delete_respects_owner_scope() {
        let dir = TempDir::new().unwrap();
        let remote = FsRemote::open(dir.path().join("remote"), dir.path().join("s.json"), true)
            .await
            .unwrap();

        let now = chrono::Utc::now();
        let row = |owner: &str| TaskRow {
            id: Uuid::new_v4(),
            user_id: owner.to_string(),
            title: "t".into(),
            notes: None,
            bucket: crate::models::Bucket::Sink,
            order_index: 0,
            status: crate::models::TaskStatus::Todo,
            est_minutes: None,
            created_at: now,
            updated_at: now,
        };
        let mine = row("me");
        let theirs = row("them");
        remote.upsert_tasks(vec![mine.clone(), theirs.clone()]).await.unwrap();

        remote.delete_tasks(Scope::Owner("me".into()), None).await.unwrap();
        let left = remote.select_tasks(Scope::Everyone).await.unwrap();
        assert_eq!(left, vec![theirs]);
    }
}
