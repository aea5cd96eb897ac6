use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{AppSettings, BucketNames, DailyHighlight, Task};

/// Independent JSON blobs kept by the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Tasks,
    Highlights,
    Settings,
    BucketNames,
    ReviewedHighlights,
}

impl Collection {
    pub fn key(self) -> &'static str {
        match self {
            Collection::Tasks => "tasks",
            Collection::Highlights => "highlights",
            Collection::Settings => "settings",
            Collection::BucketNames => "bucket_names",
            Collection::ReviewedHighlights => "reviewed_highlights",
        }
    }
}

/// Key-based persistent storage, one JSON file per collection.
///
/// Reads never fail: a missing or corrupt file reads as empty. Writes replace
/// the whole file atomically and are flushed before returning.
#[derive(Debug)]
pub struct LocalStore {
    dir: PathBuf,
    writer: Mutex<()>,
}

impl LocalStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Write { key: "data_dir", source })?;
        Ok(Self { dir, writer: Mutex::new(()) })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Single-writer guard held around a read-modify-write of any collection.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn path(&self, collection: Collection) -> PathBuf {
        self.dir.join(format!("{}.json", collection.key()))
    }

    fn read_json<T: DeserializeOwned>(&self, collection: Collection) -> Option<T> {
        let path = self.path(collection);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(key = collection.key(), error = %e, "unreadable local blob, treating as empty");
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = collection.key(), error = %e, "corrupt local blob, treating as empty");
                None
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, collection: Collection, value: &T) -> Result<(), StoreError> {
        let key = collection.key();
        let text = serde_json::to_string_pretty(value).map_err(|source| StoreError::Encode { key, source })?;

        let path = self.path(collection);
        let tmp_path = path.with_extension("json.tmp");
        let write = || -> io::Result<()> {
            let mut f = File::create(&tmp_path)?;
            f.write_all(text.as_bytes())?;
            f.sync_all()?;
            fs::rename(&tmp_path, &path)
        };
        write().map_err(|source| StoreError::Write { key, source })
    }

    pub fn remove(&self, collection: Collection) -> Result<(), StoreError> {
        match fs::remove_file(self.path(collection)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Remove { key: collection.key(), source }),
        }
    }

    pub fn read_tasks(&self) -> Vec<Task> {
        self.read_json(Collection::Tasks).unwrap_or_default()
    }

    pub fn write_tasks(&self, tasks: &[Task]) -> Result<(), StoreError> {
        self.write_json(Collection::Tasks, tasks)
    }

    /// Raw highlight blob; callers normalize it.
    pub fn read_highlights(&self) -> Vec<DailyHighlight> {
        self.read_json(Collection::Highlights).unwrap_or_default()
    }

    pub fn write_highlights(&self, highlights: &[DailyHighlight]) -> Result<(), StoreError> {
        self.write_json(Collection::Highlights, highlights)
    }

    /// Stored settings merged over the defaults.
    pub fn read_settings(&self) -> AppSettings {
        self.read_json(Collection::Settings).unwrap_or_default()
    }

    pub fn write_settings(&self, settings: &AppSettings) -> Result<(), StoreError> {
        self.write_json(Collection::Settings, settings)
    }

    pub fn read_bucket_names(&self) -> BucketNames {
        self.read_json(Collection::BucketNames).unwrap_or_default()
    }

    pub fn write_bucket_names(&self, names: &BucketNames) -> Result<(), StoreError> {
        self.write_json(Collection::BucketNames, names)
    }

    pub fn read_reviewed(&self) -> BTreeSet<Uuid> {
        self.read_json(Collection::ReviewedHighlights).unwrap_or_default()
    }

    pub fn write_reviewed(&self, ids: &BTreeSet<Uuid>) -> Result<(), StoreError> {
        self.write_json(Collection::ReviewedHighlights, ids)
    }
}
