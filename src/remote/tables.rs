use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BucketNamesRow, HighlightRow, RemoteError, RemoteResult, Scope, SettingsRow, TaskRow};

const BUCKET_NAMES_TABLE: &str = "bucket_names";

/// In-process model of the remote tables, shared by the file and memory adapters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tables {
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub tasks: BTreeMap<Uuid, TaskRow>,
    #[serde(default)]
    pub highlights: BTreeMap<Uuid, HighlightRow>,
    #[serde(default)]
    pub settings: BTreeMap<String, SettingsRow>,
    /// `None` until the optional table is provisioned.
    #[serde(default)]
    pub bucket_names: Option<BTreeMap<String, BucketNamesRow>>,
}

impl Tables {
    pub fn new(provision_bucket_names: bool) -> Self {
        Self {
            bucket_names: provision_bucket_names.then(BTreeMap::new),
            ..Self::default()
        }
    }

    pub fn register_user(&mut self, user_id: &str) {
        if !self.users.iter().any(|u| u == user_id) {
            self.users.push(user_id.to_string());
        }
    }

    pub fn upsert_tasks(&mut self, rows: Vec<TaskRow>) {
        for row in rows {
            self.tasks.insert(row.id, row);
        }
    }

    pub fn select_tasks(&self, scope: &Scope) -> Vec<TaskRow> {
        let mut rows: Vec<TaskRow> = self
            .tasks
            .values()
            .filter(|r| scope.admits(&r.user_id))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.order_index);
        rows
    }

    pub fn delete_tasks(&mut self, scope: &Scope, ids: Option<&[Uuid]>) {
        self.tasks
            .retain(|id, r| !(scope.admits(&r.user_id) && ids.is_none_or(|ids| ids.contains(id))));
    }

    pub fn upsert_highlights(&mut self, rows: Vec<HighlightRow>) {
        for row in rows {
            self.highlights.insert(row.id, row);
        }
    }

    pub fn select_highlights(&self, scope: &Scope) -> Vec<HighlightRow> {
        let mut rows: Vec<HighlightRow> = self
            .highlights
            .values()
            .filter(|r| scope.admits(&r.user_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        rows
    }

    pub fn delete_highlights(&mut self, scope: &Scope, ids: Option<&[Uuid]>) {
        self.highlights
            .retain(|id, r| !(scope.admits(&r.user_id) && ids.is_none_or(|ids| ids.contains(id))));
    }

    pub fn upsert_settings(&mut self, row: SettingsRow) {
        self.settings.insert(row.user_id.clone(), row);
    }

    pub fn select_settings(&self, user_id: &str) -> Option<SettingsRow> {
        self.settings.get(user_id).cloned()
    }

    pub fn delete_settings(&mut self, user_id: &str) {
        self.settings.remove(user_id);
    }

    fn bucket_names_table(&mut self) -> RemoteResult<&mut BTreeMap<String, BucketNamesRow>> {
        self.bucket_names
            .as_mut()
            .ok_or(RemoteError::TableMissing(BUCKET_NAMES_TABLE))
    }

    pub fn upsert_bucket_names(&mut self, row: BucketNamesRow) -> RemoteResult<()> {
        self.bucket_names_table()?.insert(row.id.clone(), row);
        Ok(())
    }

    pub fn select_bucket_names(&self, id: &str) -> RemoteResult<Option<BucketNamesRow>> {
        let table = self
            .bucket_names
            .as_ref()
            .ok_or(RemoteError::TableMissing(BUCKET_NAMES_TABLE))?;
        Ok(table.get(id).cloned())
    }

    pub fn delete_bucket_names(&mut self, id: &str) -> RemoteResult<()> {
        self.bucket_names_table()?.remove(id);
        Ok(())
    }
}
