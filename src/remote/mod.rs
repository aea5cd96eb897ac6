//! Remote collection contract consumed by the sync engine.
//!
//! Tables are keyed by record id and carry an owning identity. Reads, writes
//! and deletes are scoped to one owner, except where the caller asks for the
//! shared scope.

mod fs;
mod memory;
pub mod rows;
mod tables;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use fs::FsRemote;
pub use memory::{MemoryRemote, RemoteOp};
pub use rows::{BucketNamesRow, HighlightRow, SettingsRow, TaskRow, SHARED_BUCKET_NAMES_ROW_ID};
pub use tables::Tables;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote table {0} does not exist")]
    TableMissing(&'static str),
    #[error("remote session unavailable: {0}")]
    Auth(String),
    #[error("remote rejected request: {0}")]
    Rejected(String),
    #[error("remote io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("remote payload error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RemoteError {
    pub fn is_table_missing(&self) -> bool {
        matches!(self, RemoteError::TableMissing(_))
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Which rows an operation may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Owner(String),
    Everyone,
}

impl Scope {
    pub fn admits(&self, user_id: &str) -> bool {
        match self {
            Scope::Owner(owner) => owner == user_id,
            Scope::Everyone => true,
        }
    }
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Identity of the existing session, if any.
    async fn current_user(&self) -> RemoteResult<Option<String>>;
    /// Create a fresh anonymous identity and make it the session's.
    async fn sign_in_anonymously(&self) -> RemoteResult<String>;

    /// Insert-or-replace by id.
    async fn upsert_tasks(&self, rows: Vec<TaskRow>) -> RemoteResult<()>;
    /// Rows in scope ordered by `order_index` ascending.
    async fn select_tasks(&self, scope: Scope) -> RemoteResult<Vec<TaskRow>>;
    /// Delete the given ids in scope, or every row in scope when `ids` is `None`.
    async fn delete_tasks(&self, scope: Scope, ids: Option<Vec<Uuid>>) -> RemoteResult<()>;

    async fn upsert_highlights(&self, rows: Vec<HighlightRow>) -> RemoteResult<()>;
    /// Rows in scope ordered by `date` descending.
    async fn select_highlights(&self, scope: Scope) -> RemoteResult<Vec<HighlightRow>>;
    async fn delete_highlights(&self, scope: Scope, ids: Option<Vec<Uuid>>) -> RemoteResult<()>;

    async fn upsert_settings(&self, row: SettingsRow) -> RemoteResult<()>;
    async fn select_settings(&self, user_id: &str) -> RemoteResult<Option<SettingsRow>>;
    async fn delete_settings(&self, user_id: &str) -> RemoteResult<()>;

    // Optional table: may answer TableMissing.
    async fn upsert_bucket_names(&self, row: BucketNamesRow) -> RemoteResult<()>;
    async fn select_bucket_names(&self, id: &str) -> RemoteResult<Option<BucketNamesRow>>;
    async fn delete_bucket_names(&self, id: &str) -> RemoteResult<()>;
}
