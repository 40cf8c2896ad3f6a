//! Store gateway contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use focal_core::{AccessType, ResourceType, SessionResource};

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage path error: {0}")]
    PathError(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// The operations the engine requires from the durable store.
///
/// Resource rows are shared across sessions; session rows, access logs, and
/// session-resource rows are scoped to one session. `upsert_resource` uses
/// merge semantics: the access count accumulates by one per call, size and
/// type are overwritten only when a new value is provided, and the modified
/// flag is OR-ed (it never reverts to false).
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Create a session row and return its generated id.
    ///
    /// Rejects a non-positive token budget with [`StoreError::InvalidInput`].
    async fn create_session(
        &self,
        token_budget: u64,
        summary: &str,
        parent_session: Option<&str>,
    ) -> Result<String>;

    /// Create or merge a resource row; returns the resource id.
    async fn upsert_resource(
        &self,
        path: &str,
        resource_type: ResourceType,
        size_bytes: Option<u64>,
        modified: bool,
        last_accessed: DateTime<Utc>,
    ) -> Result<i64>;

    /// Look up a resource id by path without touching merge state.
    async fn find_resource(&self, path: &str) -> Result<Option<i64>>;

    /// Append an immutable access-log row.
    async fn append_access_log(
        &self,
        resource_id: i64,
        session_id: &str,
        access_type: AccessType,
        timestamp: DateTime<Utc>,
    ) -> Result<()>;

    /// Set the cached importance score for (session, resource).
    async fn set_importance(&self, session_id: &str, resource_id: i64, score: f64) -> Result<()>;

    /// Set the inclusion flag for (session, resource).
    async fn set_included(&self, session_id: &str, resource_id: i64, included: bool) -> Result<()>;

    /// All session-resource rows for a session, with denormalized resource
    /// fields, ordered by importance descending.
    async fn query_session_resources(&self, session_id: &str) -> Result<Vec<SessionResource>>;

    /// Remove a resource row (cascades to logs and session rows).
    async fn remove_resource(&self, path: &str) -> Result<()>;
}
