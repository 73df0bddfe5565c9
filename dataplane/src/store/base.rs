use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::credentials::CredentialSource;
use crate::error::TransferResult;
use crate::params::TableRef;
use crate::types::{RowRecord, TableSchema};

/// Identifier of a store job.
///
/// Every job gets a fresh identifier so that a resubmission can never be mistaken for an
/// earlier job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    /// Generates a new random identifier.
    pub fn generate() -> Self {
        JobId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        JobId(value)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error reported by the store for a finished job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobError {
    pub reason: Option<String>,
    pub message: String,
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{reason}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Lifecycle state of a store job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Done { error: Option<JobError> },
}

/// Result set of a finished query job.
///
/// Values are in schema column order. `None` is a SQL `NULL`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryResult {
    pub schema: TableSchema,
    pub rows: Vec<Vec<Option<String>>>,
}

/// A problem the store reported for a single inserted row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowInsertError {
    pub reason: Option<String>,
    pub location: Option<String>,
    pub message: String,
}

impl fmt::Display for RowInsertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(reason) = &self.reason {
            write!(f, "[{reason}] ")?;
        }
        if let Some(location) = &self.location {
            write!(f, "{location}: ")?;
        }
        f.write_str(&self.message)
    }
}

/// Operations the data plane needs from an analytical table store.
///
/// Implementations must be safe to share between tasks. Calls are never retried by the
/// caller.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Submits a standard SQL query job under `job_id`.
    async fn submit_query_job(&self, job_id: &JobId, query: &str) -> TransferResult<()>;

    /// Returns the job state, or `None` if the store no longer knows the job.
    async fn get_job(&self, job_id: &JobId) -> TransferResult<Option<JobState>>;

    /// Fetches every result row of a successfully finished query job.
    async fn query_results(&self, job_id: &JobId) -> TransferResult<QueryResult>;

    /// Streams a single row into `table`.
    ///
    /// Returns the per-row problems reported by the store. Request-level failures are errors.
    async fn insert_row(
        &self,
        table: &TableRef,
        row: &RowRecord,
    ) -> TransferResult<Vec<RowInsertError>>;

    /// Returns whether `table` exists.
    async fn table_exists(&self, table: &TableRef) -> TransferResult<bool>;
}

/// Creates authenticated [`TableStore`] clients.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Connects to the store for `project` using `credentials`.
    async fn connect(
        &self,
        project: &str,
        credentials: &CredentialSource,
    ) -> TransferResult<Arc<dyn TableStore>>;
}
