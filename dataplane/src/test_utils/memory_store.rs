use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{ErrorKind, TransferResult};
use crate::params::TableRef;
use crate::store::{JobError, JobId, JobState, QueryResult, RowInsertError, TableStore};
use crate::types::RowRecord;
use crate::{bail, transfer_error};

#[derive(Debug)]
struct RecordedJob {
    query: String,
    remaining_polls: u32,
    outcome: JobOutcome,
}

#[derive(Debug, Clone)]
enum JobOutcome {
    Succeeded,
    Failed(JobError),
    Vanished,
}

#[derive(Debug, Default)]
struct Inner {
    query_result: QueryResult,
    jobs: HashMap<JobId, RecordedJob>,
    submitted_queries: Vec<String>,
    inserted_rows: Vec<(TableRef, RowRecord)>,
    failing_jobs: Vec<(String, JobError)>,
    refused_submissions: Vec<(String, String)>,
    job_lookup_failure: Option<String>,
    vanishing_jobs: Vec<String>,
    rejected_values: Vec<(String, String, String)>,
    insert_request_failure: Option<String>,
    pending_polls: u32,
    table_exists: bool,
    table_probe_failure: Option<String>,
    table_probes: u64,
}

/// In-memory [`TableStore`] for tests.
///
/// Every submitted job succeeds unless a failure rule matches its query text. Query jobs
/// return the configured [`QueryResult`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the result returned for query jobs.
    pub async fn set_query_result(&self, result: QueryResult) {
        self.inner.lock().await.query_result = result;
    }

    /// Makes jobs whose query contains `pattern` finish with `message`.
    pub async fn fail_jobs_containing(&self, pattern: &str, message: &str) {
        self.inner.lock().await.failing_jobs.push((
            pattern.to_string(),
            JobError {
                reason: Some("invalidQuery".to_string()),
                message: message.to_string(),
            },
        ));
    }

    /// Rejects the submission of jobs whose query contains `pattern`.
    ///
    /// The store answers the way the service answers a refused job insert, with a query
    /// execution failure carrying `message`.
    pub async fn refuse_submissions_containing(&self, pattern: &str, message: &str) {
        self.inner
            .lock()
            .await
            .refused_submissions
            .push((pattern.to_string(), message.to_string()));
    }

    /// Fails every job status lookup with `message`.
    pub async fn fail_job_lookups(&self, message: &str) {
        self.inner.lock().await.job_lookup_failure = Some(message.to_string());
    }

    /// Makes jobs whose query contains `pattern` disappear after submission.
    pub async fn vanish_jobs_containing(&self, pattern: &str) {
        self.inner
            .lock()
            .await
            .vanishing_jobs
            .push(pattern.to_string());
    }

    /// Reports a per-row error for streamed rows where `column` equals `value`.
    pub async fn reject_rows_with(&self, column: &str, value: &str, message: &str) {
        self.inner.lock().await.rejected_values.push((
            column.to_string(),
            value.to_string(),
            message.to_string(),
        ));
    }

    /// Fails every streaming insert request.
    pub async fn fail_insert_requests(&self, message: &str) {
        self.inner.lock().await.insert_request_failure = Some(message.to_string());
    }

    /// Number of polls a job reports as running before it finishes.
    pub async fn set_pending_polls(&self, polls: u32) {
        self.inner.lock().await.pending_polls = polls;
    }

    pub async fn set_table_exists(&self, exists: bool) {
        self.inner.lock().await.table_exists = exists;
    }

    pub async fn fail_table_probe(&self, message: &str) {
        self.inner.lock().await.table_probe_failure = Some(message.to_string());
    }

    /// Returns every submitted query in submission order.
    pub async fn submitted_queries(&self) -> Vec<String> {
        self.inner.lock().await.submitted_queries.clone()
    }

    /// Returns the submitted `INSERT` statements in submission order.
    pub async fn dml_statements(&self) -> Vec<String> {
        self.inner
            .lock()
            .await
            .submitted_queries
            .iter()
            .filter(|query| query.starts_with("INSERT"))
            .cloned()
            .collect()
    }

    /// Returns the rows accepted by streaming inserts.
    pub async fn inserted_rows(&self) -> Vec<(TableRef, RowRecord)> {
        self.inner.lock().await.inserted_rows.clone()
    }

    pub async fn table_probes(&self) -> u64 {
        self.inner.lock().await.table_probes
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn submit_query_job(&self, job_id: &JobId, query: &str) -> TransferResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.jobs.contains_key(job_id) {
            bail!(
                ErrorKind::QueryExecutionFailure,
                "Job already exists",
                job_id.to_string()
            );
        }

        if let Some((_, message)) = inner
            .refused_submissions
            .iter()
            .find(|(pattern, _)| query.contains(pattern.as_str()))
        {
            bail!(
                ErrorKind::QueryExecutionFailure,
                "Job submission rejected",
                message.clone()
            );
        }

        let outcome = if inner
            .vanishing_jobs
            .iter()
            .any(|pattern| query.contains(pattern.as_str()))
        {
            JobOutcome::Vanished
        } else if let Some((_, error)) = inner
            .failing_jobs
            .iter()
            .find(|(pattern, _)| query.contains(pattern.as_str()))
        {
            JobOutcome::Failed(error.clone())
        } else {
            JobOutcome::Succeeded
        };

        let remaining_polls = inner.pending_polls;
        inner.submitted_queries.push(query.to_string());
        inner.jobs.insert(
            job_id.clone(),
            RecordedJob {
                query: query.to_string(),
                remaining_polls,
                outcome,
            },
        );
        info!(%job_id, "memory store accepted job");

        Ok(())
    }

    async fn get_job(&self, job_id: &JobId) -> TransferResult<Option<JobState>> {
        let mut inner = self.inner.lock().await;
        if let Some(message) = &inner.job_lookup_failure {
            bail!(
                ErrorKind::QueryExecutionFailure,
                "Job lookup failed",
                message.clone()
            );
        }

        let Some(job) = inner.jobs.get_mut(job_id) else {
            return Ok(None);
        };

        if job.remaining_polls > 0 {
            job.remaining_polls -= 1;
            return Ok(Some(JobState::Running));
        }

        let state = match &job.outcome {
            JobOutcome::Succeeded => Some(JobState::Done { error: None }),
            JobOutcome::Failed(error) => Some(JobState::Done {
                error: Some(error.clone()),
            }),
            JobOutcome::Vanished => None,
        };

        Ok(state)
    }

    async fn query_results(&self, job_id: &JobId) -> TransferResult<QueryResult> {
        let inner = self.inner.lock().await;
        match inner.jobs.get(job_id) {
            Some(job) if matches!(job.outcome, JobOutcome::Succeeded) => {
                info!(%job_id, query = %job.query, "memory store serving query result");
                Ok(inner.query_result.clone())
            }
            _ => Err(transfer_error!(
                ErrorKind::QueryExecutionFailure,
                "No results for job",
                job_id.to_string()
            )),
        }
    }

    async fn insert_row(
        &self,
        table: &TableRef,
        row: &RowRecord,
    ) -> TransferResult<Vec<RowInsertError>> {
        let mut inner = self.inner.lock().await;
        if let Some(message) = &inner.insert_request_failure {
            bail!(
                ErrorKind::StoreIoError,
                "Insert request failed",
                message.clone()
            );
        }

        let errors: Vec<RowInsertError> = inner
            .rejected_values
            .iter()
            .filter(|(column, value, _)| row.value(column) == Some(Some(value.as_str())))
            .map(|(column, _, message)| RowInsertError {
                reason: Some("invalid".to_string()),
                location: Some(column.clone()),
                message: message.clone(),
            })
            .collect();

        if errors.is_empty() {
            inner.inserted_rows.push((table.clone(), row.clone()));
        }

        Ok(errors)
    }

    async fn table_exists(&self, _table: &TableRef) -> TransferResult<bool> {
        let mut inner = self.inner.lock().await;
        inner.table_probes += 1;
        if let Some(message) = &inner.table_probe_failure {
            bail!(
                ErrorKind::StoreIoError,
                "Table lookup failed",
                message.clone()
            );
        }

        Ok(inner.table_exists)
    }
}
