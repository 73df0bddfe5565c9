use std::time::Duration;
use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, TransferError, TransferResult};
use crate::store::{JobId, JobState, TableStore};

/// Why a job is being awaited. Selects the error kind of a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPurpose {
    Query,
    Write,
}

impl JobPurpose {
    fn error_kind(self) -> ErrorKind {
        match self {
            JobPurpose::Query => ErrorKind::QueryExecutionFailure,
            JobPurpose::Write => ErrorKind::WriteExecutionFailure,
        }
    }

    /// Re-tags a job error reported by the store with the kind of this purpose.
    ///
    /// Authentication and transport failures keep their kind.
    fn classify(self, err: TransferError) -> TransferError {
        match err.kind() {
            ErrorKind::QueryExecutionFailure | ErrorKind::WriteExecutionFailure => {
                err.with_kind(self.error_kind())
            }
            _ => err,
        }
    }
}

/// Submits `query` as a new job and waits until it finishes successfully.
///
/// Returns the job identifier on success.
pub async fn run_job(
    store: &dyn TableStore,
    query: &str,
    purpose: JobPurpose,
    poll_interval: Duration,
) -> TransferResult<JobId> {
    let job_id = JobId::generate();
    store
        .submit_query_job(&job_id, query)
        .await
        .map_err(|err| purpose.classify(err))?;
    debug!(%job_id, ?purpose, "submitted job");

    wait_for_job(store, &job_id, purpose, poll_interval).await?;

    Ok(job_id)
}

/// Polls the job every `poll_interval` until it reaches a terminal state.
///
/// Any job failure, including a failed status lookup, takes the kind of `purpose` and carries
/// the store's message as detail. No timeout is applied.
pub async fn wait_for_job(
    store: &dyn TableStore,
    job_id: &JobId,
    purpose: JobPurpose,
    poll_interval: Duration,
) -> TransferResult<()> {
    loop {
        let state = store
            .get_job(job_id)
            .await
            .map_err(|err| purpose.classify(err))?;

        match state {
            None => bail!(
                purpose.error_kind(),
                "Job no longer exists",
                format!("job `{job_id}`")
            ),
            Some(JobState::Done { error: Some(error) }) => {
                bail!(purpose.error_kind(), "Job finished with an error", error)
            }
            Some(JobState::Done { error: None }) => {
                debug!(%job_id, "job completed");
                return Ok(());
            }
            Some(JobState::Pending) | Some(JobState::Running) => {
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}
