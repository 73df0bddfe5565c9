use async_trait::async_trait;
use config::shared::{DataPlaneConfig, WriteMode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ErrorKind, TransferResult};
use crate::session::Session;
use crate::sink::build_insert_statement;
use crate::store::{JobPurpose, run_job};
use crate::transfer_error;
use crate::types::{RowRecord, TableSchema};

/// Materializes a single row in the destination table.
#[async_trait]
pub trait WriteStrategy: Send + Sync {
    /// Returns the mode this strategy implements.
    fn mode(&self) -> WriteMode;

    /// Writes `row`, which must only contain columns of `schema`.
    async fn write_row(
        &self,
        session: &Session,
        schema: &TableSchema,
        row: &RowRecord,
    ) -> TransferResult<()>;
}

/// Returns the strategy configured for `config`.
pub fn write_strategy(config: &DataPlaneConfig) -> Arc<dyn WriteStrategy> {
    match config.write_mode {
        WriteMode::StreamingAppend => Arc::new(StreamingAppend),
        WriteMode::AccumulatedDml => Arc::new(AccumulatedDml::new(config.job_poll_interval())),
    }
}

/// Streams every row with its own insert call.
///
/// Problems the store reports for a row are logged and do not fail the transfer.
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamingAppend;

#[async_trait]
impl WriteStrategy for StreamingAppend {
    fn mode(&self) -> WriteMode {
        WriteMode::StreamingAppend
    }

    async fn write_row(
        &self,
        session: &Session,
        schema: &TableSchema,
        row: &RowRecord,
    ) -> TransferResult<()> {
        row.validate(schema)?;

        let insert_errors = session
            .store
            .insert_row(&session.table, row)
            .await
            .map_err(|err| {
                let detail = err.detail().unwrap_or(err.description()).to_string();
                transfer_error!(
                    ErrorKind::WriteExecutionFailure,
                    "Streaming insert request failed",
                    detail = detail,
                    source: err
                )
            })?;

        if insert_errors.is_empty() {
            debug!(table = %session.table, ordinal = row.ordinal(), "streaming insert ok");
        }

        for insert_error in insert_errors {
            warn!(
                table = %session.table,
                ordinal = row.ordinal(),
                error = %insert_error,
                "store rejected streamed row"
            );
        }

        Ok(())
    }
}

/// Writes every row with its own `INSERT` DML job.
///
/// A failed or vanished job aborts the transfer. Rows delivered twice are inserted twice.
#[derive(Debug, Clone)]
pub struct AccumulatedDml {
    job_poll_interval: Duration,
}

impl AccumulatedDml {
    pub fn new(job_poll_interval: Duration) -> Self {
        Self { job_poll_interval }
    }
}

#[async_trait]
impl WriteStrategy for AccumulatedDml {
    fn mode(&self) -> WriteMode {
        WriteMode::AccumulatedDml
    }

    async fn write_row(
        &self,
        session: &Session,
        schema: &TableSchema,
        row: &RowRecord,
    ) -> TransferResult<()> {
        let statement = build_insert_statement(&session.table, schema, row)?;

        let job_id = run_job(
            session.store.as_ref(),
            &statement,
            JobPurpose::Write,
            self.job_poll_interval,
        )
        .await?;
        debug!(table = %session.table, ordinal = row.ordinal(), %job_id, "dml insert ok");

        Ok(())
    }
}
