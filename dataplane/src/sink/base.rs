use config::shared::{DataPlaneConfig, WriteMode};
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::bail;
use crate::codec::{decode_row, decode_schema};
use crate::credentials::CredentialSource;
use crate::error::{ErrorKind, TransferError, TransferResult};
use crate::params::RequestParams;
use crate::session::{Session, SessionCell};
use crate::sink::{WriteStrategy, write_strategy};
use crate::store::StoreConnector;
use crate::types::{Part, PartKind, RowRecord, TableSchema};

/// Where the sink stands in the part stream.
#[derive(Debug)]
enum SinkState {
    /// No schema part seen yet. Rows are held back in arrival order.
    AwaitingSchema { buffered: Vec<RowRecord> },
    /// Schema known. Rows are written as they arrive.
    Ready(Arc<TableSchema>),
}

/// Counters of a finished transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferStats {
    pub parts: u64,
    pub rows_written: u64,
}

/// Writes a table arriving as parts in any order.
///
/// Row parts received before the schema part are buffered and flushed once the schema arrives.
/// [`DataSink::transfer_parts`] can be called concurrently from several tasks.
pub struct DataSink {
    request_id: String,
    session: SessionCell,
    strategy: Arc<dyn WriteStrategy>,
    state: Mutex<SinkState>,
    rows_written: AtomicU64,
}

impl DataSink {
    pub fn new(
        request_id: impl Into<String>,
        params: RequestParams,
        connector: Arc<dyn StoreConnector>,
        config: &DataPlaneConfig,
    ) -> Self {
        Self::with_strategy(request_id, params, connector, config, write_strategy(config))
    }

    /// Creates a sink writing through `strategy` instead of the configured one.
    pub fn with_strategy(
        request_id: impl Into<String>,
        params: RequestParams,
        connector: Arc<dyn StoreConnector>,
        config: &DataPlaneConfig,
        strategy: Arc<dyn WriteStrategy>,
    ) -> Self {
        let credentials =
            CredentialSource::from_params(&params, config.impersonation_token_lifetime());
        let session = SessionCell::new(connector, params.table, credentials);

        Self {
            request_id: request_id.into(),
            session,
            strategy,
            state: Mutex::new(SinkState::AwaitingSchema {
                buffered: Vec::new(),
            }),
            rows_written: AtomicU64::new(0),
        }
    }

    pub fn write_mode(&self) -> WriteMode {
        self.strategy.mode()
    }

    /// Returns the schema once the schema part has been received.
    pub async fn schema(&self) -> Option<Arc<TableSchema>> {
        match &*self.state.lock().await {
            SinkState::Ready(schema) => Some(schema.clone()),
            SinkState::AwaitingSchema { .. } => None,
        }
    }

    /// Returns the number of rows waiting for the schema part.
    pub async fn buffered_rows(&self) -> usize {
        match &*self.state.lock().await {
            SinkState::AwaitingSchema { buffered } => buffered.len(),
            SinkState::Ready(_) => 0,
        }
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written.load(Ordering::Relaxed)
    }

    /// Processes a batch of parts in order.
    ///
    /// The first failing part aborts the batch and its error is returned.
    pub async fn transfer_parts(&self, parts: Vec<Part>) -> TransferResult<()> {
        let session = self.session().await?;

        for part in parts {
            let name = part.name().to_string();
            let result = match part.kind() {
                PartKind::Schema => self.accept_schema(session, part).await,
                PartKind::Row => self.accept_row(session, part).await,
            };

            if let Err(err) = result {
                error!(request_id = %self.request_id, part = %name, error = %err, "failed to transfer part");
                return Err(err);
            }
        }

        Ok(())
    }

    /// Drains `parts` and transfers them in chunks of `partition_size` on concurrent tasks.
    ///
    /// Failures of all chunks are aggregated into one error. An error from the part stream
    /// stops reading, lets running chunks finish and is returned.
    pub async fn transfer<I>(
        self: Arc<Self>,
        parts: I,
        partition_size: usize,
    ) -> TransferResult<TransferStats>
    where
        I: IntoIterator<Item = TransferResult<Part>>,
    {
        let partition_size = partition_size.max(1);
        let mut tasks = JoinSet::new();
        let mut chunk = Vec::with_capacity(partition_size);
        let mut part_count = 0u64;
        let mut errors: Vec<TransferError> = Vec::new();

        for part in parts {
            match part {
                Ok(part) => {
                    part_count += 1;
                    chunk.push(part);
                }
                Err(err) => {
                    errors.push(err);
                    break;
                }
            }

            if chunk.len() == partition_size {
                let sink = self.clone();
                let parts = mem::replace(&mut chunk, Vec::with_capacity(partition_size));
                tasks.spawn(async move { sink.transfer_parts(parts).await });
            }
        }

        if errors.is_empty() && !chunk.is_empty() {
            let sink = self.clone();
            tasks.spawn(async move { sink.transfer_parts(chunk).await });
        }

        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => errors.push(err),
                Err(err) => errors.push(err.into()),
            }
        }

        if errors.is_empty() {
            if let Err(err) = self.finish().await {
                errors.push(err);
            }
        }

        if !errors.is_empty() {
            return Err(errors.into());
        }

        let stats = TransferStats {
            parts: part_count,
            rows_written: self.rows_written(),
        };
        info!(
            request_id = %self.request_id,
            parts = stats.parts,
            rows = stats.rows_written,
            mode = %self.write_mode(),
            "transfer completed"
        );

        Ok(stats)
    }

    /// Checks that no rows are left waiting for a schema part.
    pub async fn finish(&self) -> TransferResult<()> {
        let buffered = match &*self.state.lock().await {
            SinkState::AwaitingSchema { buffered } => buffered.len(),
            SinkState::Ready(_) => 0,
        };

        if buffered > 0 {
            bail!(
                ErrorKind::MissingSchema,
                "Transfer ended before the schema part arrived",
                format!("{buffered} buffered rows were not written")
            );
        }

        Ok(())
    }

    /// Returns the session, probing the target table when this call created it.
    async fn session(&self) -> TransferResult<&Session> {
        let (session, created) = self.session.get_or_init().await?;
        if created {
            probe_table(session).await;
        }

        Ok(session)
    }

    async fn accept_schema(&self, session: &Session, part: Part) -> TransferResult<()> {
        let schema = Arc::new(decode_schema(&part.into_content())?);

        let buffered = {
            let mut state = self.state.lock().await;
            match &mut *state {
                SinkState::Ready(_) => {
                    bail!(
                        ErrorKind::DuplicateSchema,
                        "Schema part received more than once"
                    );
                }
                SinkState::AwaitingSchema { buffered } => {
                    let buffered = mem::take(buffered);
                    *state = SinkState::Ready(schema.clone());
                    buffered
                }
            }
        };

        info!(
            request_id = %self.request_id,
            columns = schema.len(),
            buffered = buffered.len(),
            "schema received"
        );

        for row in &buffered {
            self.write_row(session, &schema, row).await?;
        }

        Ok(())
    }

    async fn accept_row(&self, session: &Session, part: Part) -> TransferResult<()> {
        let row = decode_row(&part.into_content())?;

        let schema = {
            let mut state = self.state.lock().await;
            match &mut *state {
                SinkState::AwaitingSchema { buffered } => {
                    debug!(ordinal = row.ordinal(), "buffering row until schema arrives");
                    buffered.push(row);
                    return Ok(());
                }
                SinkState::Ready(schema) => schema.clone(),
            }
        };

        self.write_row(session, &schema, &row).await
    }

    async fn write_row(
        &self,
        session: &Session,
        schema: &TableSchema,
        row: &RowRecord,
    ) -> TransferResult<()> {
        self.strategy.write_row(session, schema, row).await?;
        self.rows_written.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }
}

/// Logs whether the target table exists. Never fails.
async fn probe_table(session: &Session) {
    match session.store.table_exists(&session.table).await {
        Ok(true) => info!(table = %session.table, "target table exists"),
        Ok(false) => warn!(table = %session.table, "target table does not exist"),
        Err(err) => warn!(table = %session.table, error = %err, "could not check target table"),
    }
}
