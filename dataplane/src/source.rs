//! Read endpoint: runs a query and exposes its result as a part stream.

use config::shared::DataPlaneConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::bail;
use crate::codec::{encode_row, encode_schema};
use crate::credentials::CredentialSource;
use crate::error::{ErrorKind, TransferResult};
use crate::params::RequestParams;
use crate::query;
use crate::session::SessionCell;
use crate::store::{JobPurpose, StoreConnector, run_job};
use crate::types::{Part, RowRecord, TableSchema};

/// Reads a table from the store by running the configured query.
pub struct DataSource {
    request_id: String,
    params: RequestParams,
    session: SessionCell,
    job_poll_interval: Duration,
}

impl DataSource {
    pub fn new(
        request_id: impl Into<String>,
        params: RequestParams,
        connector: Arc<dyn StoreConnector>,
        config: &DataPlaneConfig,
    ) -> Self {
        let credentials =
            CredentialSource::from_params(&params, config.impersonation_token_lifetime());
        let session = SessionCell::new(connector, params.table.clone(), credentials);

        Self {
            request_id: request_id.into(),
            params,
            session,
            job_poll_interval: config.job_poll_interval(),
        }
    }

    pub fn params(&self) -> &RequestParams {
        &self.params
    }

    /// Returns the query with every resolvable placeholder substituted.
    ///
    /// Placeholder values come from the destination address of the request.
    pub fn resolved_query(&self) -> TransferResult<String> {
        let Some(template) = self.params.query.as_deref() else {
            bail!(
                ErrorKind::ValidationError,
                "Source address has no query",
                crate::params::QUERY
            );
        };

        let names = query::parameter_names(template);
        if !names.is_empty() {
            debug!(
                request_id = %self.request_id,
                parameters = ?names,
                "substituting query parameters"
            );
        }

        Ok(query::substitute(template, |name| {
            self.params.companion_property(name)
        }))
    }

    /// Runs the query and returns its result as parts.
    ///
    /// The first part is always the schema, followed by one part per result row in result
    /// order. Exactly one query job is submitted per call and it is never retried. If the job
    /// fails no parts are produced.
    pub async fn open_part_stream(&self) -> TransferResult<PartStream> {
        let query = self.resolved_query()?;
        let session = self.session.get().await?;

        info!(request_id = %self.request_id, table = %session.table, "running source query");
        let job_id = run_job(
            session.store.as_ref(),
            &query,
            JobPurpose::Query,
            self.job_poll_interval,
        )
        .await?;

        let result = session.store.query_results(&job_id).await?;
        info!(
            request_id = %self.request_id,
            %job_id,
            rows = result.rows.len(),
            "query executed"
        );

        Ok(PartStream::new(result.schema, result.rows))
    }
}

/// Finite sequence of parts produced from a query result.
///
/// Yields the schema part first, then one `row N` part per row. Row parts are encoded as they
/// are pulled. The stream cannot be restarted.
#[derive(Debug)]
pub struct PartStream {
    schema: Option<TableSchema>,
    column_names: Vec<String>,
    rows: std::vec::IntoIter<Vec<Option<String>>>,
    next_ordinal: u64,
}

impl PartStream {
    pub fn new(schema: TableSchema, rows: Vec<Vec<Option<String>>>) -> Self {
        let column_names = schema.column_names().map(str::to_string).collect();

        Self {
            schema: Some(schema),
            column_names,
            rows: rows.into_iter(),
            next_ordinal: 0,
        }
    }

    fn encode_next_row(&mut self, values: Vec<Option<String>>) -> TransferResult<Part> {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;

        if values.len() != self.column_names.len() {
            warn!(
                ordinal,
                values = values.len(),
                columns = self.column_names.len(),
                "result row does not match the result schema"
            );
            bail!(
                ErrorKind::InvalidRow,
                "Result row does not match the result schema",
                format!(
                    "row {ordinal} has {} values for {} columns",
                    values.len(),
                    self.column_names.len()
                )
            );
        }

        let mut row = RowRecord::new(ordinal);
        for (column, value) in self.column_names.iter().zip(values) {
            row.push(column.clone(), value);
        }

        Ok(Part::row(ordinal, encode_row(&row)?))
    }
}

impl Iterator for PartStream {
    type Item = TransferResult<Part>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(schema) = self.schema.take() {
            return Some(encode_schema(&schema).map(Part::schema));
        }

        let values = self.rows.next()?;
        Some(self.encode_next_row(values))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.rows.len() + usize::from(self.schema.is_some());
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PartStream {}
