use async_trait::async_trait;
use dataplane::bail;
use dataplane::error::{ErrorKind, TransferResult};
use dataplane::params::TableRef;
use dataplane::store::{JobError, JobId, JobState, QueryResult, RowInsertError, TableStore};
use dataplane::types::{ColumnSchema, ColumnType, RowRecord, TableSchema};
use gcp_bigquery_client::Client;
use gcp_bigquery_client::model::error_proto::ErrorProto;
use gcp_bigquery_client::model::get_query_results_parameters::GetQueryResultsParameters;
use gcp_bigquery_client::model::job::Job;
use gcp_bigquery_client::model::job_configuration::JobConfiguration;
use gcp_bigquery_client::model::job_configuration_query::JobConfigurationQuery;
use gcp_bigquery_client::model::job_reference::JobReference;
use gcp_bigquery_client::model::job_status::JobStatus;
use gcp_bigquery_client::model::table_data_insert_all_request::TableDataInsertAllRequest;
use gcp_bigquery_client::model::table_field_schema::TableFieldSchema;
use gcp_bigquery_client::model::table_row::TableRow;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{bq_error_to_transfer_error, is_not_found};

/// Field mode of repeated columns, which have no flat representation.
const REPEATED_MODE: &str = "REPEATED";

/// A [`TableStore`] backed by the BigQuery REST API.
///
/// Jobs and streaming inserts are billed to `project_id`. Job locations reported on
/// submission are remembered so that later lookups hit the right region.
pub struct BigQueryStore {
    project_id: String,
    client: Client,
    job_locations: Mutex<HashMap<JobId, String>>,
}

impl BigQueryStore {
    pub fn new(project_id: impl Into<String>, client: Client) -> Self {
        Self {
            project_id: project_id.into(),
            client,
            job_locations: Mutex::new(HashMap::new()),
        }
    }

    async fn job_location(&self, job_id: &JobId) -> Option<String> {
        self.job_locations.lock().await.get(job_id).cloned()
    }
}

impl fmt::Debug for BigQueryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigQueryStore")
            .field("project_id", &self.project_id)
            .finish()
    }
}

#[async_trait]
impl TableStore for BigQueryStore {
    async fn submit_query_job(&self, job_id: &JobId, query: &str) -> TransferResult<()> {
        let job = query_job(&self.project_id, job_id, query);

        let submitted = self
            .client
            .job()
            .insert(&self.project_id, job)
            .await
            .map_err(|err| bq_error_to_transfer_error(err, ErrorKind::QueryExecutionFailure))?;

        let location = submitted
            .job_reference
            .and_then(|reference| reference.location);
        debug!(%job_id, location = ?location, "submitted bigquery job");
        if let Some(location) = location {
            self.job_locations
                .lock()
                .await
                .insert(job_id.clone(), location);
        }

        Ok(())
    }

    async fn get_job(&self, job_id: &JobId) -> TransferResult<Option<JobState>> {
        let location = self.job_location(job_id).await;
        let result = self
            .client
            .job()
            .get_job(&self.project_id, job_id.as_str(), location.as_deref())
            .await;

        match result {
            Ok(job) => Ok(Some(job_state(job.status))),
            Err(err) if is_not_found(&err) => {
                self.job_locations.lock().await.remove(job_id);
                Ok(None)
            }
            Err(err) => Err(bq_error_to_transfer_error(
                err,
                ErrorKind::QueryExecutionFailure,
            )),
        }
    }

    async fn query_results(&self, job_id: &JobId) -> TransferResult<QueryResult> {
        let location = self.job_location(job_id).await;
        let mut schema = None;
        let mut rows = Vec::new();
        let mut page_token = None;

        loop {
            let parameters = GetQueryResultsParameters {
                location: location.clone(),
                page_token: page_token.take(),
                ..Default::default()
            };
            let page = self
                .client
                .job()
                .get_query_results(&self.project_id, job_id.as_str(), parameters)
                .await
                .map_err(|err| bq_error_to_transfer_error(err, ErrorKind::QueryExecutionFailure))?;

            if schema.is_none() {
                let fields = page
                    .schema
                    .and_then(|schema| schema.fields)
                    .unwrap_or_default();
                schema = Some(convert_schema(&fields)?);
            }

            for row in page.rows.unwrap_or_default() {
                rows.push(convert_row(row));
            }

            match page.page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        self.job_locations.lock().await.remove(job_id);
        info!(%job_id, rows = rows.len(), "fetched bigquery query results");

        Ok(QueryResult {
            schema: schema.unwrap_or_default(),
            rows,
        })
    }

    async fn insert_row(
        &self,
        table: &TableRef,
        row: &RowRecord,
    ) -> TransferResult<Vec<RowInsertError>> {
        let mut request = TableDataInsertAllRequest::new();
        request
            .add_row(None, row_object(row))
            .map_err(|err| bq_error_to_transfer_error(err, ErrorKind::WriteExecutionFailure))?;

        let response = self
            .client
            .tabledata()
            .insert_all(&table.project, &table.dataset, &table.table, request)
            .await
            .map_err(|err| bq_error_to_transfer_error(err, ErrorKind::WriteExecutionFailure))?;

        let errors = response
            .insert_errors
            .unwrap_or_default()
            .into_iter()
            .flat_map(|insert_errors| insert_errors.errors.unwrap_or_default())
            .map(row_insert_error)
            .collect();

        Ok(errors)
    }

    async fn table_exists(&self, table: &TableRef) -> TransferResult<bool> {
        let result = self
            .client
            .table()
            .get(&table.project, &table.dataset, &table.table, None)
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) if is_not_found(&err) => Ok(false),
            Err(err) => Err(bq_error_to_transfer_error(err, ErrorKind::StoreIoError)),
        }
    }
}

/// Builds a standard SQL query job with a caller-chosen id.
fn query_job(project_id: &str, job_id: &JobId, query: &str) -> Job {
    Job {
        configuration: Some(JobConfiguration {
            query: Some(JobConfigurationQuery {
                query: query.to_string(),
                use_legacy_sql: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        }),
        job_reference: Some(JobReference {
            job_id: Some(job_id.to_string()),
            project_id: Some(project_id.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn job_state(status: Option<JobStatus>) -> JobState {
    let Some(status) = status else {
        return JobState::Pending;
    };

    match status.state.as_deref() {
        Some("DONE") => JobState::Done {
            error: status.error_result.map(job_error),
        },
        Some("RUNNING") => JobState::Running,
        _ => JobState::Pending,
    }
}

fn job_error(error: ErrorProto) -> JobError {
    JobError {
        reason: error.reason,
        message: error.message.unwrap_or_default(),
    }
}

fn row_insert_error(error: ErrorProto) -> RowInsertError {
    RowInsertError {
        reason: error.reason,
        location: error.location,
        message: error.message.unwrap_or_default(),
    }
}

/// Converts a result schema into a flat [`TableSchema`].
fn convert_schema(fields: &[TableFieldSchema]) -> TransferResult<TableSchema> {
    let columns = fields
        .iter()
        .map(convert_field)
        .collect::<TransferResult<Vec<_>>>()?;

    TableSchema::new(columns)
}

fn convert_field(field: &TableFieldSchema) -> TransferResult<ColumnSchema> {
    if field.mode.as_deref() == Some(REPEATED_MODE) {
        bail!(
            ErrorKind::UnsupportedColumnType,
            "Repeated columns are not supported by the part-stream protocol",
            format!("column `{}`", field.name)
        );
    }

    // The field type serializes to its REST name, e.g. `"INTEGER"`.
    let type_name = match serde_json::to_value(&field.r#type)? {
        Value::String(type_name) => type_name,
        other => other.to_string(),
    };
    let column_type = ColumnType::from_store_type(&type_name)?;

    Ok(ColumnSchema::new(field.name.clone(), column_type))
}

fn convert_row(row: TableRow) -> Vec<Option<String>> {
    row.columns
        .unwrap_or_default()
        .into_iter()
        .map(|cell| cell.value.and_then(cell_value))
        .collect()
}

fn cell_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(value) => Some(value),
        other => Some(other.to_string()),
    }
}

/// Renders a row as the JSON object expected by streaming inserts.
fn row_object(row: &RowRecord) -> Map<String, Value> {
    row.values()
        .iter()
        .map(|(column, value)| {
            let value = match value {
                Some(value) => Value::String(value.clone()),
                None => Value::Null,
            };
            (column.clone(), value)
        })
        .collect()
}
