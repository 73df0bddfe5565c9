#![allow(dead_code)]

use config::shared::{DataPlaneConfig, WriteMode};
use dataplane::codec::{encode_row, encode_schema};
use dataplane::factory::{DataSinkFactory, DataSourceFactory};
use dataplane::params::{
    BIGQUERY_DATA_TYPE, DATASET, DataAddress, PROJECT, QUERY, TABLE, TransferRequest,
};
use dataplane::test_utils::connector::CountingConnector;
use dataplane::test_utils::memory_store::MemoryStore;
use dataplane::test_utils::schema::users_schema;
use dataplane::types::{Part, RowRecord};
use std::sync::Arc;

pub fn test_config(write_mode: WriteMode) -> DataPlaneConfig {
    DataPlaneConfig {
        write_mode,
        job_poll_interval_ms: 1,
        ..DataPlaneConfig::default()
    }
}

/// Request copying `src-project.source.users` into `dst-project.analytics.users_copy`.
pub fn transfer_request(query: &str) -> TransferRequest {
    TransferRequest {
        id: "transfer-1".to_string(),
        source: DataAddress::new(BIGQUERY_DATA_TYPE)
            .with_property(PROJECT, "src-project")
            .with_property(DATASET, "source")
            .with_property(TABLE, "users")
            .with_property(QUERY, query),
        destination: DataAddress::new(BIGQUERY_DATA_TYPE)
            .with_property(PROJECT, "dst-project")
            .with_property(DATASET, "analytics")
            .with_property(TABLE, "users_copy")
            .with_property("min_id", "10"),
    }
}

pub struct Harness {
    pub connector: CountingConnector,
    pub sources: DataSourceFactory,
    pub sinks: DataSinkFactory,
}

impl Harness {
    pub fn new(write_mode: WriteMode) -> Self {
        let connector = CountingConnector::new(MemoryStore::new());
        let config = test_config(write_mode);

        Self {
            sources: DataSourceFactory::new(Arc::new(connector.clone()), config.clone()),
            sinks: DataSinkFactory::new(Arc::new(connector.clone()), config),
            connector,
        }
    }

    pub fn store(&self) -> &MemoryStore {
        self.connector.store()
    }
}

pub fn schema_part() -> Part {
    Part::schema(encode_schema(&users_schema()).unwrap())
}

pub fn row_part(ordinal: u64, id: &str, name: &str) -> Part {
    let row = RowRecord::new(ordinal)
        .with_value("id", Some(id.to_string()))
        .with_value("name", Some(name.to_string()));

    Part::row(ordinal, encode_row(&row).unwrap())
}

/// Returns the `(id, name)` pairs of the streamed rows sorted by id.
pub async fn streamed_users(store: &MemoryStore) -> Vec<(String, String)> {
    let mut users: Vec<(String, String)> = store
        .inserted_rows()
        .await
        .into_iter()
        .map(|(_, row)| {
            (
                row.value("id").flatten().unwrap_or_default().to_string(),
                row.value("name").flatten().unwrap_or_default().to_string(),
            )
        })
        .collect();
    users.sort();
    users
}
