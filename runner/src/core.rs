use anyhow::{Context, bail};
use config::shared::DataPlaneConfig;
use dataplane::factory::{DataSinkFactory, DataSourceFactory};
use dataplane::params::TransferRequest;
use dataplane::sink::TransferStats;
use dataplane::store::StoreConnector;
use dataplane_bigquery::BigQueryConnector;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::RunnerConfig;

/// Reads a JSON transfer request from `path`.
pub async fn read_transfer_request(path: &Path) -> anyhow::Result<TransferRequest> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read transfer request `{}`", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("invalid transfer request `{}`", path.display()))
}

/// Runs the transfer described by the request file at `request_path` against BigQuery.
pub async fn start_runner_with_config(
    config: RunnerConfig,
    request_path: &Path,
) -> anyhow::Result<TransferStats> {
    let request = read_transfer_request(request_path).await?;

    run_transfer(
        Arc::new(BigQueryConnector::new()),
        config.dataplane,
        &request,
    )
    .await
}

/// Streams the source table of `request` into its destination table.
pub async fn run_transfer(
    connector: Arc<dyn StoreConnector>,
    config: DataPlaneConfig,
    request: &TransferRequest,
) -> anyhow::Result<TransferStats> {
    let partition_size = config.partition_size;
    let sources = DataSourceFactory::new(connector.clone(), config.clone());
    let sinks = DataSinkFactory::new(connector, config);

    if !sources.can_handle(request) {
        bail!(
            "unsupported source address type `{}`",
            request.source.address_type
        );
    }
    if !sinks.can_handle(request) {
        bail!(
            "unsupported destination address type `{}`",
            request.destination.address_type
        );
    }

    sources.validate_request(request)?;
    sinks.validate_request(request)?;

    let source = sources.create_source(request)?;
    let sink = sinks.create_sink(request)?;
    info!(request_id = %request.id, write_mode = %sink.write_mode(), "starting transfer");

    let parts = source.open_part_stream().await?;
    let stats = sink.transfer(parts, partition_size).await?;
    info!(
        request_id = %request.id,
        parts = stats.parts,
        rows_written = stats.rows_written,
        "transfer finished"
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::shared::WriteMode;
    use dataplane::params::{BIGQUERY_DATA_TYPE, DATASET, DataAddress, PROJECT, QUERY, TABLE};
    use dataplane::test_utils::connector::CountingConnector;
    use dataplane::test_utils::memory_store::MemoryStore;
    use dataplane::test_utils::schema::users_result;
    use std::io::Write;

    fn request(destination_type: &str) -> TransferRequest {
        TransferRequest {
            id: "transfer-1".to_string(),
            source: DataAddress::new(BIGQUERY_DATA_TYPE)
                .with_property(PROJECT, "src")
                .with_property(DATASET, "raw")
                .with_property(TABLE, "users")
                .with_property(QUERY, "SELECT id, name FROM raw.users"),
            destination: DataAddress::new(destination_type)
                .with_property(PROJECT, "dst")
                .with_property(DATASET, "analytics")
                .with_property(TABLE, "users"),
        }
    }

    fn test_config() -> DataPlaneConfig {
        DataPlaneConfig {
            write_mode: WriteMode::StreamingAppend,
            job_poll_interval_ms: 1,
            partition_size: 2,
            ..DataPlaneConfig::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transfer_copies_every_row() {
        let connector = CountingConnector::new(MemoryStore::new());
        connector
            .store()
            .set_query_result(users_result(&[("1", "ada"), ("2", "grace"), ("3", "alan")]))
            .await;

        let stats = run_transfer(
            Arc::new(connector.clone()),
            test_config(),
            &request(BIGQUERY_DATA_TYPE),
        )
        .await
        .unwrap();

        assert_eq!(stats.parts, 4);
        assert_eq!(stats.rows_written, 3);
        assert_eq!(connector.store().inserted_rows().await.len(), 3);
    }

    #[tokio::test]
    async fn unsupported_destination_is_rejected() {
        let connector = CountingConnector::new(MemoryStore::new());

        let err = run_transfer(Arc::new(connector.clone()), test_config(), &request("Blob"))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("`Blob`"));
        assert_eq!(connector.connects(), 0);
    }

    #[tokio::test]
    async fn request_file_is_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            serde_json::to_string(&request(BIGQUERY_DATA_TYPE))
                .unwrap()
                .as_bytes(),
        )
        .unwrap();

        let parsed = read_transfer_request(file.path()).await.unwrap();

        assert_eq!(parsed, request(BIGQUERY_DATA_TYPE));
    }

    #[tokio::test]
    async fn malformed_request_file_names_the_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{\"id\": 1}").unwrap();

        let err = read_transfer_request(file.path()).await.unwrap_err();

        assert!(err.to_string().contains("invalid transfer request"));
    }
}
