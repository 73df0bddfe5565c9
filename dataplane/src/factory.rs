//! Entry points creating endpoints from transfer requests.

use config::shared::DataPlaneConfig;
use std::sync::Arc;
use tracing::info;

use crate::error::TransferResult;
use crate::params::{BIGQUERY_DATA_TYPE, DataAddress, Direction, RequestParams, TransferRequest};
use crate::sink::DataSink;
use crate::source::DataSource;
use crate::store::StoreConnector;

fn handles(address: &DataAddress) -> bool {
    address.address_type == BIGQUERY_DATA_TYPE
}

/// Creates [`DataSource`]s for requests reading from the store.
#[derive(Clone)]
pub struct DataSourceFactory {
    connector: Arc<dyn StoreConnector>,
    config: DataPlaneConfig,
}

impl DataSourceFactory {
    pub fn new(connector: Arc<dyn StoreConnector>, config: DataPlaneConfig) -> Self {
        Self { connector, config }
    }

    /// Returns whether the request's source address belongs to this data plane.
    pub fn can_handle(&self, request: &TransferRequest) -> bool {
        handles(&request.source)
    }

    /// Checks that a source can be built for `request`.
    pub fn validate_request(&self, request: &TransferRequest) -> TransferResult<()> {
        RequestParams::from_request(request, Direction::Source).map(|_| ())
    }

    pub fn create_source(&self, request: &TransferRequest) -> TransferResult<DataSource> {
        let params = RequestParams::from_request(request, Direction::Source)?;
        info!(request_id = %request.id, table = %params.table, "creating data source");

        Ok(DataSource::new(
            request.id.clone(),
            params,
            self.connector.clone(),
            &self.config,
        ))
    }
}

/// Creates [`DataSink`]s for requests writing to the store.
#[derive(Clone)]
pub struct DataSinkFactory {
    connector: Arc<dyn StoreConnector>,
    config: DataPlaneConfig,
}

impl DataSinkFactory {
    pub fn new(connector: Arc<dyn StoreConnector>, config: DataPlaneConfig) -> Self {
        Self { connector, config }
    }

    /// Returns whether the request's destination address belongs to this data plane.
    pub fn can_handle(&self, request: &TransferRequest) -> bool {
        handles(&request.destination)
    }

    /// Checks that a sink can be built for `request`.
    pub fn validate_request(&self, request: &TransferRequest) -> TransferResult<()> {
        RequestParams::from_request(request, Direction::Destination).map(|_| ())
    }

    pub fn create_sink(&self, request: &TransferRequest) -> TransferResult<Arc<DataSink>> {
        let params = RequestParams::from_request(request, Direction::Destination)?;
        info!(
            request_id = %request.id,
            table = %params.table,
            mode = %self.config.write_mode,
            "creating data sink"
        );

        Ok(Arc::new(DataSink::new(
            request.id.clone(),
            params,
            self.connector.clone(),
            &self.config,
        )))
    }
}
