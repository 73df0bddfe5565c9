//! Transfer requests and the per-direction parameters derived from them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::bail;
use crate::error::{ErrorKind, TransferResult};

/// Address type handled by this data plane.
pub const BIGQUERY_DATA_TYPE: &str = "BigQueryData";

/// Google Cloud project owning the table and running the jobs.
pub const PROJECT: &str = "project";
pub const DATASET: &str = "dataset";
pub const TABLE: &str = "table";
/// Query template run by the source.
pub const QUERY: &str = "query";
/// Path to a service-account key file.
pub const SERVICE_ACCOUNT_FILE: &str = "serviceAccountFile";
/// Service account to impersonate.
pub const SERVICE_ACCOUNT_NAME: &str = "serviceAccountName";

/// Location of data on one side of a transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAddress {
    #[serde(rename = "type")]
    pub address_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl DataAddress {
    pub fn new(address_type: impl Into<String>) -> Self {
        Self {
            address_type: address_type.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Sets a property, returning the address for chaining.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns the property value, treating empty strings as unset.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// A request to move data from a source address to a destination address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub id: String,
    pub source: DataAddress,
    pub destination: DataAddress,
}

/// Side of a transfer the parameters are built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Source,
    Destination,
}

/// Table coordinates in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// Parameters of one endpoint, extracted from its address.
///
/// Built once per request direction and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParams {
    pub table: TableRef,
    pub query: Option<String>,
    pub service_account_name: Option<String>,
    pub service_account_file: Option<PathBuf>,
    /// Properties of the opposite address, used to resolve query placeholders.
    pub companion_properties: BTreeMap<String, String>,
}

impl RequestParams {
    /// Builds the parameters of `direction` from `request`.
    ///
    /// Fails with [`ErrorKind::ValidationError`] if project, dataset or table are missing.
    pub fn from_request(request: &TransferRequest, direction: Direction) -> TransferResult<Self> {
        let (address, companion) = match direction {
            Direction::Source => (&request.source, &request.destination),
            Direction::Destination => (&request.destination, &request.source),
        };

        let Some(project) = address.property(PROJECT) else {
            bail!(
                ErrorKind::ValidationError,
                "Missing required address property",
                PROJECT
            );
        };
        let Some(dataset) = address.property(DATASET) else {
            bail!(
                ErrorKind::ValidationError,
                "Missing required address property",
                DATASET
            );
        };
        let Some(table) = address.property(TABLE) else {
            bail!(
                ErrorKind::ValidationError,
                "Missing required address property",
                TABLE
            );
        };

        Ok(Self {
            table: TableRef {
                project: project.to_string(),
                dataset: dataset.to_string(),
                table: table.to_string(),
            },
            query: address.property(QUERY).map(str::to_string),
            service_account_name: address.property(SERVICE_ACCOUNT_NAME).map(str::to_string),
            service_account_file: address.property(SERVICE_ACCOUNT_FILE).map(PathBuf::from),
            companion_properties: companion.properties.clone(),
        })
    }

    /// Looks up a placeholder value in the companion address.
    ///
    /// Empty values are returned as is, matching what the address holds.
    pub fn companion_property(&self, name: &str) -> Option<String> {
        self.companion_properties.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> DataAddress {
        DataAddress::new(BIGQUERY_DATA_TYPE)
            .with_property(PROJECT, "p")
            .with_property(DATASET, "d")
            .with_property(TABLE, "t")
    }

    fn request(source: DataAddress, destination: DataAddress) -> TransferRequest {
        TransferRequest {
            id: "req-1".to_string(),
            source,
            destination,
        }
    }

    #[test]
    fn params_follow_direction() {
        let source = address().with_property(QUERY, "SELECT @@id");
        let destination = address()
            .with_property(TABLE, "target")
            .with_property("id", "7");
        let request = request(source, destination);

        let source_params = RequestParams::from_request(&request, Direction::Source).unwrap();
        let sink_params = RequestParams::from_request(&request, Direction::Destination).unwrap();

        assert_eq!(source_params.query.as_deref(), Some("SELECT @@id"));
        assert_eq!(source_params.companion_property("id").as_deref(), Some("7"));
        assert_eq!(sink_params.table.to_string(), "p.d.target");
        assert_eq!(sink_params.query, None);
    }

    #[test]
    fn missing_table_is_a_validation_error() {
        let destination = DataAddress::new(BIGQUERY_DATA_TYPE)
            .with_property(PROJECT, "p")
            .with_property(DATASET, "d");
        let request = request(address(), destination);

        let err = RequestParams::from_request(&request, Direction::Destination).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(err.detail(), Some(TABLE));
    }

    #[test]
    fn empty_properties_count_as_unset() {
        let source = address()
            .with_property(SERVICE_ACCOUNT_NAME, "")
            .with_property(SERVICE_ACCOUNT_FILE, "/keys/sa.json");
        let request = request(source, address());

        let params = RequestParams::from_request(&request, Direction::Source).unwrap();

        assert_eq!(params.service_account_name, None);
        assert_eq!(
            params.service_account_file,
            Some(PathBuf::from("/keys/sa.json"))
        );

        let err = RequestParams::from_request(
            &request_with_project(""),
            Direction::Source,
        )
        .unwrap_err();
        assert_eq!(err.detail(), Some(PROJECT));
    }

    fn request_with_project(project: &str) -> TransferRequest {
        request(address().with_property(PROJECT, project), address())
    }

    #[test]
    fn request_deserializes_from_json() {
        let request: TransferRequest = serde_json::from_str(
            r#"{
                "id": "abc",
                "source": {"type": "BigQueryData", "properties": {"project": "p"}},
                "destination": {"type": "BigQueryData"}
            }"#,
        )
        .unwrap();

        assert_eq!(request.source.address_type, BIGQUERY_DATA_TYPE);
        assert_eq!(request.source.property(PROJECT), Some("p"));
        assert!(request.destination.properties.is_empty());
    }
}
