use bytes::Bytes;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashSet;

use crate::bail;
use crate::codec::OrderedEntries;
use crate::error::{ErrorKind, TransferError, TransferResult};
use crate::transfer_error;
use crate::types::{ColumnSchema, ColumnType, TableSchema};

/// Borrowed view serializing a schema as `{"column": "TYPE", ...}`.
struct WireSchema<'a>(&'a TableSchema);

impl Serialize for WireSchema<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for column in self.0.columns() {
            map.serialize_entry(&column.name, column.column_type.as_tag())?;
        }
        map.end()
    }
}

/// Encodes a schema as the content of the schema part.
pub fn encode_schema(schema: &TableSchema) -> TransferResult<Bytes> {
    let encoded = serde_json::to_vec(&WireSchema(schema)).map_err(|err| {
        transfer_error!(
            ErrorKind::SerializationError,
            "Failed to encode table schema",
            source: err
        )
    })?;

    Ok(Bytes::from(encoded))
}

/// Decodes the content of a schema part.
///
/// Column order follows the document order of the JSON object.
pub fn decode_schema(content: &[u8]) -> TransferResult<TableSchema> {
    let entries: OrderedEntries<String> =
        serde_json::from_slice(content).map_err(|err| schema_decode_error(err.to_string(), err))?;

    let mut seen = HashSet::with_capacity(entries.0.len());
    let mut columns = Vec::with_capacity(entries.0.len());
    for (name, tag) in entries.0 {
        if !seen.insert(name.clone()) {
            bail!(
                ErrorKind::SchemaDecodeError,
                "Schema part contains a duplicate column",
                format!("column `{name}`")
            );
        }

        let Some(column_type) = ColumnType::from_tag(&tag) else {
            bail!(
                ErrorKind::SchemaDecodeError,
                "Schema part contains an unknown column type",
                format!("column `{name}` has type `{tag}`")
            );
        };

        columns.push(ColumnSchema::new(name, column_type));
    }

    TableSchema::new(columns)
}

fn schema_decode_error(detail: String, source: serde_json::Error) -> TransferError {
    transfer_error!(
        ErrorKind::SchemaDecodeError,
        "Schema part is not a valid schema document",
        detail = detail,
        source: source
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnSchema::new("zeta", ColumnType::String),
            ColumnSchema::new("alpha", ColumnType::Integer),
            ColumnSchema::new("ts", ColumnType::Timestamp),
            ColumnSchema::new("amount", ColumnType::BigNumeric),
        ])
        .unwrap()
    }

    #[test]
    fn encoded_schema_keeps_column_order() {
        let encoded = encode_schema(&schema()).unwrap();

        assert_eq!(
            std::str::from_utf8(&encoded).unwrap(),
            r#"{"zeta":"STRING","alpha":"INTEGER","ts":"TIMESTAMP","amount":"BIGNUMERIC"}"#
        );
    }

    #[test]
    fn decode_restores_the_encoded_schema() {
        let schema = schema();

        let decoded = decode_schema(&encode_schema(&schema).unwrap()).unwrap();

        assert_eq!(decoded, schema);
    }

    #[test]
    fn empty_schema_is_valid() {
        let decoded = decode_schema(b"{}").unwrap();

        assert!(decoded.is_empty());
    }

    #[test]
    fn unknown_tags_fail() {
        let err = decode_schema(br#"{"id":"INT128"}"#).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SchemaDecodeError);
        assert!(err.detail().unwrap().contains("INT128"));
    }

    #[test]
    fn duplicate_columns_fail() {
        let err = decode_schema(br#"{"id":"INTEGER","id":"STRING"}"#).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SchemaDecodeError);
    }

    #[test]
    fn row_ordinal_key_is_rejected_as_a_column() {
        let err = decode_schema(br#"{"id":"INTEGER","__row__":"INTEGER"}"#).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert!(err.detail().unwrap().contains("__row__"));
    }

    #[test]
    fn malformed_documents_fail() {
        for content in [&b"[]"[..], b"not json", br#"{"id":1}"#, b""] {
            let err = decode_schema(content).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::SchemaDecodeError);
        }
    }
}
