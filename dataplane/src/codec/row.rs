use bytes::Bytes;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::bail;
use crate::codec::OrderedEntries;
use crate::error::{ErrorKind, TransferResult};
use crate::transfer_error;
use crate::types::{ROW_ORDINAL_KEY, RowRecord};

/// Borrowed view serializing a row as `{"__row__": "<ordinal>", "column": "value"|null, ...}`.
struct WireRow<'a>(&'a RowRecord);

impl Serialize for WireRow<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let row = self.0;
        let mut map = serializer.serialize_map(Some(row.len() + 1))?;
        map.serialize_entry(ROW_ORDINAL_KEY, &row.ordinal().to_string())?;
        for (column, value) in row.values() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Encodes a row as the content of a row part.
pub fn encode_row(row: &RowRecord) -> TransferResult<Bytes> {
    let encoded = serde_json::to_vec(&WireRow(row)).map_err(|err| {
        transfer_error!(
            ErrorKind::SerializationError,
            "Failed to encode row",
            format!("row {}", row.ordinal()),
            source: err
        )
    })?;

    Ok(Bytes::from(encoded))
}

/// Decodes the content of a row part.
///
/// The ordinal is mandatory. Values must be strings or `null`.
pub fn decode_row(content: &[u8]) -> TransferResult<RowRecord> {
    let entries: OrderedEntries<Value> = serde_json::from_slice(content).map_err(|err| {
        transfer_error!(
            ErrorKind::InvalidRow,
            "Row part is not a valid row document",
            err.to_string(),
            source: err
        )
    })?;

    let mut ordinal = None;
    let mut values = Vec::with_capacity(entries.0.len());
    for (column, value) in entries.0 {
        if column == ROW_ORDINAL_KEY {
            ordinal = Some(parse_ordinal(&value)?);
            continue;
        }

        let value = match value {
            Value::String(value) => Some(value),
            Value::Null => None,
            other => bail!(
                ErrorKind::InvalidRow,
                "Row values must be strings or null",
                format!("column `{column}` has value `{other}`")
            ),
        };
        values.push((column, value));
    }

    let Some(ordinal) = ordinal else {
        bail!(
            ErrorKind::InvalidRow,
            "Row part has no ordinal",
            format!("missing `{ROW_ORDINAL_KEY}` key")
        );
    };

    let mut row = RowRecord::new(ordinal);
    for (column, value) in values {
        row.push(column, value);
    }

    Ok(row)
}

fn parse_ordinal(value: &Value) -> TransferResult<u64> {
    let parsed = match value {
        Value::String(ordinal) => ordinal.parse::<u64>().ok(),
        Value::Number(ordinal) => ordinal.as_u64(),
        _ => None,
    };

    match parsed {
        Some(ordinal) => Ok(ordinal),
        None => bail!(
            ErrorKind::InvalidRow,
            "Row ordinal is not a non-negative integer",
            format!("`{ROW_ORDINAL_KEY}` is `{value}`")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_encode_ordinal_first_and_nulls_as_null() {
        let row = RowRecord::new(7)
            .with_value("id", Some("42".to_string()))
            .with_value("name", None);

        let encoded = encode_row(&row).unwrap();

        assert_eq!(
            std::str::from_utf8(&encoded).unwrap(),
            r#"{"__row__":"7","id":"42","name":null}"#
        );
        assert_eq!(decode_row(&encoded).unwrap(), row);
    }

    #[test]
    fn ordinal_can_appear_anywhere() {
        let row = decode_row(br#"{"id":"1","__row__":"3","name":"bob"}"#).unwrap();

        assert_eq!(row.ordinal(), 3);
        assert_eq!(row.value("id"), Some(Some("1")));
        assert_eq!(row.value("name"), Some(Some("bob")));
    }

    #[test]
    fn missing_ordinal_is_invalid() {
        let err = decode_row(br#"{"id":"1"}"#).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidRow);
    }

    #[test]
    fn non_string_values_are_invalid() {
        let err = decode_row(br#"{"__row__":"0","id":1}"#).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidRow);
        assert!(err.detail().unwrap().contains("id"));
    }

    #[test]
    fn negative_ordinal_is_invalid() {
        let err = decode_row(br#"{"__row__":"-1"}"#).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidRow);
    }
}
