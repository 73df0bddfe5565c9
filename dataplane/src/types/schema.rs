use std::collections::HashSet;
use std::fmt;

use crate::bail;
use crate::error::{ErrorKind, TransferResult};
use crate::types::ROW_ORDINAL_KEY;

/// Column types understood by the part-stream protocol.
///
/// The set mirrors the legacy BigQuery type tags. Nested types are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    String,
    Bytes,
    Integer,
    Float,
    Numeric,
    BigNumeric,
    Boolean,
    Timestamp,
    Date,
    Time,
    DateTime,
    Geography,
    Json,
    Interval,
}

impl ColumnType {
    /// Returns the tag used on the wire.
    pub fn as_tag(&self) -> &'static str {
        match self {
            ColumnType::String => "STRING",
            ColumnType::Bytes => "BYTES",
            ColumnType::Integer => "INTEGER",
            ColumnType::Float => "FLOAT",
            ColumnType::Numeric => "NUMERIC",
            ColumnType::BigNumeric => "BIGNUMERIC",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Date => "DATE",
            ColumnType::Time => "TIME",
            ColumnType::DateTime => "DATETIME",
            ColumnType::Geography => "GEOGRAPHY",
            ColumnType::Json => "JSON",
            ColumnType::Interval => "INTERVAL",
        }
    }

    /// Parses a wire tag. Only the exact legacy tags are accepted.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let column_type = match tag {
            "STRING" => ColumnType::String,
            "BYTES" => ColumnType::Bytes,
            "INTEGER" => ColumnType::Integer,
            "FLOAT" => ColumnType::Float,
            "NUMERIC" => ColumnType::Numeric,
            "BIGNUMERIC" => ColumnType::BigNumeric,
            "BOOLEAN" => ColumnType::Boolean,
            "TIMESTAMP" => ColumnType::Timestamp,
            "DATE" => ColumnType::Date,
            "TIME" => ColumnType::Time,
            "DATETIME" => ColumnType::DateTime,
            "GEOGRAPHY" => ColumnType::Geography,
            "JSON" => ColumnType::Json,
            "INTERVAL" => ColumnType::Interval,
            _ => return None,
        };

        Some(column_type)
    }

    /// Parses a type name reported by the table store.
    ///
    /// Standard SQL aliases are normalized to their legacy tag. Nested and unknown types are
    /// rejected.
    pub fn from_store_type(type_name: &str) -> TransferResult<Self> {
        let normalized = type_name.to_ascii_uppercase();
        let canonical = match normalized.as_str() {
            "INT64" => "INTEGER",
            "FLOAT64" => "FLOAT",
            "BOOL" => "BOOLEAN",
            "DECIMAL" => "NUMERIC",
            "BIGDECIMAL" => "BIGNUMERIC",
            other => other,
        };

        match ColumnType::from_tag(canonical) {
            Some(column_type) => Ok(column_type),
            None => bail!(
                ErrorKind::UnsupportedColumnType,
                "Column type is not supported by the part-stream protocol",
                format!("type `{type_name}`")
            ),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// A single named, typed column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Ordered column definitions of a table.
///
/// Column order defines positional binding and column names are unique. The row ordinal
/// key is reserved and never names a column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableSchema {
    columns: Vec<ColumnSchema>,
}

impl TableSchema {
    /// Creates a schema, rejecting duplicate and reserved column names.
    pub fn new(columns: Vec<ColumnSchema>) -> TransferResult<Self> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if column.name == ROW_ORDINAL_KEY {
                bail!(
                    ErrorKind::ValidationError,
                    "Table schema uses a column name reserved for the row ordinal",
                    format!("column `{ROW_ORDINAL_KEY}` cannot be carried in a row part")
                );
            }

            if !seen.insert(column.name.as_str()) {
                bail!(
                    ErrorKind::ValidationError,
                    "Table schema contains a duplicate column",
                    format!("column `{}`", column.name)
                );
            }
        }

        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    /// Returns the column with the given name.
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Returns the column names in schema order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_aliases_normalize_to_legacy_tags() {
        assert_eq!(
            ColumnType::from_store_type("INT64").unwrap(),
            ColumnType::Integer
        );
        assert_eq!(
            ColumnType::from_store_type("float64").unwrap(),
            ColumnType::Float
        );
        assert_eq!(
            ColumnType::from_store_type("BOOL").unwrap(),
            ColumnType::Boolean
        );
        assert_eq!(
            ColumnType::from_store_type("TIMESTAMP").unwrap(),
            ColumnType::Timestamp
        );
    }

    #[test]
    fn nested_types_are_rejected() {
        for type_name in ["RECORD", "STRUCT", "RANGE"] {
            let err = ColumnType::from_store_type(type_name).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedColumnType);
        }
    }

    #[test]
    fn wire_tags_are_exact() {
        assert_eq!(ColumnType::from_tag("DATETIME"), Some(ColumnType::DateTime));
        assert_eq!(ColumnType::from_tag("INT64"), None);
        assert_eq!(ColumnType::from_tag("string"), None);
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let err = TableSchema::new(vec![
            ColumnSchema::new("id", ColumnType::Integer),
            ColumnSchema::new("id", ColumnType::String),
        ])
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn row_ordinal_key_is_not_a_column_name() {
        let err = TableSchema::new(vec![
            ColumnSchema::new("id", ColumnType::Integer),
            ColumnSchema::new(ROW_ORDINAL_KEY, ColumnType::Integer),
        ])
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert!(err.detail().unwrap().contains("`__row__`"));
    }

    #[test]
    fn columns_keep_their_order() {
        let schema = TableSchema::new(vec![
            ColumnSchema::new("name", ColumnType::String),
            ColumnSchema::new("id", ColumnType::Integer),
        ])
        .unwrap();

        assert_eq!(schema.column_names().collect::<Vec<_>>(), vec!["name", "id"]);
        assert_eq!(
            schema.column("id").map(|column| column.column_type),
            Some(ColumnType::Integer)
        );
        assert!(schema.column("missing").is_none());
    }
}
