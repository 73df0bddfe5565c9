use crate::store::QueryResult;
use crate::types::{ColumnSchema, ColumnType, TableSchema};

/// Schema `(id INTEGER, name STRING)` used across tests.
pub fn users_schema() -> TableSchema {
    TableSchema::new(vec![
        ColumnSchema::new("id", ColumnType::Integer),
        ColumnSchema::new("name", ColumnType::String),
    ])
    .expect("test schema has unique columns")
}

/// Builds a query result over [`users_schema`] from `(id, name)` pairs.
pub fn users_result(rows: &[(&str, &str)]) -> QueryResult {
    QueryResult {
        schema: users_schema(),
        rows: rows
            .iter()
            .map(|(id, name)| vec![Some(id.to_string()), Some(name.to_string())])
            .collect(),
    }
}
