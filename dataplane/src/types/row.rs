use crate::bail;
use crate::error::{ErrorKind, TransferResult};
use crate::types::{ColumnSchema, TableSchema};

/// Reserved key carrying the row ordinal inside an encoded row part.
pub const ROW_ORDINAL_KEY: &str = "__row__";

/// A single row as an ordered mapping of column names to string values.
///
/// The ordinal identifies the row within its transfer and is never written to the table.
/// A `None` value is a SQL `NULL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRecord {
    ordinal: u64,
    values: Vec<(String, Option<String>)>,
}

impl RowRecord {
    pub fn new(ordinal: u64) -> Self {
        Self {
            ordinal,
            values: Vec::new(),
        }
    }

    /// Appends a value, returning the row for chaining.
    pub fn with_value(mut self, column: impl Into<String>, value: Option<String>) -> Self {
        self.push(column, value);
        self
    }

    /// Appends a value. A later value for the same column replaces the earlier one.
    pub fn push(&mut self, column: impl Into<String>, value: Option<String>) {
        let column = column.into();
        match self.values.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = value,
            None => self.values.push((column, value)),
        }
    }

    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    pub fn values(&self) -> &[(String, Option<String>)] {
        &self.values
    }

    /// Returns the value of `column`, `Some(None)` if it is present and `NULL`.
    pub fn value(&self, column: &str) -> Option<Option<&str>> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_deref())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Checks that every value belongs to a column of `schema`.
    pub fn validate(&self, schema: &TableSchema) -> TransferResult<()> {
        for (column, _) in &self.values {
            if schema.column(column).is_none() {
                bail!(
                    ErrorKind::InvalidRow,
                    "Row contains a column that is not part of the table schema",
                    format!("row {} has unknown column `{column}`", self.ordinal)
                );
            }
        }

        Ok(())
    }

    /// Binds the row values to `schema`.
    ///
    /// Returns the present columns in schema order together with their values. Columns missing
    /// from the row are skipped. Fails if the row holds a column unknown to the schema.
    pub fn bind<'a>(
        &'a self,
        schema: &'a TableSchema,
    ) -> TransferResult<Vec<(&'a ColumnSchema, Option<&'a str>)>> {
        self.validate(schema)?;

        let bound = schema
            .columns()
            .iter()
            .filter_map(|column| self.value(&column.name).map(|value| (column, value)))
            .collect();

        Ok(bound)
    }
}
