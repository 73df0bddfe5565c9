use std::fmt::Write;

use crate::bail;
use crate::error::{ErrorKind, TransferResult};
use crate::params::TableRef;
use crate::types::{ColumnType, RowRecord, TableSchema};

/// Builds the `INSERT` statement writing `row` into `table`.
///
/// Columns are listed in schema order and only columns present in the row are written.
/// Values are validated against their column type and rendered as standard SQL literals.
pub fn build_insert_statement(
    table: &TableRef,
    schema: &TableSchema,
    row: &RowRecord,
) -> TransferResult<String> {
    let bound = row.bind(schema)?;
    if bound.is_empty() {
        bail!(
            ErrorKind::InvalidRow,
            "Row has no values to insert",
            format!("row {}", row.ordinal())
        );
    }

    let mut columns = String::new();
    let mut values = String::new();
    for (index, (column, value)) in bound.into_iter().enumerate() {
        if index > 0 {
            columns.push_str(", ");
            values.push_str(", ");
        }

        columns.push_str(&quote_identifier(&column.name));
        match value {
            Some(value) => values.push_str(&render_literal(
                column.column_type,
                value,
                &column.name,
                row.ordinal(),
            )?),
            None => values.push_str("NULL"),
        }
    }

    Ok(format!(
        "INSERT INTO {} ({columns}) VALUES ({values})",
        quote_identifier(&table.to_string())
    ))
}

fn render_literal(
    column_type: ColumnType,
    value: &str,
    column: &str,
    ordinal: u64,
) -> TransferResult<String> {
    let invalid = || {
        crate::transfer_error!(
            ErrorKind::InvalidRow,
            "Row value does not match its column type",
            format!("row {ordinal}, column `{column}` of type {column_type}: `{value}`")
        )
    };

    let literal = match column_type {
        ColumnType::String => quote_string(value),
        ColumnType::Integer => {
            let parsed: i64 = value.trim().parse().map_err(|_| invalid())?;
            parsed.to_string()
        }
        ColumnType::Float => {
            let parsed: f64 = value.trim().parse().map_err(|_| invalid())?;
            if parsed.is_finite() {
                value.trim().to_string()
            } else {
                format!("CAST({} AS FLOAT64)", quote_string(value.trim()))
            }
        }
        ColumnType::Boolean => match value.trim().to_ascii_lowercase().as_str() {
            "true" => "TRUE".to_string(),
            "false" => "FALSE".to_string(),
            _ => return Err(invalid()),
        },
        ColumnType::Timestamp => {
            let seconds: f64 = value.trim().parse().map_err(|_| invalid())?;
            if !seconds.is_finite() {
                return Err(invalid());
            }
            format!("TIMESTAMP_SECONDS({})", seconds.trunc() as i64)
        }
        ColumnType::Numeric | ColumnType::BigNumeric => {
            value.trim().parse::<f64>().map_err(|_| invalid())?;
            format!("{column_type} {}", quote_string(value.trim()))
        }
        ColumnType::Bytes => format!("FROM_BASE64({})", quote_string(value)),
        ColumnType::Geography => format!("ST_GEOGFROMTEXT({})", quote_string(value)),
        ColumnType::Interval => format!("CAST({} AS INTERVAL)", quote_string(value)),
        ColumnType::Date | ColumnType::Time | ColumnType::DateTime | ColumnType::Json => {
            format!("{column_type} {}", quote_string(value))
        }
    };

    Ok(literal)
}

/// Renders a double-quoted string literal.
fn quote_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(quoted, "\\u{:04x}", c as u32);
            }
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Renders a backtick-quoted identifier.
fn quote_identifier(identifier: &str) -> String {
    format!("`{}`", identifier.replace('\\', "\\\\").replace('`', "\\`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnSchema;

    fn table() -> TableRef {
        TableRef {
            project: "proj".to_string(),
            dataset: "ds".to_string(),
            table: "events".to_string(),
        }
    }

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnSchema::new("id", ColumnType::Integer),
            ColumnSchema::new("name", ColumnType::String),
            ColumnSchema::new("ts", ColumnType::Timestamp),
            ColumnSchema::new("active", ColumnType::Boolean),
            ColumnSchema::new("day", ColumnType::Date),
        ])
        .unwrap()
    }

    #[test]
    fn statement_uses_schema_order() {
        let row = RowRecord::new(0)
            .with_value("ts", Some("1.7E9".to_string()))
            .with_value("name", Some("bob".to_string()))
            .with_value("id", Some("42".to_string()));

        let statement = build_insert_statement(&table(), &schema(), &row).unwrap();

        assert_eq!(
            statement,
            "INSERT INTO `proj.ds.events` (`id`, `name`, `ts`) VALUES (42, \"bob\", TIMESTAMP_SECONDS(1700000000))"
        );
    }

    #[test]
    fn timestamp_fraction_is_truncated() {
        let row = RowRecord::new(0).with_value("ts", Some("1700000000.987".to_string()));

        let statement = build_insert_statement(&table(), &schema(), &row).unwrap();

        assert!(statement.ends_with("VALUES (TIMESTAMP_SECONDS(1700000000))"));
    }

    #[test]
    fn strings_are_escaped() {
        let row = RowRecord::new(0).with_value("name", Some(r#"say "hi" \ bye"#.to_string()));

        let statement = build_insert_statement(&table(), &schema(), &row).unwrap();

        assert!(statement.ends_with(r#"VALUES ("say \"hi\" \\ bye")"#));
    }

    #[test]
    fn nulls_booleans_and_typed_literals() {
        let row = RowRecord::new(0)
            .with_value("id", None)
            .with_value("active", Some("True".to_string()))
            .with_value("day", Some("2024-03-01".to_string()));

        let statement = build_insert_statement(&table(), &schema(), &row).unwrap();

        assert!(statement.ends_with(r#"VALUES (NULL, TRUE, DATE "2024-03-01")"#));
    }

    #[test]
    fn invalid_integer_is_rejected() {
        let row = RowRecord::new(3).with_value("id", Some("12; DROP TABLE x".to_string()));

        let err = build_insert_statement(&table(), &schema(), &row).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidRow);
        assert!(err.detail().unwrap().contains("row 3"));
    }

    #[test]
    fn unknown_column_is_rejected() {
        let row = RowRecord::new(0).with_value("email", Some("x".to_string()));

        let err = build_insert_statement(&table(), &schema(), &row).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidRow);
    }

    #[test]
    fn empty_row_is_rejected() {
        let err = build_insert_statement(&table(), &schema(), &RowRecord::new(0)).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidRow);
    }
}
