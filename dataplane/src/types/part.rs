use bytes::Bytes;
use std::fmt;

/// Name of the part carrying the encoded [`crate::types::TableSchema`].
pub const SCHEMA_PART_NAME: &str = "schema";

/// Prefix of row part names, followed by the zero-based row ordinal.
pub const ROW_PART_PREFIX: &str = "row ";

/// Size of a part's content as reported to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartSize {
    Known(u64),
    Unknown,
}

/// What a part carries, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Schema,
    Row,
}

/// A named unit of a streamed transfer.
///
/// The content can be consumed exactly once through [`Part::into_content`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    name: String,
    content: Bytes,
    size: PartSize,
}

impl Part {
    /// Creates a part whose size is the length of `content`.
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        let size = PartSize::Known(content.len() as u64);

        Self {
            name: name.into(),
            content,
            size,
        }
    }

    /// Creates a part that does not advertise its size.
    pub fn with_unknown_size(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            size: PartSize::Unknown,
        }
    }

    /// Creates the schema part.
    pub fn schema(content: impl Into<Bytes>) -> Self {
        Self::new(SCHEMA_PART_NAME, content)
    }

    /// Creates the part for the row with the given ordinal.
    pub fn row(ordinal: u64, content: impl Into<Bytes>) -> Self {
        Self::new(row_part_name(ordinal), content)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> PartSize {
        self.size
    }

    /// Every part not named [`SCHEMA_PART_NAME`] is treated as a row part.
    pub fn kind(&self) -> PartKind {
        if self.name == SCHEMA_PART_NAME {
            PartKind::Schema
        } else {
            PartKind::Row
        }
    }

    /// Consumes the part and returns its content.
    pub fn into_content(self) -> Bytes {
        self.content
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.size {
            PartSize::Known(size) => write!(f, "{} ({size} bytes)", self.name),
            PartSize::Unknown => write!(f, "{} (unknown size)", self.name),
        }
    }
}

/// Returns the part name for the row with the given ordinal.
pub fn row_part_name(ordinal: u64) -> String {
    format!("{ROW_PART_PREFIX}{ordinal}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_kind_follows_name() {
        assert_eq!(Part::schema("{}").kind(), PartKind::Schema);
        assert_eq!(Part::row(3, "{}").kind(), PartKind::Row);
        assert_eq!(Part::new("anything", "{}").kind(), PartKind::Row);
    }

    #[test]
    fn row_parts_are_named_by_ordinal() {
        let part = Part::row(12, r#"{"__row__":"12"}"#);

        assert_eq!(part.name(), "row 12");
        assert_eq!(part.size(), PartSize::Known(16));
    }

    #[test]
    fn unknown_size_is_preserved() {
        let part = Part::with_unknown_size("row 0", "{}");

        assert_eq!(part.size(), PartSize::Unknown);
        assert_eq!(part.to_string(), "row 0 (unknown size)");
        assert_eq!(part.into_content(), Bytes::from_static(b"{}"));
    }
}
