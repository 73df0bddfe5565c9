//! Error types and result definitions for transfers.
//!
//! [`TransferError`] carries a classification ([`ErrorKind`]), a static description, optional
//! dynamic detail (for example the error text reported by the table store), the originating
//! error and the callsite. Several failures from concurrent sink tasks can be aggregated into
//! one error.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result type for transfer operations.
pub type TransferResult<T> = Result<T, TransferError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the data plane.
///
/// Every fatal condition of a transfer surfaces as a [`TransferError`] with a human readable
/// message. Use [`TransferError::kind`] to branch on the failure category.
#[derive(Debug, Clone)]
pub struct TransferError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    /// Failures collected from several sink tasks of the same transfer.
    Many {
        errors: Vec<TransferError>,
        location: &'static Location<'static>,
    },
}

/// Failure categories of a transfer.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Credentials
    AuthenticationFailure,

    // Store jobs
    QueryExecutionFailure,
    WriteExecutionFailure,
    StoreIoError,

    // Part stream protocol
    SchemaDecodeError,
    DuplicateSchema,
    MissingSchema,
    InvalidRow,
    UnsupportedColumnType,

    // Requests & configuration
    ValidationError,
    ConfigError,

    // IO & serialization
    IoError,
    SerializationError,
    DeserializationError,
    ConversionError,

    InvalidState,
    Unknown,
}

impl TransferError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// Aggregated errors report the kind of their first error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns every [`ErrorKind`] contained in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => {
                errors.iter().flat_map(|err| err.kinds()).collect()
            }
        }
    }

    /// Returns the static description of the error.
    pub fn description(&self) -> &str {
        match self.repr {
            ErrorRepr::Single(ref payload) => &payload.description,
            ErrorRepr::Many { .. } => "Multiple transfer failures",
        }
    }

    /// Returns the dynamic detail if available.
    ///
    /// For aggregated errors, returns the detail of the first error that has one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the captured callsite of this error.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Returns the number of single errors contained in this error.
    pub fn len(&self) -> usize {
        match self.repr {
            ErrorRepr::Single(_) => 1,
            ErrorRepr::Many { ref errors, .. } => errors.iter().map(|e| e.len()).sum(),
        }
    }

    /// Returns `true` if this is an aggregate without inner errors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attaches an originating error and returns the modified instance.
    ///
    /// Has no effect on aggregated errors, which forward their first error as source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    /// Replaces the kind and keeps description, detail, source and callsite.
    ///
    /// Aggregated errors re-tag every inner error.
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        match self.repr {
            ErrorRepr::Single(ref mut payload) => payload.kind = kind,
            ErrorRepr::Many { ref mut errors, .. } => {
                for err in errors.iter_mut() {
                    *err = err.clone().with_kind(kind);
                }
            }
        }
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        TransferError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for TransferError {
    fn eq(&self, other: &TransferError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                write!(f, "[{:?}] {}", payload.kind, payload.description)?;
                if let Some(detail) = payload.detail.as_deref() {
                    write!(f, ": {detail}")?;
                }

                // Only the alternate form carries the callsite and backtrace.
                if f.alternate() {
                    let location = payload.location;
                    write!(
                        f,
                        "\n  @ {}:{}:{}",
                        location.file(),
                        location.line(),
                        location.column()
                    )?;
                    write_backtrace(payload.backtrace.as_ref(), f)?;
                }

                Ok(())
            }
            ErrorRepr::Many { errors, .. } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated",
                    count,
                    if count == 1 { "" } else { "s" },
                )?;

                for (index, error) in errors.iter().enumerate() {
                    write!(f, "\n  {}. {error}", index + 1)?;
                }

                Ok(())
            }
        }
    }
}

impl error::Error for TransferError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

fn write_backtrace(backtrace: &Backtrace, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let rendered = backtrace.to_string();
    if rendered.trim().is_empty() {
        return Ok(());
    }

    write!(f, "\n  Backtrace:")?;
    for line in rendered.lines() {
        write!(f, "\n    {line}")?;
    }

    Ok(())
}

/// Creates a [`TransferError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for TransferError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> TransferError {
        TransferError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`TransferError`] from an error kind, static description and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for TransferError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> TransferError {
        TransferError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates errors. A single error is returned as is.
impl<E> From<Vec<E>> for TransferError
where
    E: Into<TransferError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> TransferError {
        let location = Location::caller();
        let mut errors: Vec<TransferError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1 {
            if let Some(error) = errors.pop() {
                return error;
            }
        }

        TransferError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for TransferError {
    #[track_caller]
    fn from(err: std::io::Error) -> TransferError {
        let detail = err.to_string();
        TransferError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Maps syntax and data errors to [`ErrorKind::DeserializationError`].
impl From<serde_json::Error> for TransferError {
    #[track_caller]
    fn from(err: serde_json::Error) -> TransferError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        let detail = err.to_string();
        TransferError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<std::string::FromUtf8Error> for TransferError {
    #[track_caller]
    fn from(err: std::string::FromUtf8Error) -> TransferError {
        let detail = err.to_string();
        TransferError::from_components(
            ErrorKind::ConversionError,
            Cow::Borrowed("UTF-8 string conversion failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<tokio::task::JoinError> for TransferError {
    #[track_caller]
    fn from(err: tokio::task::JoinError) -> TransferError {
        let detail = err.to_string();
        TransferError::from_components(
            ErrorKind::InvalidState,
            Cow::Borrowed("Sink task failed to complete"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
