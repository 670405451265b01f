//! Error types and result definitions for synchronization jobs.
//!
//! [`SyncJobError`] carries a classification, a static description, optional dynamic detail,
//! an optional source error and the call site that created it. Failures of several jobs are
//! aggregated into a single error so a run reports everything that went wrong at once.

use std::any::Any;
use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result type for synchronization operations.
pub type SyncJobResult<T> = Result<T, SyncJobError>;

/// Detailed payload stored for single [`SyncJobError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for synchronization jobs.
#[derive(Debug, Clone)]
pub struct SyncJobError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    /// Errors of several jobs, collected at the fetch barrier.
    Many {
        errors: Vec<SyncJobError>,
        location: &'static Location<'static>,
    },
}

/// Categories of failures that can abort a synchronization run.
///
/// Per-item fetch failures are not errors: providers record them inside the
/// [`crate::types::PollResult`] they return.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Provider Errors
    ProviderFailed,
    SourceIoError,
    FetchTimeout,

    // Inventory Errors
    InventoryReadFailed,
    InventoryWriteFailed,

    // Data & Configuration Errors
    ConfigError,
    InvalidData,
    InvalidState,

    // IO & Serialization Errors
    IoError,
    SerializationError,
    DeserializationError,

    // Job Errors
    FetchJobPanic,
    AnalyzeJobPanic,

    // Unknown / Uncategorized
    Unknown,
}

impl SyncJobError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For aggregated errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// if the aggregate is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error, flattening aggregates.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => {
                errors.iter().flat_map(|err| err.kinds()).collect()
            }
        }
    }

    /// Returns the static description of this error.
    ///
    /// Aggregates return the description of their first error.
    pub fn description(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.description.as_ref()),
            ErrorRepr::Many { ref errors, .. } => {
                errors.first().and_then(|error| error.description())
            }
        }
    }

    /// Returns the dynamic detail of this error, if any.
    ///
    /// Aggregates return the detail of the first error that has one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the number of errors contained in this error.
    pub fn len(&self) -> usize {
        match self.repr {
            ErrorRepr::Single(_) => 1,
            ErrorRepr::Many { ref errors, .. } => errors.iter().map(|e| e.len()).sum(),
        }
    }

    /// Returns `true` for an aggregate that holds no errors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the captured backtrace for single errors.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the call site that created this error.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches an originating error, exposed through [`error::Error::source`].
    ///
    /// Has no effect on aggregates, which forward their first error as the source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
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
        SyncJobError {
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

impl PartialEq for SyncJobError {
    fn eq(&self, other: &SyncJobError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {} ({})", self.kind, self.description, self.location)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

impl fmt::Display for SyncJobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => fmt::Display::fmt(payload, f),
            ErrorRepr::Many { errors, location } => {
                write!(f, "{} errors ({location})", errors.len())?;
                for error in errors {
                    // Nested aggregates are indented one level further.
                    for (line_index, line) in error.to_string().lines().enumerate() {
                        let marker = if line_index == 0 { "- " } else { "  " };
                        write!(f, "\n  {marker}{line}")?;
                    }
                }
                Ok(())
            }
        }
    }
}

impl error::Error for SyncJobError {
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

/// Creates a [`SyncJobError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for SyncJobError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> SyncJobError {
        SyncJobError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`SyncJobError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for SyncJobError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> SyncJobError {
        SyncJobError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates several errors into one.
///
/// A vector with exactly one error yields that error unchanged.
impl<E> From<Vec<E>> for SyncJobError
where
    E: Into<SyncJobError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> SyncJobError {
        let location = Location::caller();
        let mut errors: Vec<SyncJobError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1 {
            if let Some(error) = errors.pop() {
                return error;
            }
        }

        SyncJobError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

/// Converts [`std::io::Error`] to [`SyncJobError`] with [`ErrorKind::IoError`].
impl From<std::io::Error> for SyncJobError {
    #[track_caller]
    fn from(err: std::io::Error) -> SyncJobError {
        let detail = err.to_string();
        SyncJobError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`serde_json::Error`] to [`SyncJobError`], classifying I/O and data failures.
impl From<serde_json::Error> for SyncJobError {
    #[track_caller]
    fn from(err: serde_json::Error) -> SyncJobError {
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
        SyncJobError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic payload is not a string".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync_error;

    #[test]
    fn single_error_vector_collapses() {
        let error: SyncJobError = vec![sync_error!(
            ErrorKind::ProviderFailed,
            "Provider poll failed",
            "device unreachable"
        )]
        .into();

        assert_eq!(error.kind(), ErrorKind::ProviderFailed);
        assert_eq!(error.len(), 1);
        assert_eq!(error.detail(), Some("device unreachable"));
    }

    #[test]
    fn aggregate_exposes_all_kinds() {
        let error: SyncJobError = vec![
            sync_error!(ErrorKind::ProviderFailed, "Provider poll failed"),
            sync_error!(ErrorKind::FetchJobPanic, "Fetch job panicked"),
        ]
        .into();

        assert_eq!(error.kind(), ErrorKind::ProviderFailed);
        assert_eq!(
            error.kinds(),
            vec![ErrorKind::ProviderFailed, ErrorKind::FetchJobPanic]
        );
        assert_eq!(error.len(), 2);
        let rendered = error.to_string();
        assert!(rendered.starts_with("2 errors ("));
        assert!(rendered.contains("\n  - [ProviderFailed] Provider poll failed"));
    }

    #[test]
    fn display_includes_detail_lines() {
        let error = sync_error!(
            ErrorKind::InvalidState,
            "Inventory object already exists",
            "key router-1"
        );

        let rendered = error.to_string();
        assert!(rendered.starts_with("[InvalidState] Inventory object already exists ("));
        assert!(rendered.ends_with(": key router-1"));
    }

    #[test]
    fn json_errors_are_classified() {
        let err = serde_json::from_str::<Vec<u32>>("[1,").unwrap_err();
        let error = SyncJobError::from(err);

        assert_eq!(error.kind(), ErrorKind::DeserializationError);
        assert!(std::error::Error::source(&error).is_some());
    }
}
