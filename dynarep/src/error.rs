//! Error types for replication deployments.
//!
//! [`DynarepError`] carries a classification ([`ErrorKind`]), a static description, optional
//! dynamic detail and the callsite that raised it. Failures of independent regional work are
//! aggregated into a single error so that one failing region does not hide the others.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result type used across the crate.
pub type DynarepResult<T> = Result<T, DynarepError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the deployer core.
#[derive(Debug, Clone)]
pub struct DynarepError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    /// Errors collected from concurrent per-region work.
    Many {
        errors: Vec<DynarepError>,
        location: &'static Location<'static>,
    },
}

/// Classification of deployment failures.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Missing resources
    TableNotFound,
    GlobalTableNotFound,
    StackNotFound,

    // Provider failures
    ProviderRequestFailed,
    ProviderThrottled,
    PermissionDenied,
    InvalidRequest,

    // Deployment state
    ConfigError,
    InvalidState,
    StackDeploymentFailed,
    TemplateError,

    // Local failures
    IoError,
    SerializationError,

    // Waiting
    Timeout,
    Cancelled,

    Unknown,
}

impl ErrorKind {
    /// Returns `true` for kinds signaling that a remote resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ErrorKind::TableNotFound | ErrorKind::GlobalTableNotFound | ErrorKind::StackNotFound
        )
    }
}

impl DynarepError {
    /// Returns the [`ErrorKind`] of this error, the first one for aggregated errors.
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

    /// Returns the static description of this error, or of the first aggregated error.
    pub fn description(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.description.as_ref()),
            ErrorRepr::Many { ref errors, .. } => errors.first().and_then(|e| e.description()),
        }
    }

    /// Returns the dynamic detail, or the first one available among aggregated errors.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the aggregated errors, if this error is an aggregate.
    pub fn errors(&self) -> Option<&[DynarepError]> {
        match self.repr {
            ErrorRepr::Single(_) => None,
            ErrorRepr::Many { ref errors, .. } => Some(errors),
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Returns `true` when this error reports a missing remote resource.
    pub fn is_not_found(&self) -> bool {
        self.kind().is_not_found()
    }

    /// Attaches the originating error. Has no effect on aggregated errors.
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
        DynarepError {
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

impl PartialEq for DynarepError {
    fn eq(&self, other: &DynarepError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for DynarepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if let Some(detail) = payload.detail.as_deref() {
                    write!(f, "\n  Detail:")?;
                    for line in detail.lines() {
                        write!(f, "\n    {line}")?;
                    }
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    if let Some(first_line) = lines.next() {
                        write!(f, "\n  {}. {}", index + 1, first_line)?;
                    }

                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for DynarepError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

/// Creates a [`DynarepError`] from a kind and a static description.
impl From<(ErrorKind, &'static str)> for DynarepError {
    #[track_caller]
    fn from((kind, description): (ErrorKind, &'static str)) -> DynarepError {
        DynarepError::from_components(kind, Cow::Borrowed(description), None, None)
    }
}

/// Creates a [`DynarepError`] from a kind, a static description and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for DynarepError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, description, detail): (ErrorKind, &'static str, D)) -> DynarepError {
        DynarepError::from_components(kind, Cow::Borrowed(description), Some(detail.into()), None)
    }
}

/// Aggregates errors. A single error is returned as is.
impl<E> From<Vec<E>> for DynarepError
where
    E: Into<DynarepError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> DynarepError {
        let location = Location::caller();
        let mut errors: Vec<DynarepError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        DynarepError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for DynarepError {
    #[track_caller]
    fn from(err: std::io::Error) -> DynarepError {
        let detail = err.to_string();
        DynarepError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<serde_json::Error> for DynarepError {
    #[track_caller]
    fn from(err: serde_json::Error) -> DynarepError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => {
                (ErrorKind::SerializationError, "JSON parsing failed")
            }
        };

        let detail = err.to_string();
        DynarepError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynarep_error;

    #[test]
    fn test_single_error_display_contains_kind_and_detail() {
        let err = dynarep_error!(
            ErrorKind::TableNotFound,
            "Table not found",
            "orders-dev in us-west-2"
        );

        let rendered = err.to_string();
        assert!(rendered.starts_with("[TableNotFound] Table not found @ "));
        assert!(rendered.contains("orders-dev in us-west-2"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_vec_with_one_error_is_not_wrapped() {
        let err: DynarepError = vec![dynarep_error!(ErrorKind::Timeout, "Timed out")].into();

        assert!(err.errors().is_none());
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_aggregated_errors_keep_every_kind() {
        let err: DynarepError = vec![
            dynarep_error!(ErrorKind::StackDeploymentFailed, "Stack rolled back"),
            dynarep_error!(ErrorKind::PermissionDenied, "Access denied"),
        ]
        .into();

        assert_eq!(err.kind(), ErrorKind::StackDeploymentFailed);
        assert_eq!(
            err.kinds(),
            vec![ErrorKind::StackDeploymentFailed, ErrorKind::PermissionDenied]
        );
        assert!(err.to_string().starts_with("[Many] 2 errors aggregated"));
    }

    #[test]
    fn test_io_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "template.json");
        let err = DynarepError::from(io);

        assert_eq!(err.kind(), ErrorKind::IoError);
        assert!(error::Error::source(&err).is_some());
    }
}
