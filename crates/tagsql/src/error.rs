use crate::{
    cache::CacheError, compile::CompileError, config::ConfigError, db::executor::StorageFault,
};
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///
/// Structured error with a stable class + origin taxonomy.
/// The class decides how the caller surfaces the failure; the detail keeps
/// the originating error for diagnostics.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct Error {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    /// The variant (if present) must correspond to `origin`.
    pub detail: Option<ErrorDetail>,
}

impl Error {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: ErrorDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    /// True when the caller supplied a filter or tag that cannot be compiled.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self.class, ErrorClass::InvalidQuery)
    }

    /// True when retrying with backoff may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.class, ErrorClass::Unavailable)
    }

    /// HTTP-style status class for the API boundary.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self.class {
            ErrorClass::InvalidQuery => 400,
            ErrorClass::Unavailable => 503,
            ErrorClass::StorageFault | ErrorClass::Config => 500,
        }
    }

    /// True when the failure is a cache miss for an unknown tag.
    #[must_use]
    pub const fn is_unknown_tag(&self) -> bool {
        matches!(
            self.detail,
            Some(ErrorDetail::Compile(CompileError::UnknownTag { .. }))
        )
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`Error`].
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Compile(CompileError),

    #[error("{0}")]
    Cache(CacheError),

    #[error("{0}")]
    Storage(StorageFault),

    #[error("{0}")]
    Config(ConfigError),
}

impl From<CompileError> for Error {
    fn from(err: CompileError) -> Self {
        Self::new(ErrorClass::InvalidQuery, ErrorOrigin::Compile, err.to_string())
            .with_detail(ErrorDetail::Compile(err))
    }
}

impl From<CacheError> for Error {
    fn from(err: CacheError) -> Self {
        // a bare miss reaching this far is still a query problem
        if let CacheError::NotFound { signature } = err {
            return CompileError::UnknownTag { signature }.into();
        }

        Self::new(ErrorClass::Unavailable, ErrorOrigin::Cache, err.to_string())
            .with_detail(ErrorDetail::Cache(err))
    }
}

impl From<StorageFault> for Error {
    fn from(err: StorageFault) -> Self {
        Self::new(
            ErrorClass::StorageFault,
            ErrorOrigin::Executor,
            err.to_string(),
        )
        .with_detail(ErrorDetail::Storage(err))
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorClass::Config, ErrorOrigin::Config, err.to_string())
            .with_detail(ErrorDetail::Config(err))
    }
}

///
/// ErrorClass
/// Error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// The filter or tag cannot be compiled (400-class, never retried).
    InvalidQuery,

    /// The tag id cache could not answer (500-class, retryable).
    Unavailable,

    /// The executor returned rows that violate the statement contract.
    StorageFault,

    /// Configuration failed to load or validate.
    Config,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvalidQuery => "invalid_query",
            Self::Unavailable => "unavailable",
            Self::StorageFault => "storage_fault",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Compile,
    Cache,
    Executor,
    Config,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Compile => "compile",
            Self::Cache => "cache",
            Self::Executor => "executor",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}
