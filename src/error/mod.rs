use thiserror::Error;

pub mod context;

pub type Result<T> = std::result::Result<T, Error>;

// Re-export context helpers
pub use context::{ErrorChain, ErrorContext, OptionExt};

/// Main error type for strata
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed predicate, join, select or data input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A builder or terminal method was called before any `search*` call
    #[error("search() must be called before {0}()")]
    SearchNotInitialized(&'static str),

    /// Fluent-call ordering violation other than a missing search
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Operator '{operator}' is not supported by the {backend} backend")]
    UnsupportedOperator { operator: String, backend: String },

    #[error("Feature not supported by the {backend} backend: {feature}")]
    UnsupportedFeature { backend: String, feature: String },

    #[error("Ambiguous alias: {0}")]
    AmbiguousAlias(String),

    #[error("Join between '{container1}' and '{container2}' is not reachable from '{root}'")]
    DisconnectedJoin {
        root: String,
        container1: String,
        container2: String,
    },

    #[error("Invalid sort order '{0}', expected 'asc' or 'desc'")]
    InvalidSortOrder(String),

    /// A non-`is` predicate where an exact key match is required
    #[error("Invalid operator: {0}")]
    InvalidOperator(String),

    /// Failure reported by the underlying driver
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Error with context chain
    #[error("{message}")]
    WithContext {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Connection(err.to_string()),
            other => Self::Backend(other.to_string()),
        }
    }
}

impl From<mongodb::error::Error> for Error {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        match *err.kind {
            ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) | ErrorKind::ConnectionPoolCleared { .. } => {
                Self::Connection(err.to_string())
            }
            _ => Self::Backend(err.to_string()),
        }
    }
}

impl From<bson::ser::Error> for Error {
    fn from(err: bson::ser::Error) -> Self {
        Self::InvalidArgument(format!("value cannot be stored as BSON: {}", err))
    }
}

#[cfg(feature = "config")]
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn unsupported_operator(operator: impl Into<String>, backend: impl Into<String>) -> Self {
        Self::UnsupportedOperator {
            operator: operator.into(),
            backend: backend.into(),
        }
    }

    pub fn unsupported_feature(backend: impl Into<String>, feature: impl Into<String>) -> Self {
        Self::UnsupportedFeature {
            backend: backend.into(),
            feature: feature.into(),
        }
    }

    pub fn ambiguous_alias(msg: impl Into<String>) -> Self {
        Self::AmbiguousAlias(msg.into())
    }

    pub fn invalid_operator(msg: impl Into<String>) -> Self {
        Self::InvalidOperator(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    // Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            message: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether the failure is transient. Nothing in this crate retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Connection(_) => true,
            Error::WithContext { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// True for errors raised before any request reached the backend
    pub fn is_client_error(&self) -> bool {
        match self {
            Error::InvalidArgument(_)
            | Error::SearchNotInitialized(_)
            | Error::InvalidState(_)
            | Error::UnsupportedOperator { .. }
            | Error::UnsupportedFeature { .. }
            | Error::AmbiguousAlias(_)
            | Error::DisconnectedJoin { .. }
            | Error::InvalidSortOrder(_)
            | Error::InvalidOperator(_) => true,
            Error::WithContext { source, .. } => source.is_client_error(),
            _ => false,
        }
    }

    /// Stable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "E_INVALID_ARGUMENT",
            Error::SearchNotInitialized(_) => "E_SEARCH_NOT_INITIALIZED",
            Error::InvalidState(_) => "E_INVALID_STATE",
            Error::UnsupportedOperator { .. } => "E_UNSUPPORTED_OPERATOR",
            Error::UnsupportedFeature { .. } => "E_UNSUPPORTED_FEATURE",
            Error::AmbiguousAlias(_) => "E_AMBIGUOUS_ALIAS",
            Error::DisconnectedJoin { .. } => "E_DISCONNECTED_JOIN",
            Error::InvalidSortOrder(_) => "E_INVALID_SORT_ORDER",
            Error::InvalidOperator(_) => "E_INVALID_OPERATOR",
            Error::Backend(_) => "E_BACKEND",
            Error::Connection(_) => "E_CONNECTION",
            Error::Configuration(_) => "E_CONFIGURATION",
            Error::Cache(_) => "E_CACHE",
            Error::Internal(_) => "E_INTERNAL",
            Error::Json(_) => "E_JSON",
            Error::Io(_) => "E_IO",
            Error::WithContext { source, .. } => source.error_code(),
        }
    }
}
