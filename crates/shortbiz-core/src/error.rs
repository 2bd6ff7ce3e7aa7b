//! Error types for shortbiz-core.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// Configuration file not found after searching all locations.
    #[error("no configuration file found")]
    NotFound,

    /// A setting required by the requested operation is not configured.
    #[error("missing setting `{key}` (set it in a config file or via {env})")]
    MissingSetting {
        /// Dotted config key, e.g. `llm.api_key`.
        key: &'static str,
        /// Environment variable that can supply it.
        env: &'static str,
    },

    /// No database path was configured and no platform data dir exists.
    #[error("cannot determine database location; set `database_path`")]
    NoDatabasePath,

    /// The database directory could not be created.
    #[error("failed to create database directory {path}: {source}")]
    DatabaseDir {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The HTTP client for the generation backend could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised by the SQLite store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Any SQLite failure.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A JSON column could not be encoded or decoded.
    #[error("stored JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),

    /// The connection mutex was poisoned by a panicking holder.
    #[error("database connection lock poisoned")]
    Poisoned,
}

/// Result type alias using [`StoreError`].
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by service operations.
///
/// Every variant maps to a distinct status class via [`ServiceError::status`]
/// so callers can tell failures apart without string matching.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The request was malformed and rejected before any work started.
    #[error("invalid request: {0}")]
    Validation(String),

    /// A referenced record does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The owner's token balance is below the cost of the request.
    #[error("not enough tokens: balance {balance}, cost {cost}")]
    InsufficientBalance {
        /// Tokens the owner currently holds.
        balance: i64,
        /// Tokens the request would consume.
        cost: i64,
    },

    /// The generation backend failed, timed out, or returned an error status.
    #[error("generation backend failed: {0}")]
    Upstream(String),

    /// The generation backend answered but produced no usable text.
    #[error("model returned empty output")]
    EmptyGeneration,

    /// Missing or invalid credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("{0}")]
    Forbidden(String),

    /// The write would violate a uniqueness rule.
    #[error("{0}")]
    Conflict(String),

    /// Password hashing failed on our side.
    #[error("password hashing failed: {0}")]
    Hashing(String),

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration needed by the operation is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ServiceError {
    /// HTTP-style status code for this failure class.
    pub const fn status(&self) -> u16 {
        match self {
            Self::Validation(_) => 422,
            Self::Unauthorized(_) => 401,
            Self::InsufficientBalance { .. } => 402,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Upstream(_) => 502,
            Self::EmptyGeneration | Self::Hashing(_) | Self::Store(_) | Self::Config(_) => 500,
        }
    }

    /// Whether the failure is the caller's to fix (4xx class).
    pub const fn is_client_error(&self) -> bool {
        self.status() < 500
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(StoreError::Sqlite(err))
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errs: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errs
            .field_errors()
            .into_iter()
            .map(|(field, list)| {
                let reasons: Vec<String> = list
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map_or_else(|| e.code.to_string(), ToString::to_string)
                    })
                    .collect();
                format!("{field}: {}", reasons.join(", "))
            })
            .collect();
        fields.sort();
        Self::Validation(fields.join("; "))
    }
}

/// Result type alias using [`ServiceError`].
pub type ServiceResult<T> = Result<T, ServiceError>;
