//! Error types for aliasman-core
//!
//! Provides a unified error type that can be converted to appropriate exit codes.

use thiserror::Error;

/// Result type alias for aliasman-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for aliasman operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or malformed operator input
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A field name that does not exist on the alias record
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Invalid regular expression in a filter
    #[error("Invalid regular expression: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// Provider name not present in the registry
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Two records share an alias@domain key inside one collection
    #[error("Duplicate alias key: {0}")]
    DuplicateKey(String),

    /// Alias already exists
    #[error("Alias already exists: {0}")]
    AliasExists(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A mutating call on a provider opened read-only
    #[error("{0} opened readonly")]
    ReadOnly(String),

    /// Provider used before open or after close
    #[error("Provider not open: {0}")]
    NotOpen(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Network error (retryable)
    #[error("Network error: {0}")]
    Network(String),

    /// Storage backend failure (database, malformed remote data)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Operation interrupted by the operator
    #[error("Interrupted: {0}")]
    Interrupted(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::Validation(_)
            | Error::UnknownField(_)
            | Error::InvalidRegex(_)
            | Error::Config(_)
            | Error::UnknownProvider(_)
            | Error::InvalidUrl(_)
            | Error::TomlParse(_) => 2, // UsageError
            Error::Network(_) => 3,                             // NetworkError
            Error::Auth(_) => 4,                                // AuthError
            Error::NotFound(_) => 5,                            // NotFound
            Error::AliasExists(_) | Error::DuplicateKey(_) => 6, // Conflict
            Error::ReadOnly(_) => 7,                            // ReadOnly
            Error::Interrupted(_) => 130,                       // Interrupted
            _ => 1,                                             // GeneralError
        }
    }

    /// Whether the operator should be shown command usage alongside the error
    pub const fn is_usage(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::UnknownField(_) | Error::InvalidRegex(_)
        )
    }
}
