//! Error types for dirgate

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Directory Errors
    #[error("Cannot reach directory: {0}")]
    Connection(String),

    #[error("Directory search failed: {0}")]
    Search(String),

    #[error("Directory write failed: {0}")]
    Write(String),

    #[error("Entry was modified concurrently: {0}")]
    Conflict(String),

    #[error("No such entry: {0}")]
    NotFound(String),

    // Access Errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("{0} isn't unique, please contact administrator")]
    Uniqueness(String),

    // Validation Errors
    #[error("missing attribute: {attribute}")]
    Validation { attribute: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Internal Errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn missing_attribute(attribute: impl Into<String>) -> Self {
        Error::Validation {
            attribute: attribute.into(),
        }
    }

    /// Stable name of the failure kind, surfaced to API callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Connection(_) => "ConnectionError",
            Error::Search(_) => "SearchError",
            Error::Write(_) => "WriteError",
            Error::Conflict(_) => "ConflictError",
            Error::NotFound(_) => "NotFoundError",
            Error::Authentication(_) => "AuthenticationError",
            Error::Uniqueness(_) => "UniquenessError",
            Error::Validation { .. } => "ValidationError",
            Error::InvalidRequest(_) => "InvalidRequestError",
            Error::Config(_) => "ConfigError",
            Error::Io(_) => "InternalError",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Error::InvalidRequest(_) => 400,

            Error::Authentication(_) => 401,

            Error::NotFound(_) => 404,

            Error::Uniqueness(_) | Error::Conflict(_) => 409,

            Error::Validation { .. } => 422,

            Error::Connection(_) => 502,

            _ => 500,
        }
    }
}
