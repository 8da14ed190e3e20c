use crate::db::errors::DbError;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// The record store could not be queried
    #[error("Data access failed: {0}")]
    DataAccess(#[from] DbError),

    /// A store fetch did not complete within its bound
    #[error("Timed out after {elapsed:?} while {operation}")]
    Timeout {
        operation: String,
        elapsed: std::time::Duration,
    },

    /// The run was cancelled before the operation completed
    #[error("Cancelled while {operation}")]
    Cancelled { operation: String },

    /// A report template failed to render
    #[error("Failed to render {template}: {source}")]
    Render {
        template: String,
        #[source]
        source: minijinja::Error,
    },

    /// A report could not be delivered to a recipient
    #[error("Failed to deliver report to {recipient}: {message}")]
    Delivery { recipient: String, message: String },

    /// Invalid or inconsistent configuration
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// Report file could not be written
    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic internal error
    #[error("Failed to {operation}")]
    Internal { operation: String },
}

impl Error {
    /// Short machine-friendly category, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            Error::DataAccess(_) | Error::Timeout { .. } | Error::Cancelled { .. } => "data_access",
            Error::Render { .. } => "render",
            Error::Delivery { .. } => "delivery",
            Error::Config { .. } => "config",
            Error::Io { .. } => "io",
            Error::Internal { .. } => "internal",
        }
    }

    /// Whether the failure came from reading records (as opposed to rendering or delivering)
    pub fn is_data_access(&self) -> bool {
        self.kind() == "data_access"
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
