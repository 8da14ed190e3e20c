use thiserror::Error;

/// Unified error type for record store operations that application code can handle
#[derive(Error, Debug)]
pub enum DbError {
    /// Entity not found by the given identifier
    #[error("Entity not found")]
    NotFound,

    /// The store could not be reached: pool exhausted or closed, I/O failure, bad connection URL
    #[error("Record store unavailable: {message}")]
    Unavailable { message: String },

    /// The database rejected the statement or returned rows that could not be decoded
    #[error("Query failed: {message}")]
    Query {
        /// SQLite extended result code, when the database reported one
        code: Option<String>,
        message: String,
    },

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DbError {
    /// Whether retrying later could plausibly succeed
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DbError::Unavailable { .. })
    }
}

/// Convert from sqlx::Error using sqlx's error categories
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => DbError::Unavailable {
                message: err.to_string(),
            },
            sqlx::Error::Io(io_err) => DbError::Unavailable {
                message: format!("I/O error: {io_err}"),
            },
            sqlx::Error::Configuration(cfg_err) => DbError::Unavailable {
                message: format!("invalid connection configuration: {cfg_err}"),
            },
            sqlx::Error::Database(db_err) => DbError::Query {
                code: db_err.code().map(|c| c.into_owned()),
                message: db_err.message().to_string(),
            },
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) | sqlx::Error::TypeNotFound { .. } => DbError::Query {
                code: None,
                message: err.to_string(),
            },
            sqlx::Error::Migrate(migrate_err) => DbError::Other(anyhow::anyhow!("migration failed: {migrate_err}")),
            // All other sqlx errors are non-recoverable - convert to anyhow with context
            _ => DbError::Other(anyhow::Error::from(err)),
        }
    }
}

/// Type alias for record store operation results
pub type Result<T> = std::result::Result<T, DbError>;
