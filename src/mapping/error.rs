use thiserror::Error;

/// Errors surfaced by the mapping layer to its callers.
///
/// Cache failures never appear here: they are logged and treated as misses.
#[derive(Debug, Error)]
pub enum MappingError {
    /// Malformed input, rejected before any I/O.
    #[error("validation error on field '{field}': {message}")]
    Validation { field: String, message: String },
    #[error("mapping manager is not initialized")]
    NotInitialized,
    /// Failure reported by the mapping store or an entity existence oracle.
    #[error("store error: {0}")]
    Store(String),
    /// The active-row uniqueness constraint rejected an insert.
    #[error("mapping already exists: {0}")]
    Conflict(String),
    #[error("{0} timed out")]
    Timeout(&'static str),
}

impl MappingError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        MappingError::Validation { field: field.to_string(), message: message.into() }
    }
}

impl From<sqlx::Error> for MappingError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return MappingError::Conflict(db_err.message().to_string());
            }
        }
        MappingError::Store(err.to_string())
    }
}

pub type MappingResult<T> = Result<T, MappingError>;
