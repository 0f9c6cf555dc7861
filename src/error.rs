use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Already processed: {0}")]
    AlreadyProcessed(String),

    #[error("Gateway error [{code}]: {message}")]
    Gateway { code: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        // Unique-constraint violations are the storage-level race-breaker for
        // duplicate order ids and double-claimed slots; callers see Conflict
        // and retry with a different slot.
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.kind() == sqlx::error::ErrorKind::UniqueViolation {
                return AppError::Conflict(db_err.message().to_string());
            }
        }
        AppError::Database(err.to_string())
    }
}
