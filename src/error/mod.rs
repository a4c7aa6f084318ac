use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Assessment not found: {assessment_id}")]
    AssessmentNotFound { assessment_id: String },

    #[error("Invalid row in {table}: {message}")]
    InvalidRow { table: String, message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Errors raised by the friction analysis engine.
///
/// A withheld disclosure is not an error; see
/// [`Withheld`](crate::analysis::Withheld).
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Collaborator-side data is inconsistent (unresolvable references,
    /// tree cycles, non-leaf response units). Always surfaced.
    #[error("Data integrity error: {message}")]
    DataIntegrity { message: String },

    /// A configuration table row is invalid.
    #[error("Configuration error in {table} row {row}: {message}")]
    Configuration {
        table: String,
        row: usize,
        message: String,
    },

    /// A configuration table is missing rows it must contain.
    #[error("Configuration error in {table}: {message}")]
    IncompleteTable { table: String, message: String },

    #[error("Unknown unit: {unit_id}")]
    UnknownUnit { unit_id: String },

    #[error("Validation failed: {field} - {reason}")]
    Validation { field: String, reason: String },
}

impl AnalysisError {
    pub(crate) fn integrity(message: impl Into<String>) -> Self {
        AnalysisError::DataIntegrity {
            message: message.into(),
        }
    }

    pub(crate) fn configuration(
        table: impl Into<String>,
        row: usize,
        message: impl Into<String>,
    ) -> Self {
        AnalysisError::Configuration {
            table: table.into(),
            row,
            message: message.into(),
        }
    }

    pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AnalysisError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for analysis operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;
