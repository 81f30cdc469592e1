use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize)]
pub enum AppError {
    Internal(String),
    NotFound(String),
    ValidationError(String),
    Conflict(String),
    DatabaseError(String),
    PdfError(String),
    ConfigError(String),
    IoError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::PdfError(msg) => write!(f, "PDF error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Config error: {}", msg),
            AppError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl AppError {
    /// Maps a sqlx failure, keeping constraint violations distinguishable
    /// from plain database faults.
    pub fn from_sqlx(context: &str, err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return AppError::Conflict(format!("{context}: {}", db_err.message()));
            }
            if db_err.is_foreign_key_violation()
                || db_err.is_check_violation()
                || matches!(db_err.kind(), sqlx::error::ErrorKind::NotNullViolation)
            {
                return AppError::ValidationError(format!("{context}: {}", db_err.message()));
            }
        }
        AppError::DatabaseError(format!("{context}: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes_kind() {
        assert_eq!(
            AppError::NotFound("view 'x'".to_string()).to_string(),
            "Not found: view 'x'"
        );
        assert_eq!(
            AppError::Conflict("duplicate".to_string()).to_string(),
            "Conflict: duplicate"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, AppError::IoError(msg) if msg.contains("gone")));
    }
}
