use thiserror::Error;

/// Main error type for MOSDAC Assist
#[derive(Error, Debug)]
pub enum AssistError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persisted knowledge snapshot could not be parsed or failed validation
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Invalid extraction pattern table or regex
    #[error("Pattern error: {0}")]
    Pattern(String),

    /// Delegated answer generation failed
    #[error("Generation error: {0}")]
    Generation(String),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Graph export errors
    #[error("Export error: {0}")]
    Export(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using AssistError
pub type Result<T> = std::result::Result<T, AssistError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AssistError::Config("Test error".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_error_from_rusqlite() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: AssistError = rusqlite_err.into();
        assert!(matches!(err, AssistError::Database(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AssistError = io_err.into();
        assert!(matches!(err, AssistError::Io(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: AssistError = json_err.into();
        assert!(matches!(err, AssistError::Serialization(_)));
        assert!(err.to_string().starts_with("Serialization error"));
    }
}
