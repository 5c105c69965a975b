use thiserror::Error;

/// Main error type for ragchat
#[derive(Error, Debug)]
pub enum RagchatError {
    /// Index database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Sidecar (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding service errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Language model errors
    #[error("Language model error: {0}")]
    Llm(String),

    /// Document parse errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// File format the loader cannot read
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A metadata filter value that could not be parsed
    #[error("Invalid filter {key}={value:?}: {reason}")]
    InvalidFilter {
        key: String,
        value: String,
        reason: String,
    },

    /// Search errors
    #[error("Search error: {0}")]
    Search(String),

    /// File or index entry not found
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Convenient Result type using RagchatError
pub type Result<T> = std::result::Result<T, RagchatError>;

impl RagchatError {
    /// Shorthand used by the filter parser.
    pub fn invalid_filter(key: &str, value: &str, reason: impl Into<String>) -> Self {
        RagchatError::InvalidFilter {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RagchatError::Config("Test error".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_error_from_rusqlite() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: RagchatError = rusqlite_err.into();
        assert!(matches!(err, RagchatError::Database(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RagchatError = io_err.into();
        assert!(matches!(err, RagchatError::Io(_)));
    }

    #[test]
    fn test_invalid_filter_display() {
        let err = RagchatError::invalid_filter("file_size", "abc", "not an integer");
        let msg = err.to_string();
        assert!(msg.contains("file_size"));
        assert!(msg.contains("abc"));
        assert!(msg.contains("not an integer"));
    }
}
