//! Error types for the codesight core library.
//!
//! Only invocation-level failures are errors. Per-file problems (syntax
//! errors, undecodable bytes, unresolvable imports) are recorded as values in
//! the code model and never surface through this enum.

/// Top-level error enum for the codesight core library.
#[derive(Debug, thiserror::Error)]
pub enum CodesightError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CodesightError {
    pub fn config(message: impl Into<String>) -> Self {
        CodesightError::Configuration(message.into())
    }

    /// True when the error was raised before any scan work started.
    pub fn is_configuration(&self) -> bool {
        matches!(self, CodesightError::Configuration(_))
    }
}

pub type CodesightResult<T> = Result<T, CodesightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_display() {
        let err = CodesightError::config("budget must not be negative");
        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "Configuration error: budget must not be negative"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CodesightError = io.into();
        assert!(!err.is_configuration());
        assert!(err.to_string().starts_with("IO error"));
    }
}
