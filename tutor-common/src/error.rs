//! Error types shared by the Tutor crates.

use thiserror::Error;

/// Result type alias using the Tutor error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for input handling, files and configuration.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed user input (no subject, empty message, bad file)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an error with additional context.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for [`Error::InvalidInput`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Check if this is an input validation error, looking through context wrappers.
    pub fn is_invalid_input(&self) -> bool {
        match self {
            Self::InvalidInput(_) => true,
            Self::WithContext { source, .. } => source.is_invalid_input(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to any error type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_survives_context() {
        let err = Error::invalid("no subject selected").with_context("sending message");
        assert!(err.is_invalid_input());
        assert_eq!(
            err.to_string(),
            "sending message: Invalid input: no subject selected"
        );
    }

    #[test]
    fn io_errors_are_not_input_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let result: std::result::Result<(), _> = Err(io);
        let err = result.context("reading image").unwrap_err();
        assert!(!err.is_invalid_input());
        assert!(err.to_string().starts_with("reading image: IO error"));
    }
}
