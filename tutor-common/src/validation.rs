//! Configuration validation.
//!
//! Checks that loaded configuration values are usable before any
//! client is built from them.

use thiserror::Error;

use crate::config::{BackendConfig, HistoryConfig, ImageConfig, ObservabilityConfig, TutorConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Validate for TutorConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors: Vec<ValidationError> = [
            self.backend.validate(),
            self.history.validate(),
            self.image.validate(),
            self.observability.validate(),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple(errors)),
        }
    }
}

impl Validate for BackendConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "backend.base_url".into(),
            });
        }
        let parsed = url::Url::parse(&self.base_url)
            .map_err(|e| ValidationError::invalid("backend.base_url", e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ValidationError::invalid(
                "backend.base_url",
                format!("unsupported scheme '{}'", parsed.scheme()),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ValidationError::invalid(
                "backend.max_attempts",
                "must be at least 1",
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::invalid(
                "backend.timeout_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Validate for HistoryConfig {
    fn validate(&self) -> ValidationResult<()> {
        // Exchanges are appended in pairs; an odd cap would split one.
        if self.max_turns < 2 || self.max_turns % 2 != 0 {
            return Err(ValidationError::invalid(
                "history.max_turns",
                format!("{} is not an even number >= 2", self.max_turns),
            ));
        }
        Ok(())
    }
}

impl Validate for ImageConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.max_bytes == 0 {
            return Err(ValidationError::invalid(
                "image.max_bytes",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ValidationError::invalid(
                "observability.log_format",
                format!("expected 'json' or 'pretty', got '{}'", self.log_format),
            ));
        }
        let level = self.log_level.to_lowercase();
        if !matches!(
            level.as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(ValidationError::invalid(
                "observability.log_level",
                format!("unknown level '{}'", self.log_level),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(TutorConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_attempts() {
        let mut config = TutorConfig::default();
        config.backend.max_attempts = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("backend.max_attempts"));
    }

    #[test]
    fn rejects_non_http_base_url() {
        let backend = BackendConfig {
            base_url: "ftp://tutor.local".into(),
            ..BackendConfig::default()
        };
        assert!(matches!(
            backend.validate(),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn rejects_odd_history_cap() {
        let history = HistoryConfig {
            max_turns: 41,
            ..HistoryConfig::default()
        };
        assert!(history.validate().is_err());
    }

    #[test]
    fn collects_multiple_errors() {
        let mut config = TutorConfig::default();
        config.backend.timeout_secs = 0;
        config.observability.log_format = "xml".into();
        match config.validate() {
            Err(ValidationError::Multiple(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected multiple errors, got {other:?}"),
        }
    }
}
