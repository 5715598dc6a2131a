//! Configuration validation.
//!
//! Checks that required values are present and well-formed before the
//! client talks to the backend.

use thiserror::Error;

use crate::config::{BackendConfig, Config, ObservabilityConfig, SpeechConfig};

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

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.backend.validate() {
            errors.push(e);
        }
        if let Err(e) = self.speech.validate() {
            errors.push(e);
        }
        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
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

        let parsed = url::Url::parse(&self.base_url).map_err(|e| ValidationError::InvalidValue {
            field: "backend.base_url".into(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ValidationError::InvalidValue {
                field: "backend.base_url".into(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "backend.timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

impl Validate for SpeechConfig {
    fn validate(&self) -> ValidationResult<()> {
        let Some(provider) = self.provider.as_deref() else {
            return Ok(());
        };

        match provider.to_lowercase().as_str() {
            "openai" | "whisper" => Ok(()),
            "compatible" | "openai-compatible" | "local" => {
                if self.base_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
                    Err(ValidationError::MissingField {
                        field: "speech.base_url".into(),
                    })
                } else {
                    Ok(())
                }
            }
            other => Err(ValidationError::InvalidValue {
                field: "speech.provider".into(),
                reason: format!("unsupported provider '{other}'"),
            }),
        }
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test_case("" ; "empty")]
    #[test_case("not a url" ; "unparseable")]
    #[test_case("ftp://phama.example" ; "wrong scheme")]
    fn rejects_bad_base_url(url: &str) {
        let backend = BackendConfig {
            base_url: url.into(),
            ..Default::default()
        };
        assert!(backend.validate().is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        let backend = BackendConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        let err = backend.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn compatible_speech_requires_base_url() {
        let mut speech = SpeechConfig {
            provider: Some("local".into()),
            ..Default::default()
        };
        assert!(matches!(
            speech.validate(),
            Err(ValidationError::MissingField { .. })
        ));

        speech.base_url = Some("http://localhost:9000".into());
        assert!(speech.validate().is_ok());
    }

    #[test]
    fn unknown_speech_provider_rejected() {
        let speech = SpeechConfig {
            provider: Some("carrier-pigeon".into()),
            ..Default::default()
        };
        assert!(speech.validate().is_err());
    }

    #[test]
    fn collects_multiple_errors() {
        let mut config = Config::default();
        config.backend.timeout_secs = 0;
        config.observability.log_format = "xml".into();

        match config.validate() {
            Err(ValidationError::Multiple(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected Multiple, got {other:?}"),
        }
    }
}
