//! Voice input: speech recognition events backed by a transcription service.

mod compatible;
mod recognizer;
mod traits;

pub use compatible::{whisper_language, CompatibleStt, OPENAI_BASE_URL};
pub use recognizer::{
    ClipRecognizer, SpeechErrorKind, SpeechEvent, SpeechRecognizer, UnavailableRecognizer,
};
pub use traits::SpeechToText;

use std::sync::Arc;

use phama_common::SpeechConfig;

use crate::error::{ClientError, Result};

/// Build the transcription backend named in the config.
///
/// Returns `Ok(None)` when no provider is configured.
pub fn create_stt(config: &SpeechConfig) -> Result<Option<Arc<dyn SpeechToText>>> {
    let Some(provider) = config.provider.as_deref() else {
        return Ok(None);
    };
    let api_key = config.api_key.clone().unwrap_or_default();
    let model = Some(config.model.clone());
    let base_url = config.base_url.as_deref().filter(|u| !u.trim().is_empty());

    let stt: Arc<dyn SpeechToText> = match provider.to_lowercase().as_str() {
        "openai" | "whisper" => {
            if api_key.is_empty() {
                return Err(ClientError::Capability(
                    "speech.api_key is required for the openai provider".into(),
                ));
            }
            Arc::new(CompatibleStt::new(
                api_key,
                base_url.unwrap_or(OPENAI_BASE_URL),
                model,
            ))
        }
        "compatible" | "openai-compatible" | "local" => {
            let url = base_url.ok_or_else(|| {
                ClientError::Capability(format!(
                    "speech.base_url is required for the '{provider}' provider"
                ))
            })?;
            Arc::new(CompatibleStt::new(api_key, url, model))
        }
        _ => {
            return Err(ClientError::Capability(format!(
                "unsupported speech provider: {provider}. Supported: openai, compatible, local"
            )))
        }
    };

    tracing::debug!(provider, "Speech provider configured");
    Ok(Some(stt))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(
        provider: Option<&str>,
        api_key: Option<&str>,
        base_url: Option<&str>,
    ) -> SpeechConfig {
        SpeechConfig {
            provider: provider.map(String::from),
            api_key: api_key.map(String::from),
            base_url: base_url.map(String::from),
            ..SpeechConfig::default()
        }
    }

    #[test]
    fn no_provider_means_no_voice() {
        assert!(create_stt(&config(None, None, None)).unwrap().is_none());
    }

    #[test]
    fn openai_requires_key() {
        assert!(create_stt(&config(Some("openai"), None, None)).is_err());
        assert!(create_stt(&config(Some("OpenAI"), Some("sk-test"), None))
            .unwrap()
            .is_some());
    }

    #[test]
    fn local_requires_base_url() {
        let err = create_stt(&config(Some("local"), None, None)).err().unwrap();
        assert!(err.to_string().contains("base_url"));
        assert!(create_stt(&config(Some("local"), None, Some("http://localhost:9000")))
            .unwrap()
            .is_some());
    }

    #[test]
    fn unknown_provider_rejected() {
        let err = create_stt(&config(Some("carrier-pigeon"), None, None)).err().unwrap();
        assert_eq!(err.kind(), "capability");
    }
}
