//! OpenAI-compatible transcription client (OpenAI, local Whisper servers, etc.).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use super::traits::SpeechToText;
use crate::error::{ClientError, Result};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Minimum audio size in bytes. Shorter clips are rejected by most providers.
const MIN_AUDIO_BYTES: usize = 1024;

pub struct CompatibleStt {
    api_key: String,
    client: Client,
    model: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl CompatibleStt {
    /// Create a client for any provider exposing `/v1/audio/transcriptions`.
    ///
    /// `api_key` may be empty for local services.
    pub fn new(api_key: String, base_url: &str, model: Option<String>) -> Self {
        Self {
            api_key,
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .connect_timeout(Duration::from_secs(10))
                .http1_only()
                .build()
                .unwrap_or_else(|_| Client::new()),
            model: model.unwrap_or_else(|| "whisper-1".to_string()),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Hosted OpenAI Whisper.
    pub fn openai(api_key: String, model: Option<String>) -> Self {
        Self::new(api_key, OPENAI_BASE_URL, model)
    }

    #[allow(clippy::match_same_arms)]
    fn file_extension(format: &str) -> &'static str {
        match format.to_lowercase().as_str() {
            "ogg" | "oga" | "opus" => "ogg",
            "mp3" => "mp3",
            "wav" => "wav",
            "m4a" | "mp4" => "m4a",
            "webm" => "webm",
            "flac" => "flac",
            _ => "wav",
        }
    }
}

/// Whisper takes ISO-639-1 codes, so `pa-IN` becomes `pa`.
pub fn whisper_language(tag: &str) -> Option<String> {
    let primary = tag.trim().split(['-', '_']).next().unwrap_or_default();
    if primary.is_empty() {
        None
    } else {
        Some(primary.to_lowercase())
    }
}

#[async_trait]
impl SpeechToText for CompatibleStt {
    async fn transcribe(&self, audio_bytes: &[u8], format: &str, language: &str) -> Result<String> {
        if audio_bytes.is_empty() {
            return Err(ClientError::Validation("cannot transcribe empty audio".into()));
        }
        if audio_bytes.len() < MIN_AUDIO_BYTES {
            return Err(ClientError::Validation(format!(
                "audio clip too short ({} bytes, minimum {MIN_AUDIO_BYTES})",
                audio_bytes.len()
            )));
        }

        let filename = format!("audio.{}", Self::file_extension(format));
        let part = Part::bytes(audio_bytes.to_vec())
            .file_name(filename)
            .mime_str("application/octet-stream")
            .map_err(|e| ClientError::Validation(e.to_string()))?;

        let mut form = Form::new()
            .text("model", self.model.clone())
            .part("file", part);
        if let Some(lang) = whisper_language(language) {
            form = form.text("language", lang);
        }

        let url = format!("{}/v1/audio/transcriptions", self.base_url);
        tracing::debug!(
            url = %url,
            model = %self.model,
            size = audio_bytes.len(),
            language,
            "Sending transcription request"
        );

        let mut request = self.client.post(&url).multipart(form);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, error = %error_text, "Transcription API error");
            return Err(ClientError::Capability(format!(
                "speech provider error ({status}): {}",
                error_text.trim()
            )));
        }

        let transcription: TranscriptionResponse = response.json().await?;
        tracing::debug!(chars = transcription.text.len(), "Transcription complete");
        Ok(transcription.text)
    }
}
