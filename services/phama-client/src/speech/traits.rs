//! Speech-to-text trait definition.

use async_trait::async_trait;

use crate::error::Result;

/// Transcription backend for recorded audio.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe audio bytes to text.
    ///
    /// # Arguments
    /// * `audio_bytes` - Raw audio data
    /// * `format` - Audio format hint (e.g., "ogg", "mp3", "wav")
    /// * `language` - BCP-47 tag of the spoken language, empty for auto-detect
    async fn transcribe(&self, audio_bytes: &[u8], format: &str, language: &str) -> Result<String>;
}
