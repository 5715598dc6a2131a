//! Speech recognition as an event stream.
//!
//! A recognition run emits `Started` at most once, then at most one
//! `Result` or `Error`, and always finishes with `Ended`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::traits::SpeechToText;
use crate::error::{ClientError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechErrorKind {
    /// Recognition produced no text.
    NoSpeech,
    /// The audio source could not be read.
    Audio,
    /// The transcription service could not be reached.
    Network,
    /// The transcription service refused the request.
    Service,
}

impl SpeechErrorKind {
    fn from_error(err: &ClientError) -> Self {
        match err {
            ClientError::Network(_) => Self::Network,
            ClientError::Validation(_) => Self::Audio,
            _ => Self::Service,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Started,
    Result(String),
    Error(SpeechErrorKind),
    Ended,
}

/// Platform speech capability.
pub trait SpeechRecognizer: Send + Sync {
    fn is_available(&self) -> bool;

    /// Begin one recognition run in `language`.
    ///
    /// Fails with [`ClientError::Capability`] when recognition is unavailable.
    fn start(&self, language: &str) -> Result<mpsc::Receiver<SpeechEvent>>;
}

/// Recognizer for platforms without speech support.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableRecognizer;

impl SpeechRecognizer for UnavailableRecognizer {
    fn is_available(&self) -> bool {
        false
    }

    fn start(&self, _language: &str) -> Result<mpsc::Receiver<SpeechEvent>> {
        Err(ClientError::Capability(
            "speech recognition is not supported".into(),
        ))
    }
}

/// Recognizes a recorded audio clip through a transcription backend.
pub struct ClipRecognizer {
    stt: Arc<dyn SpeechToText>,
    clip: PathBuf,
}

impl ClipRecognizer {
    pub fn new(stt: Arc<dyn SpeechToText>, clip: impl Into<PathBuf>) -> Self {
        Self {
            stt,
            clip: clip.into(),
        }
    }

    fn format_of(path: &Path) -> String {
        path.extension()
            .and_then(|e| e.to_str())
            .unwrap_or("wav")
            .to_lowercase()
    }
}

impl SpeechRecognizer for ClipRecognizer {
    fn is_available(&self) -> bool {
        true
    }

    fn start(&self, language: &str) -> Result<mpsc::Receiver<SpeechEvent>> {
        let (tx, rx) = mpsc::channel(4);
        let stt = Arc::clone(&self.stt);
        let clip = self.clip.clone();
        let language = language.to_string();

        tokio::spawn(async move {
            let _ = tx.send(SpeechEvent::Started).await;

            let outcome = match tokio::fs::read(&clip).await {
                Ok(audio) => {
                    let format = Self::format_of(&clip);
                    match stt.transcribe(&audio, &format, &language).await {
                        Ok(text) if text.trim().is_empty() => {
                            SpeechEvent::Error(SpeechErrorKind::NoSpeech)
                        }
                        Ok(text) => SpeechEvent::Result(text.trim().to_string()),
                        Err(e) => {
                            tracing::warn!(kind = e.kind(), error = %e, "Transcription failed");
                            SpeechEvent::Error(SpeechErrorKind::from_error(&e))
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(clip = %clip.display(), error = %e, "Failed to read audio clip");
                    SpeechEvent::Error(SpeechErrorKind::Audio)
                }
            };

            let _ = tx.send(outcome).await;
            let _ = tx.send(SpeechEvent::Ended).await;
        });

        Ok(rx)
    }
}
