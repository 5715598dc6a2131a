//! Turns typed text, voice transcripts and picked images into backend calls.
//!
//! Every mutation is followed by a transcript refresh, issued only after the
//! mutation has completed.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{ClientError, Result};
use crate::models::ImageFile;
use crate::notice::{self, NoticeSender};
use crate::session::SessionController;
use crate::speech::{SpeechEvent, SpeechRecognizer};
use crate::transcript::TranscriptStore;

/// Default recognition language.
pub const DEFAULT_LANGUAGE: &str = "pa-IN";

pub struct InputMediator {
    session: Arc<SessionController>,
    transcript: Arc<TranscriptStore>,
    notices: NoticeSender,
    language: String,
    draft: watch::Sender<String>,
    listening: watch::Sender<bool>,
}

impl InputMediator {
    pub fn new(
        session: Arc<SessionController>,
        transcript: Arc<TranscriptStore>,
        notices: NoticeSender,
        language: impl Into<String>,
    ) -> Self {
        let (draft, _) = watch::channel(String::new());
        let (listening, _) = watch::channel(false);
        Self {
            session,
            transcript,
            notices,
            language: language.into(),
            draft,
            listening,
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        self.draft.send_replace(text.into());
    }

    pub fn draft(&self) -> String {
        self.draft.borrow().clone()
    }

    pub fn clear_draft(&self) {
        self.draft.send_replace(String::new());
    }

    pub fn subscribe_draft(&self) -> watch::Receiver<String> {
        self.draft.subscribe()
    }

    pub fn is_listening(&self) -> bool {
        *self.listening.borrow()
    }

    pub fn subscribe_listening(&self) -> watch::Receiver<bool> {
        self.listening.subscribe()
    }

    /// Send the current draft.
    ///
    /// Returns `Ok(false)` without any network call when the draft is blank.
    pub async fn send_message(&self) -> Result<bool> {
        let text = self.draft();
        self.send_text(&text).await
    }

    /// Send `text` verbatim, then refresh the transcript.
    pub async fn send_text(&self, text: &str) -> Result<bool> {
        if text.trim().is_empty() {
            return Ok(false);
        }

        let result = self
            .session
            .authorized(|gateway, token| {
                let text = text.to_string();
                async move { gateway.send_message(&token, &text).await }
            })
            .await;

        if let Err(e) = result {
            tracing::warn!(kind = e.kind(), error = %e, "Send failed");
            self.notices.report(&e, notice::SEND_FAILED);
            return Err(e);
        }

        self.draft.send_if_modified(|draft| {
            if draft.as_str() == text {
                draft.clear();
                true
            } else {
                false
            }
        });

        self.refresh().await?;
        Ok(true)
    }

    /// Replace the transcript with the server's list.
    ///
    /// Returns `Ok(false)` when the session ended while the fetch was in
    /// flight and the result was dropped.
    pub async fn refresh(&self) -> Result<bool> {
        let fetched = self
            .session
            .authorized_scoped(|gateway, token| async move {
                gateway.fetch_all_messages(&token).await
            })
            .await;

        match fetched {
            Ok((messages, generation)) => {
                let transcript = Arc::clone(&self.transcript);
                let applied = self
                    .session
                    .with_current(generation, move || transcript.replace_all(messages))
                    .await;
                Ok(applied.is_some())
            }
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "Transcript refresh failed");
                self.notices.report(&e, notice::FETCH_MESSAGES_FAILED);
                Err(e)
            }
        }
    }

    /// Run one recognition pass; a result replaces the draft.
    ///
    /// Returns the recognized text, or `None` if recognition produced none.
    pub async fn handle_voice_input(
        &self,
        recognizer: &dyn SpeechRecognizer,
    ) -> Result<Option<String>> {
        if !recognizer.is_available() {
            self.notices.error(notice::SPEECH_UNSUPPORTED);
            return Err(ClientError::Capability(
                "speech recognition is not supported".into(),
            ));
        }

        let mut events = match recognizer.start(&self.language) {
            Ok(events) => events,
            Err(e) => {
                self.notices.error(notice::SPEECH_UNSUPPORTED);
                return Err(e);
            }
        };

        let mut started = false;
        let mut recognized = None;
        while let Some(event) = events.recv().await {
            match event {
                SpeechEvent::Started if !started => {
                    started = true;
                    self.listening.send_replace(true);
                    tracing::debug!(language = %self.language, "Listening");
                }
                SpeechEvent::Started => {
                    tracing::debug!("Ignoring repeated start event");
                }
                SpeechEvent::Result(text) => {
                    self.listening.send_replace(false);
                    self.set_draft(text.clone());
                    recognized = Some(text);
                }
                SpeechEvent::Error(kind) => {
                    self.listening.send_replace(false);
                    tracing::warn!(?kind, "Speech recognition failed");
                    self.notices.error(notice::SPEECH_FAILED);
                }
                SpeechEvent::Ended => {
                    self.listening.send_replace(false);
                    break;
                }
            }
        }

        self.listening.send_replace(false);
        Ok(recognized)
    }

    /// Upload a picked image, then refresh. No file is a no-op.
    pub async fn handle_image_select(&self, file: Option<ImageFile>) -> Result<bool> {
        let Some(image) = file else {
            return Ok(false);
        };

        let result = self
            .session
            .authorized(|gateway, token| async move { gateway.upload_image(&token, &image).await })
            .await;

        if let Err(e) = result {
            tracing::warn!(kind = e.kind(), error = %e, "Image upload failed");
            self.notices.report(&e, notice::UPLOAD_FAILED);
            return Err(e);
        }

        self.refresh().await?;
        Ok(true)
    }
}
