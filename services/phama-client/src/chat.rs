//! Page-level controller: the state and actions a chat front-end binds to.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use phama_common::Config;

use crate::credential::{CredentialStore, FileCredentialStore};
use crate::error::Result;
use crate::gateway::{Gateway, HttpGateway};
use crate::mediator::InputMediator;
use crate::models::{ImageFile, User};
use crate::notice::{self, Notice, NoticeSender};
use crate::session::{LogoutOutcome, SessionController, SessionEvent, SessionState};
use crate::speech::SpeechRecognizer;
use crate::transcript::{Transcript, TranscriptStore, TranscriptView};

/// Snapshot of everything the chat screen renders.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatState {
    pub authenticated: bool,
    pub user_name: Option<String>,
    pub messages: Transcript,
    pub is_listening: bool,
    pub draft: String,
}

impl ChatState {
    /// Transcript or welcome placeholder.
    pub fn view(&self) -> TranscriptView {
        TranscriptView::of(self.messages.clone(), self.user_name.as_deref())
    }
}

pub struct ChatPage {
    session: Arc<SessionController>,
    transcript: Arc<TranscriptStore>,
    mediator: InputMediator,
    notices: NoticeSender,
    user: watch::Sender<Option<User>>,
}

impl ChatPage {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        store: Arc<dyn CredentialStore>,
        language: impl Into<String>,
    ) -> Self {
        let session = Arc::new(SessionController::new(gateway, store));
        let transcript = Arc::new(TranscriptStore::new());
        let notices = NoticeSender::new();
        let mediator = InputMediator::new(
            Arc::clone(&session),
            Arc::clone(&transcript),
            notices.clone(),
            language,
        );
        let (user, _) = watch::channel(None);
        Self {
            session,
            transcript,
            mediator,
            notices,
            user,
        }
    }

    /// Wire the HTTP gateway and file-backed credentials from config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let gateway = HttpGateway::from_config(&config.backend)?;
        let store = FileCredentialStore::new(&config.data_dir());
        tracing::debug!(
            api_url = %gateway.base_url(),
            session_file = %store.path().display(),
            "Chat page configured"
        );
        Ok(Self::new(
            Arc::new(gateway),
            Arc::new(store),
            config.speech.language.clone(),
        ))
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub fn mediator(&self) -> &InputMediator {
        &self.mediator
    }

    /// Restore a persisted session and load it if present.
    pub async fn init(&self) -> SessionState {
        let state = self.session.init().await;
        if state == SessionState::Authenticated {
            self.activate().await;
        }
        state
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        if let Err(e) = self.session.login(username, password).await {
            self.notices.error(notice::LOGIN_FAILED);
            return Err(e);
        }
        self.activate().await;
        Ok(())
    }

    pub async fn signup(&self, name: &str, username: &str, password: &str) -> Result<User> {
        match self.session.signup(name, username, password).await {
            Ok(user) => {
                self.notices.info(notice::SIGNUP_OK);
                Ok(user)
            }
            Err(e) => {
                self.notices.error(notice::SIGNUP_FAILED);
                Err(e)
            }
        }
    }

    /// Load the profile and the transcript concurrently.
    pub async fn activate(&self) {
        let (user, messages) = tokio::join!(self.load_user(), self.mediator.refresh());
        if user.is_err() || messages.is_err() {
            self.reset_if_signed_out().await;
        }
    }

    async fn load_user(&self) -> Result<()> {
        let fetched = self
            .session
            .authorized_scoped(|gateway, token| async move {
                gateway.fetch_current_user(&token).await
            })
            .await;

        match fetched {
            Ok((user, generation)) => {
                self.session
                    .with_current(generation, || self.user.send_replace(Some(user)))
                    .await;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "Failed to load user profile");
                self.notices.report(&e, notice::FETCH_USER_FAILED);
                Err(e)
            }
        }
    }

    pub async fn refresh(&self) -> Result<bool> {
        let result = self.mediator.refresh().await;
        self.reset_if_signed_out().await;
        result
    }

    /// Delete the whole conversation. The transcript is cleared locally
    /// without refetching.
    pub async fn delete_all(&self) -> Result<()> {
        let deleted = self
            .session
            .authorized_scoped(|gateway, token| async move {
                gateway.delete_all_messages(&token).await
            })
            .await;

        match deleted {
            Ok((_, generation)) => {
                let transcript = Arc::clone(&self.transcript);
                self.session
                    .with_current(generation, move || transcript.clear())
                    .await;
                self.notices.info(notice::DELETE_OK);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "Delete failed");
                self.notices.report(&e, notice::DELETE_FAILED);
                self.reset_if_signed_out().await;
                Err(e)
            }
        }
    }

    pub async fn logout(&self) -> LogoutOutcome {
        let outcome = self.session.logout().await;
        if outcome.error.is_some() {
            self.notices.error(notice::LOGOUT_FAILED);
        }
        self.reset_view();
        outcome
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        self.mediator.set_draft(text);
    }

    pub async fn send_message(&self) -> Result<bool> {
        let result = self.mediator.send_message().await;
        self.reset_if_signed_out().await;
        result
    }

    /// Type `text` into the draft and send it.
    pub async fn send_text(&self, text: &str) -> Result<bool> {
        self.mediator.set_draft(text);
        self.send_message().await
    }

    pub async fn handle_voice_input(
        &self,
        recognizer: &dyn SpeechRecognizer,
    ) -> Result<Option<String>> {
        self.mediator.handle_voice_input(recognizer).await
    }

    pub async fn handle_image_select(&self, file: Option<ImageFile>) -> Result<bool> {
        let result = self.mediator.handle_image_select(file).await;
        self.reset_if_signed_out().await;
        result
    }

    pub async fn state(&self) -> ChatState {
        ChatState {
            authenticated: self.session.is_authenticated().await,
            user_name: self.user.borrow().as_ref().map(|u| u.name.clone()),
            messages: self.transcript.snapshot(),
            is_listening: self.mediator.is_listening(),
            draft: self.mediator.draft(),
        }
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn subscribe_session(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.subscribe_events()
    }

    pub fn subscribe_transcript(&self) -> watch::Receiver<Transcript> {
        self.transcript.subscribe()
    }

    async fn reset_if_signed_out(&self) {
        if !self.session.is_authenticated().await {
            self.reset_view();
        }
    }

    fn reset_view(&self) {
        self.transcript.clear();
        self.user.send_replace(None);
        self.mediator.clear_draft();
    }
}
