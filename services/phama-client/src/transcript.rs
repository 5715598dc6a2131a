//! Client-side copy of the conversation.
//!
//! The transcript is rebuilt from the server's list on every refresh and
//! never edited in place. Readers hold cheap snapshots.

use std::ops::Deref;
use std::sync::Arc;

use tokio::sync::watch;

use crate::models::Message;

/// Name used in the greeting when the profile is not loaded.
pub const DEFAULT_USER_NAME: &str = "User";

/// Immutable view of the transcript at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    messages: Arc<Vec<Message>>,
}

impl Transcript {
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

impl Deref for Transcript {
    type Target = [Message];

    fn deref(&self) -> &[Message] {
        &self.messages
    }
}

/// What the conversation area shows.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptView {
    /// Empty transcript: greet the user instead.
    Welcome(String),
    Messages(Transcript),
}

impl TranscriptView {
    pub fn of(transcript: Transcript, user_name: Option<&str>) -> Self {
        if transcript.is_empty() {
            Self::Welcome(welcome_message(user_name))
        } else {
            Self::Messages(transcript)
        }
    }
}

/// Bilingual greeting shown in place of an empty transcript.
pub fn welcome_message(user_name: Option<&str>) -> String {
    let name = user_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_USER_NAME);
    format!(
        "ਸਤਿ ਸ਼੍ਰੀ ਅਕਾਲ! {name}, ਮੇਰਾ ਨਾਮ ਫਾਮਾ ਹੈ| ਤੁਸੀਂ ਮੈਨੂੰ ਪੰਜਾਬ ਵਿੱਚ ਖੇਤੀਬਾੜੀ ਬਾਰੇ ਆਪਣੇ ਸਵਾਲ ਪੁੱਛ ਸਕਦੇ ਹੋ|\n\
         Hello {name}, My name is PHAMA you can ask me any questions about agriculture in Punjab."
    )
}

/// Ordered message list with change notification.
pub struct TranscriptStore {
    tx: watch::Sender<Transcript>,
}

impl Default for TranscriptStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Transcript::default());
        Self { tx }
    }

    /// Replace the whole transcript, keeping server order.
    pub fn replace_all(&self, messages: Vec<Message>) {
        tracing::debug!(count = messages.len(), "Transcript replaced");
        self.tx.send_replace(Transcript {
            messages: Arc::new(messages),
        });
    }

    pub fn clear(&self) {
        self.replace_all(Vec::new());
    }

    pub fn snapshot(&self) -> Transcript {
        self.tx.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    /// Receiver that wakes on every replacement.
    pub fn subscribe(&self) -> watch::Receiver<Transcript> {
        self.tx.subscribe()
    }
}
