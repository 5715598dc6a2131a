//! User-visible notices raised by action handlers.

use std::fmt;

use tokio::sync::broadcast;

use crate::error::ClientError;

pub const LOGIN_FAILED: &str = "Authentication failed. Please try again.";
pub const SIGNUP_OK: &str = "User created successfully! Please log in.";
pub const SIGNUP_FAILED: &str = "Error during signup. Please try again.";
pub const FETCH_USER_FAILED: &str = "Failed to fetch user data. Please log in again.";
pub const FETCH_MESSAGES_FAILED: &str = "Error fetching messages, try logging in again.";
pub const SEND_FAILED: &str = "Error sending message, try logging in again.";
pub const DELETE_OK: &str = "All messages have been deleted successfully!";
pub const DELETE_FAILED: &str = "Failed to delete messages, try logging in again.";
pub const LOGOUT_FAILED: &str = "Error during logout.";
pub const UPLOAD_FAILED: &str = "Error during uploading image.";
pub const SPEECH_UNSUPPORTED: &str = "Speech recognition is not supported on this device.";
pub const SPEECH_FAILED: &str = "Could not recognize speech. Please try again.";
pub const SESSION_EXPIRED: &str = "Your session has ended. Please log in again.";

const CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Broadcast channel for notices. Notices sent with no subscriber are dropped.
#[derive(Clone)]
pub struct NoticeSender {
    tx: broadcast::Sender<Notice>,
}

impl Default for NoticeSender {
    fn default() -> Self {
        Self::new()
    }
}

impl NoticeSender {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CAPACITY);
        Self { tx }
    }

    pub fn send(&self, notice: Notice) {
        tracing::debug!(level = ?notice.level, text = %notice.text, "Notice raised");
        let _ = self.tx.send(notice);
    }

    pub fn info(&self, text: impl Into<String>) {
        self.send(Notice::info(text));
    }

    pub fn error(&self, text: impl Into<String>) {
        self.send(Notice::error(text));
    }

    /// Surface a failed action.
    ///
    /// The rejection that ended the session gets the session notice. Calls
    /// that found no session raise nothing, so one expiry is reported once.
    pub fn report(&self, err: &ClientError, text: &str) {
        match err {
            ClientError::Auth(_) => self.error(SESSION_EXPIRED),
            ClientError::NotAuthenticated => {
                tracing::debug!(action = text, "Suppressed notice for signed-out session");
            }
            _ => self.error(text),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}
