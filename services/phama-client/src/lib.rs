//! PHAMA Client - session and message orchestration for the PHAMA
//! agricultural assistant chat.
//!
//! This crate provides:
//! - A typed gateway over the chat backend's REST API
//! - Session token persistence and the authentication state machine
//! - The conversation transcript with change notification
//! - Input mediation for typed text, voice transcripts and image uploads
//! - A page-level controller that front-ends bind to

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod chat;
pub mod credential;
pub mod error;
pub mod gateway;
pub mod mediator;
pub mod models;
pub mod notice;
pub mod session;
pub mod speech;
pub mod transcript;

#[cfg(test)]
mod testing;

pub use chat::{ChatPage, ChatState};
pub use credential::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::{ClientError, Result};
pub use gateway::{Gateway, HttpGateway};
pub use mediator::InputMediator;
pub use models::{Ack, ImageFile, LoginResponse, Message, MessageId, SignupRequest, User};
pub use notice::{Notice, NoticeLevel};
pub use session::{LogoutOutcome, LogoutReason, SessionController, SessionEvent, SessionState};
pub use speech::{ClipRecognizer, SpeechEvent, SpeechRecognizer, UnavailableRecognizer};
pub use transcript::{welcome_message, Transcript, TranscriptStore, TranscriptView};
