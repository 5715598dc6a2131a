//! In-memory gateway used by the unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Notify;

use crate::error::{ClientError, Result};
use crate::gateway::Gateway;
use crate::models::{Ack, ImageFile, LoginResponse, Message, MessageId, SignupRequest, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Login,
    CreateUser,
    FetchUser,
    FetchMessages,
    SendMessage,
    DeleteAll,
    Logout,
    UploadImage,
}

pub fn message(id: i64, text: &str, assistant: bool) -> Message {
    Message {
        id: MessageId::Int(id),
        msg: text.to_string(),
        sender: assistant,
        time_stamp: Utc
            .with_ymd_and_hms(2024, 11, 2, 9, 0, 0)
            .single()
            .unwrap_or_default()
            + chrono::Duration::seconds(id),
    }
}

#[derive(Default)]
struct State {
    calls: Vec<(Op, Option<String>)>,
    logins: Vec<(String, String)>,
    messages: Vec<Message>,
    failures: HashMap<Op, ClientError>,
    gates: HashMap<Op, Arc<Notify>>,
    issued: u32,
    user_name: String,
}

/// Scripted backend. Sending a message appends the user's text and an
/// assistant reply to the server-side transcript.
pub struct FakeGateway {
    state: Mutex<State>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                user_name: "Alice".into(),
                ..State::default()
            }),
        }
    }

    pub fn with_messages(messages: Vec<Message>) -> Self {
        let gateway = Self::new();
        gateway.state.lock().unwrap().messages = messages;
        gateway
    }

    /// Make every call to `op` fail with `err` until [`recover`](Self::recover).
    pub fn fail(&self, op: Op, err: ClientError) {
        self.state.lock().unwrap().failures.insert(op, err);
    }

    pub fn recover(&self, op: Op) {
        self.state.lock().unwrap().failures.remove(&op);
    }

    /// Hold calls to `op` until the returned handle is notified.
    pub fn pause(&self, op: Op) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().unwrap().gates.insert(op, Arc::clone(&gate));
        gate
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn calls(&self) -> Vec<Op> {
        self.state.lock().unwrap().calls.iter().map(|(op, _)| *op).collect()
    }

    /// Tokens presented to `op`, in call order.
    pub fn tokens_for(&self, op: Op) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(o, _)| *o == op)
            .filter_map(|(_, token)| token.clone())
            .collect()
    }

    pub fn last_login(&self) -> Option<(String, String)> {
        self.state.lock().unwrap().logins.last().cloned()
    }

    pub fn server_messages(&self) -> Vec<Message> {
        self.state.lock().unwrap().messages.clone()
    }

    async fn enter(&self, op: Op, token: Option<&str>) -> Result<()> {
        let gate = {
            let mut state = self.state.lock().unwrap();
            state.calls.push((op, token.map(String::from)));
            state.gates.get(&op).cloned()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match self.state.lock().unwrap().failures.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn next_id(state: &State) -> i64 {
        state.messages.len() as i64 + 1
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        self.enter(Op::Login, None).await?;
        let mut state = self.state.lock().unwrap();
        state.logins.push((username.to_string(), password.to_string()));
        state.issued += 1;
        Ok(LoginResponse {
            access_token: format!("T{}", state.issued),
            token_type: Some("bearer".into()),
        })
    }

    async fn create_user(&self, request: &SignupRequest) -> Result<User> {
        self.enter(Op::CreateUser, None).await?;
        Ok(User {
            name: request.name.clone(),
        })
    }

    async fn fetch_current_user(&self, token: &str) -> Result<User> {
        self.enter(Op::FetchUser, Some(token)).await?;
        Ok(User {
            name: self.state.lock().unwrap().user_name.clone(),
        })
    }

    async fn fetch_all_messages(&self, token: &str) -> Result<Vec<Message>> {
        self.enter(Op::FetchMessages, Some(token)).await?;
        Ok(self.server_messages())
    }

    async fn send_message(&self, token: &str, text: &str) -> Result<Ack> {
        self.enter(Op::SendMessage, Some(token)).await?;
        let mut state = self.state.lock().unwrap();
        let id = Self::next_id(&state);
        state.messages.push(message(id, text, false));
        state.messages.push(message(id + 1, &format!("reply to {text}"), true));
        Ok(serde_json::json!({"status": "ok"}))
    }

    async fn delete_all_messages(&self, token: &str) -> Result<Ack> {
        self.enter(Op::DeleteAll, Some(token)).await?;
        self.state.lock().unwrap().messages.clear();
        Ok(serde_json::json!({"status": "deleted"}))
    }

    async fn logout(&self, token: &str) -> Result<Ack> {
        self.enter(Op::Logout, Some(token)).await?;
        Ok(Ack::Null)
    }

    async fn upload_image(&self, token: &str, image: &ImageFile) -> Result<Ack> {
        self.enter(Op::UploadImage, Some(token)).await?;
        let mut state = self.state.lock().unwrap();
        let id = Self::next_id(&state);
        state
            .messages
            .push(message(id, &format!("[image] {}", image.file_name), false));
        Ok(serde_json::json!({"status": "uploaded"}))
    }
}
