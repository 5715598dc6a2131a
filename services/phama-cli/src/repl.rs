//! Interactive chat loop.
//!
//! Plain lines are sent as messages. Slash commands cover the other actions.

use std::collections::HashSet;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use phama_client::speech::{create_stt, SpeechToText};
use phama_client::{
    ChatPage, ChatState, ClipRecognizer, ImageFile, MessageId, UnavailableRecognizer,
};
use phama_common::Config;

use crate::commands::drain_notices;
use crate::render;

const HELP: &str = "\
Type a message and press Enter to send it.
  /voice <clip>   transcribe an audio clip into the draft
  /send           send the current draft
  /image <path>   upload an image
  /history        show the conversation
  /clear          delete the conversation
  /logout         sign out
  /quit           leave the chat";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Empty,
    Send(String),
    SendDraft,
    Voice(PathBuf),
    Image(PathBuf),
    History,
    Clear,
    Logout,
    Help,
    Quit,
    Invalid(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        if !trimmed.starts_with('/') {
            return Self::Send(line.to_string());
        }

        let (command, arg) = trimmed
            .split_once(char::is_whitespace)
            .map_or((trimmed, ""), |(c, a)| (c, a.trim()));

        match (command, arg) {
            ("/quit" | "/exit", _) => Self::Quit,
            ("/help", _) => Self::Help,
            ("/send", _) => Self::SendDraft,
            ("/history", _) => Self::History,
            ("/clear", _) => Self::Clear,
            ("/logout", _) => Self::Logout,
            ("/voice", "") => Self::Invalid("usage: /voice <audio clip>".into()),
            ("/voice", path) => Self::Voice(PathBuf::from(path)),
            ("/image", "") => Self::Invalid("usage: /image <path>".into()),
            ("/image", path) => Self::Image(PathBuf::from(path)),
            (other, _) => Self::Invalid(format!("unknown command {other}, try /help")),
        }
    }
}

fn prompt() -> Result<()> {
    print!("> ");
    io::stdout().flush()?;
    Ok(())
}

/// Message ids already on the terminal.
#[derive(Debug, Default)]
struct Screen {
    shown: HashSet<MessageId>,
}

impl Screen {
    /// Text that brings the terminal up to date with `state`.
    ///
    /// While every shown message is still present only unseen ones are
    /// printed. Anything else redraws the whole view.
    fn update(&mut self, state: &ChatState) -> String {
        let messages = state.messages.messages();
        let current: HashSet<MessageId> = messages.iter().map(|m| m.id.clone()).collect();

        let text = if !self.shown.is_empty() && self.shown.is_subset(&current) {
            messages
                .iter()
                .filter(|m| !self.shown.contains(&m.id))
                .map(|m| format!("{}\n", render::message_line(m)))
                .collect()
        } else {
            render::view(&state.view())
        };

        self.shown = current;
        text
    }

    fn redraw(&mut self, state: &ChatState) -> String {
        self.shown.clear();
        self.update(state)
    }
}

async fn print_update(page: &ChatPage, screen: &mut Screen) {
    print!("{}", screen.update(&page.state().await));
}

pub async fn run(page: &ChatPage, config: &Config) -> Result<()> {
    if !page.session().is_authenticated().await {
        println!("Not logged in. Run `phama login --username <name>` first.");
        return Ok(());
    }

    let stt: Option<Arc<dyn SpeechToText>> = match create_stt(&config.speech) {
        Ok(stt) => stt,
        Err(e) => {
            tracing::warn!(error = %e, "Voice input disabled");
            None
        }
    };

    let mut notices = page.subscribe_notices();
    println!("{HELP}\n");
    let mut screen = Screen::default();
    print_update(page, &mut screen).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt()?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        match ReplCommand::parse(&line) {
            ReplCommand::Empty => continue,
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Invalid(message) => println!("{message}"),
            ReplCommand::Send(text) => {
                if page.send_text(&text).await.unwrap_or(false) {
                    print_update(page, &mut screen).await;
                }
            }
            ReplCommand::SendDraft => {
                if page.send_message().await.unwrap_or(false) {
                    print_update(page, &mut screen).await;
                } else if page.mediator().draft().trim().is_empty() {
                    println!("Draft is empty.");
                }
            }
            ReplCommand::Voice(clip) => {
                let recognized = match &stt {
                    Some(stt) => {
                        page.handle_voice_input(&ClipRecognizer::new(Arc::clone(stt), clip))
                            .await
                    }
                    None => page.handle_voice_input(&UnavailableRecognizer).await,
                };
                if let Ok(Some(text)) = recognized {
                    println!("Draft: {text}\n(/send to send it)");
                }
            }
            ReplCommand::Image(path) => match ImageFile::from_path(&path).await {
                Ok(image) => {
                    if page.handle_image_select(Some(image)).await.unwrap_or(false) {
                        print_update(page, &mut screen).await;
                    }
                }
                Err(e) => println!("{e}"),
            },
            ReplCommand::History => print!("{}", screen.redraw(&page.state().await)),
            ReplCommand::Clear => {
                if page.delete_all().await.is_ok() {
                    print_update(page, &mut screen).await;
                }
            }
            ReplCommand::Logout => {
                page.logout().await;
                drain_notices(&mut notices);
                println!("Logged out.");
                break;
            }
        }

        drain_notices(&mut notices);
        if !page.session().is_authenticated().await {
            println!("Session ended. Run `phama login` to sign in again.");
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use phama_client::{Message, TranscriptStore};
    use test_case::test_case;

    fn message(id: i64, text: &str) -> Message {
        Message {
            id: MessageId::Int(id),
            msg: text.into(),
            sender: id % 2 == 0,
            time_stamp: Utc::now(),
        }
    }

    fn state(messages: Vec<Message>) -> ChatState {
        let store = TranscriptStore::new();
        store.replace_all(messages);
        ChatState {
            authenticated: true,
            user_name: Some("Harjit".into()),
            messages: store.snapshot(),
            is_listening: false,
            draft: String::new(),
        }
    }

    #[test]
    fn screen_prints_only_new_messages() {
        let mut screen = Screen::default();
        let first = screen.update(&state(vec![message(1, "a"), message(2, "b")]));
        assert_eq!(first.lines().count(), 2);

        let next = screen.update(&state(vec![
            message(1, "a"),
            message(2, "b"),
            message(3, "c"),
            message(4, "d"),
        ]));
        assert_eq!(next.lines().count(), 2);
        assert!(next.contains(": c"));
        assert!(next.contains(": d"));
    }

    #[test]
    fn screen_unchanged_transcript_prints_nothing() {
        let mut screen = Screen::default();
        screen.update(&state(vec![message(1, "a"), message(2, "b")]));
        assert_eq!(screen.update(&state(vec![message(1, "a"), message(2, "b")])), "");
    }

    #[test]
    fn screen_redraws_when_shown_message_disappears() {
        let mut screen = Screen::default();
        screen.update(&state(vec![message(1, "a"), message(2, "b")]));

        // Same length, different contents
        let text = screen.update(&state(vec![message(2, "b"), message(5, "e")]));
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains(": b"));

        let cleared = screen.update(&state(Vec::new()));
        assert!(cleared.contains("Harjit"));
    }

    #[test]
    fn screen_redraw_prints_everything() {
        let mut screen = Screen::default();
        let all = state(vec![message(1, "a"), message(2, "b")]);
        screen.update(&all);
        assert_eq!(screen.redraw(&all).lines().count(), 2);
    }

    #[test_case("", ReplCommand::Empty ; "empty")]
    #[test_case("   ", ReplCommand::Empty ; "blank")]
    #[test_case("/quit", ReplCommand::Quit ; "quit")]
    #[test_case("/exit", ReplCommand::Quit ; "exit")]
    #[test_case("/send", ReplCommand::SendDraft ; "send draft")]
    #[test_case("/history", ReplCommand::History ; "history")]
    #[test_case("/clear", ReplCommand::Clear ; "clear")]
    #[test_case("/logout", ReplCommand::Logout ; "logout")]
    #[test_case("/voice clips/q.ogg", ReplCommand::Voice("clips/q.ogg".into()) ; "voice")]
    #[test_case("/image  leaf.jpg ", ReplCommand::Image("leaf.jpg".into()) ; "image")]
    fn parse_commands(line: &str, expected: ReplCommand) {
        assert_eq!(ReplCommand::parse(line), expected);
    }

    #[test]
    fn plain_text_kept_verbatim() {
        assert_eq!(
            ReplCommand::parse("  ਕਣਕ ਨੂੰ ਖਾਦ ਕਦੋਂ ਪਾਈਏ?  \n"),
            ReplCommand::Send("  ਕਣਕ ਨੂੰ ਖਾਦ ਕਦੋਂ ਪਾਈਏ?  ".into())
        );
    }

    #[test]
    fn missing_arguments() {
        assert!(matches!(ReplCommand::parse("/voice"), ReplCommand::Invalid(_)));
        assert!(matches!(ReplCommand::parse("/image   "), ReplCommand::Invalid(_)));
    }

    #[test]
    fn unknown_command() {
        match ReplCommand::parse("/weather") {
            ReplCommand::Invalid(msg) => assert!(msg.contains("/weather")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
