//! Plain-text rendering of the conversation.

use chrono::Local;

use phama_client::{Message, Notice, NoticeLevel, TranscriptView};

const ASSISTANT: &str = "PHAMA";
const USER: &str = "You";

pub fn message_line(message: &Message) -> String {
    let time = message.time_stamp.with_timezone(&Local).format("%H:%M");
    let speaker = if message.is_assistant() { ASSISTANT } else { USER };
    format!("[{time}] {speaker}: {}", message.msg)
}

pub fn view(view: &TranscriptView) -> String {
    match view {
        TranscriptView::Welcome(text) => format!("{text}\n"),
        TranscriptView::Messages(messages) => messages
            .iter()
            .map(|m| format!("{}\n", message_line(m)))
            .collect(),
    }
}

pub fn notice(notice: &Notice) -> String {
    match notice.level {
        NoticeLevel::Info => format!("[info] {}", notice.text),
        NoticeLevel::Error => format!("[error] {}", notice.text),
    }
}
