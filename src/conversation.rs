use chrono::Local;
use serde::Serialize;
use uuid::Uuid;

use crate::classifier::is_structured_summary;
use crate::llm_interaction::{ChatMessage, ChatRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub id: Uuid,
    pub timestamp: String,
    pub sender: Sender,
    pub text: String,
    pub is_structured_summary: bool,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text.into(), false)
    }

    /// Assistant turns are flagged as summaries when they carry a JSON fence.
    pub fn assistant(text: impl Into<String>) -> Self {
        let text = text.into();
        let summary = is_structured_summary(&text);
        Self::new(Sender::Assistant, text, summary)
    }

    fn new(sender: Sender, text: String, is_structured_summary: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            sender,
            text,
            is_structured_summary,
        }
    }

    pub fn to_chat_message(&self) -> ChatMessage {
        let role = match self.sender {
            Sender::User => ChatRole::User,
            Sender::Assistant => ChatRole::Assistant,
        };
        ChatMessage::new(role, self.text.clone())
    }
}

/// Append-only, in-memory transcript for one session.
#[derive(Debug, Default, Clone)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn latest_assistant(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|turn| turn.sender == Sender::Assistant)
    }

    /// The transcript in provider wire form, oldest first.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.turns.iter().map(Turn::to_chat_message).collect()
    }
}
