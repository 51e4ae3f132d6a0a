//! Conversation state for one page
//!
//! Holds the message log shown to the user, a bounded history of executed
//! commands, the busy flag and the command currently being assembled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

use crate::intents::ParameterBag;

/// Number of past commands remembered
pub const HISTORY_LIMIT: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// One line of the conversation; never changed once appended
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A command that reached dispatch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub intent_id: String,
    pub params: ParameterBag,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(intent_id: &str, params: ParameterBag) -> Self {
        Self {
            intent_id: intent_id.to_string(),
            params,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationSession {
    messages: Vec<Message>,
    history: VecDeque<HistoryEntry>,
    history_limit: usize,
    busy: bool,
    selected_intent: Option<String>,
    params: ParameterBag,
    seed: String,
}

impl ConversationSession {
    /// Start a session holding only the seed bot message
    pub fn new(seed: &str) -> Self {
        Self::with_history_limit(seed, HISTORY_LIMIT)
    }

    pub fn with_history_limit(seed: &str, history_limit: usize) -> Self {
        Self {
            messages: vec![Message::new(Sender::Bot, seed)],
            history: VecDeque::with_capacity(history_limit),
            history_limit: history_limit.max(1),
            busy: false,
            selected_intent: None,
            params: ParameterBag::new(),
            seed: seed.to_string(),
        }
    }

    pub fn append_user(&mut self, text: impl Into<String>) -> &Message {
        self.push(Message::new(Sender::User, text))
    }

    pub fn append_bot(&mut self, text: impl Into<String>) -> &Message {
        self.push(Message::new(Sender::Bot, text))
    }

    fn push(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        // just pushed, never empty
        &self.messages[self.messages.len() - 1]
    }

    /// Remember a command, evicting the oldest past the limit
    pub fn push_history(&mut self, entry: HistoryEntry) {
        while self.history.len() >= self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(entry);
    }

    /// Back to the seed message with nothing in flight
    pub fn reset(&mut self) {
        self.messages.clear();
        self.messages.push(Message::new(Sender::Bot, self.seed.clone()));
        self.history.clear();
        self.busy = false;
        self.clear_selection();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Oldest first
    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    pub fn selected_intent(&self) -> Option<&str> {
        self.selected_intent.as_deref()
    }

    /// Select an intent for form-style entry; a different intent starts a fresh bag
    pub fn select_intent(&mut self, intent_id: &str) {
        if self.selected_intent.as_deref() != Some(intent_id) {
            self.params.clear();
        }
        self.selected_intent = Some(intent_id.to_string());
    }

    pub fn params(&self) -> &ParameterBag {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ParameterBag {
        &mut self.params
    }

    pub fn set_params(&mut self, params: ParameterBag) {
        self.params = params;
    }

    pub fn clear_selection(&mut self) {
        self.selected_intent = None;
        self.params.clear();
    }

    /// Message log as pretty JSON
    pub fn transcript_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_has_seed_only() {
        let session = ConversationSession::new("Hi! How can I help?");
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].sender, Sender::Bot);
        assert_eq!(session.history_len(), 0);
        assert!(!session.is_busy());
    }

    #[test]
    fn test_history_evicts_oldest() {
        let mut session = ConversationSession::new("hi");
        for i in 0..11 {
            session.push_history(HistoryEntry::new(&format!("cmd{}", i), ParameterBag::new()));
        }
        assert_eq!(session.history_len(), 10);
        let ids: Vec<&str> = session.history().map(|h| h.intent_id.as_str()).collect();
        assert_eq!(ids.first(), Some(&"cmd1"));
        assert_eq!(ids.last(), Some(&"cmd10"));
    }

    #[test]
    fn test_reset_restores_seed() {
        let mut session = ConversationSession::new("seed");
        for i in 0..25 {
            session.append_user(format!("u{}", i));
            session.append_bot(format!("b{}", i));
            session.push_history(HistoryEntry::new("x", ParameterBag::new()));
        }
        session.set_busy(true);
        session.select_intent("create_catalog");
        session.params_mut().set("name", "sales");

        session.reset();
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].text, "seed");
        assert_eq!(session.history_len(), 0);
        assert!(!session.is_busy());
        assert!(session.selected_intent().is_none());
        assert!(session.params().is_empty());
    }

    #[test]
    fn test_messages_keep_arrival_order() {
        let mut session = ConversationSession::new("seed");
        session.append_user("one");
        session.append_bot("two");
        let texts: Vec<&str> = session.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["seed", "one", "two"]);
        assert_eq!(session.last_message().map(|m| m.sender), Some(Sender::Bot));
    }

    #[test]
    fn test_reselecting_same_intent_keeps_params() {
        let mut session = ConversationSession::new("seed");
        session.select_intent("create_schema");
        session.params_mut().set("name", "s1");
        session.select_intent("create_schema");
        assert_eq!(session.params().get("name"), Some("s1"));
        session.select_intent("delete_schema");
        assert!(session.params().is_empty());
    }

    #[test]
    fn test_transcript_json() {
        let mut session = ConversationSession::new("seed");
        session.append_user("hello");
        let json: serde_json::Value = serde_json::from_str(&session.transcript_json().unwrap()).unwrap();
        assert_eq!(json[1]["sender"], "user");
        assert_eq!(json[1]["text"], "hello");
    }
}
