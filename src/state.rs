//! UI-agnostic conversation state
//!
//! The chat session owns the transcript, the draft being typed and the
//! pending flag. Both the TUI and the one-shot `ask` command drive the
//! same send action through it.

use serde::{Deserialize, Serialize};

use crate::client::{AskError, AskResponse};

/// Shown in place of an answer when the exchange fails for any reason.
pub const FALLBACK_MESSAGE: &str =
    "Sorry, something went wrong while contacting the server. Please try again.";

pub const DEFAULT_GREETING: &str = "Hello! I am your document assistant. Ask me anything and \
I will answer using the documents that have been provided.";

pub const DEFAULT_MAX_INPUT_CHARS: usize = 2000;

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            sources: None,
        }
    }

    pub fn assistant(content: impl Into<String>, sources: Option<Vec<String>>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            sources: sources.filter(|s| !s.is_empty()),
        }
    }

    pub fn fallback() -> Self {
        Self::assistant(FALLBACK_MESSAGE, None)
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Text being typed, with a cursor measured in characters.
#[derive(Debug, Clone)]
pub struct Draft {
    text: String,
    cursor: usize,
    max_chars: usize,
}

impl Draft {
    pub fn new(max_chars: usize) -> Self {
        Self {
            text: String::new(),
            cursor: 0,
            max_chars,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Returns false when the draft is already at its length limit.
    pub fn insert(&mut self, c: char) -> bool {
        if self.char_count() >= self.max_chars {
            return false;
        }
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
        true
    }

    /// Inserts pasted text at the cursor with line breaks flattened to
    /// spaces. Stops at the length limit and returns how many characters
    /// were taken.
    pub fn insert_str(&mut self, text: &str) -> usize {
        let room = self.max_chars.saturating_sub(self.char_count());
        let flattened: String = text
            .chars()
            .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
            .take(room)
            .collect();
        let inserted = flattened.chars().count();
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert_str(byte_pos, &flattened);
        self.cursor += inserted;
        inserted
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.char_count() {
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.char_count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.char_count();
    }

    /// Replaces the whole draft, cursor at the end. Returns false and
    /// leaves the draft untouched if `text` is over the length limit.
    pub fn set(&mut self, text: &str) -> bool {
        let count = text.chars().count();
        if count > self.max_chars {
            return false;
        }
        self.text = text.to_string();
        self.cursor = count;
        true
    }

    /// Empties the draft and hands back what was typed.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }
}

/// Append-only transcript plus the draft and the pending flag.
#[derive(Debug, Clone)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    pub draft: Draft,
    pending: bool,
}

impl ChatSession {
    /// An empty greeting starts the conversation with no messages.
    pub fn new(greeting: &str, max_input_chars: usize) -> Self {
        let mut messages = Vec::new();
        if !greeting.trim().is_empty() {
            messages.push(ChatMessage::assistant(greeting, None));
        }
        Self {
            messages,
            draft: Draft::new(max_input_chars),
            pending: false,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Whether the transcript still holds nothing but the greeting.
    pub fn is_fresh(&self) -> bool {
        self.messages.len() <= 1 && self.messages.iter().all(|m| m.role == ChatRole::Assistant)
    }

    /// Accepts the draft as a question if it is non-blank and nothing is
    /// in flight. On acceptance the user message is appended, the draft is
    /// cleared, pending is set and the raw question text is returned for
    /// the caller to send.
    pub fn begin_send(&mut self) -> Option<String> {
        if self.pending || self.draft.is_blank() {
            return None;
        }
        let question = self.draft.take();
        self.messages.push(ChatMessage::user(question.clone()));
        self.pending = true;
        Some(question)
    }

    /// Applies the outcome of the in-flight request. Returns false when no
    /// request was pending, in which case nothing changes.
    pub fn complete(&mut self, outcome: &Result<AskResponse, AskError>) -> bool {
        if !self.pending {
            return false;
        }
        let message = match outcome {
            Ok(response) => ChatMessage::assistant(&response.answer, response.sources.clone()),
            Err(_) => ChatMessage::fallback(),
        };
        self.messages.push(message);
        self.pending = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ChatSession {
        ChatSession::new(DEFAULT_GREETING, DEFAULT_MAX_INPUT_CHARS)
    }

    fn type_text(session: &mut ChatSession, text: &str) {
        for c in text.chars() {
            session.draft.insert(c);
        }
    }

    #[test]
    fn test_new_session_starts_with_greeting() {
        let s = session();
        assert_eq!(s.messages().len(), 1);
        assert_eq!(s.messages()[0].role, ChatRole::Assistant);
        assert!(s.is_fresh());
        assert!(!s.is_pending());
    }

    #[test]
    fn test_empty_greeting_starts_empty() {
        let s = ChatSession::new("  ", DEFAULT_MAX_INPUT_CHARS);
        assert!(s.messages().is_empty());
        assert!(s.is_fresh());
    }

    #[test]
    fn test_blank_draft_is_not_sent() {
        let mut s = session();
        assert_eq!(s.begin_send(), None);
        type_text(&mut s, "   \t ");
        assert_eq!(s.begin_send(), None);
        assert_eq!(s.messages().len(), 1);
        assert!(!s.is_pending());
        assert_eq!(s.draft.text(), "   \t ");
    }

    #[test]
    fn test_begin_send_appends_raw_text_and_clears_draft() {
        let mut s = session();
        type_text(&mut s, "  What is in the report? ");
        let question = s.begin_send();
        assert_eq!(question.as_deref(), Some("  What is in the report? "));
        assert_eq!(s.draft.text(), "");
        assert_eq!(s.draft.cursor(), 0);
        assert!(s.is_pending());
        let last = s.messages().last().unwrap();
        assert_eq!(last.role, ChatRole::User);
        assert_eq!(last.content, "  What is in the report? ");
        assert!(!s.is_fresh());
    }

    #[test]
    fn test_send_while_pending_is_rejected() {
        let mut s = session();
        type_text(&mut s, "first");
        assert!(s.begin_send().is_some());
        type_text(&mut s, "second");
        assert_eq!(s.begin_send(), None);
        assert_eq!(s.messages().len(), 2);
        assert_eq!(s.draft.text(), "second");
    }

    #[test]
    fn test_complete_success_appends_answer_with_sources() {
        let mut s = session();
        type_text(&mut s, "q");
        s.begin_send();
        let outcome = Ok(AskResponse {
            answer: "X".to_string(),
            sources: Some(vec!["a.pdf".to_string()]),
        });
        assert!(s.complete(&outcome));
        let last = s.messages().last().unwrap();
        assert_eq!(last.role, ChatRole::Assistant);
        assert_eq!(last.content, "X");
        assert_eq!(last.sources, Some(vec!["a.pdf".to_string()]));
        assert!(!s.is_pending());
    }

    #[test]
    fn test_complete_failure_appends_fallback() {
        let mut s = session();
        type_text(&mut s, "q");
        s.begin_send();
        let outcome = Err(AskError::Status(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
        assert!(s.complete(&outcome));
        let last = s.messages().last().unwrap();
        assert_eq!(last.content, FALLBACK_MESSAGE);
        assert_eq!(last.sources, None);
        assert!(!s.is_pending());
        assert!(s.draft.text().is_empty());
    }

    #[test]
    fn test_complete_without_pending_is_ignored() {
        let mut s = session();
        let outcome = Ok(AskResponse {
            answer: "stray".to_string(),
            sources: None,
        });
        assert!(!s.complete(&outcome));
        assert_eq!(s.messages().len(), 1);
    }

    #[test]
    fn test_empty_source_list_is_dropped() {
        let msg = ChatMessage::assistant("answer", Some(Vec::new()));
        assert_eq!(msg.sources, None);
    }

    #[test]
    fn test_earlier_messages_are_never_rewritten() {
        let mut s = session();
        let mut snapshots: Vec<Vec<ChatMessage>> = Vec::new();
        for (i, answer) in ["one", "two", "three"].iter().enumerate() {
            type_text(&mut s, &format!("question {}", i));
            s.begin_send();
            let outcome = if i == 1 {
                Err(AskError::Decode("missing field `answer`".to_string()))
            } else {
                Ok(AskResponse {
                    answer: answer.to_string(),
                    sources: None,
                })
            };
            s.complete(&outcome);
            snapshots.push(s.messages().to_vec());
        }
        for pair in snapshots.windows(2) {
            let (before, after) = (&pair[0], &pair[1]);
            assert_eq!(after.len(), before.len() + 2);
            assert_eq!(&after[..before.len()], before.as_slice());
        }
    }

    #[test]
    fn test_draft_editing_is_utf8_safe() {
        let mut d = Draft::new(DEFAULT_MAX_INPUT_CHARS);
        for c in "héllo".chars() {
            d.insert(c);
        }
        d.move_left();
        d.move_left();
        d.insert('ü');
        assert_eq!(d.text(), "hélülo");
        d.backspace();
        d.backspace();
        assert_eq!(d.text(), "hélo");
        d.move_home();
        d.delete();
        assert_eq!(d.text(), "élo");
        d.move_end();
        assert_eq!(d.cursor(), 3);
        d.move_right();
        assert_eq!(d.cursor(), 3);
    }

    #[test]
    fn test_draft_respects_length_limit() {
        let mut d = Draft::new(3);
        assert!(d.insert('a'));
        assert!(d.insert('b'));
        assert!(d.insert('c'));
        assert!(!d.insert('d'));
        assert_eq!(d.text(), "abc");
        assert_eq!(d.char_count(), 3);
    }

    #[test]
    fn test_draft_insert_str_flattens_line_breaks() {
        let mut d = Draft::new(DEFAULT_MAX_INPUT_CHARS);
        d.insert_str("[]");
        d.move_left();
        assert_eq!(d.insert_str("first\r\nsecond\nthird"), 19);
        assert_eq!(d.text(), "[first  second third]");
        assert_eq!(d.cursor(), 20);
    }

    #[test]
    fn test_draft_insert_str_stops_at_limit() {
        let mut d = Draft::new(5);
        d.insert('a');
        assert_eq!(d.insert_str("béta\ngamma"), 4);
        assert_eq!(d.text(), "abéta");
        assert_eq!(d.insert_str("more"), 0);
        assert_eq!(d.char_count(), 5);
    }

    #[test]
    fn test_draft_set_checks_limit() {
        let mut d = Draft::new(5);
        assert!(d.set("héllo"));
        assert_eq!(d.cursor(), 5);
        assert!(!d.set("too long"));
        assert_eq!(d.text(), "héllo");
    }

    #[test]
    fn test_message_serializes_without_empty_sources() {
        let json = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({ "role": "user", "content": "hi" }));
    }
}
