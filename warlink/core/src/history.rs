//! Chat Transcript
//!
//! In-memory conversation history for a console session. The link itself is
//! stateless about past exchanges; the transcript is what a surface keeps so
//! scrollback survives reconnects.

use serde::{Deserialize, Serialize};

/// Unique message identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new unique message ID
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

/// Who authored a transcript entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    /// The person at the console
    User,
    /// The backend agent
    Agent,
}

/// One entry in the transcript
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message ID
    pub id: MessageId,
    /// Who authored it
    pub role: ChatRole,
    /// Message content
    pub content: String,
    /// When the message was recorded (Unix timestamp ms)
    pub timestamp: u64,
}

impl ChatMessage {
    /// Create a new entry stamped now
    #[must_use]
    pub fn new(role: ChatRole, content: String) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content,
            timestamp: now_ms(),
        }
    }
}

/// A capped conversation history
///
/// Oldest entries are dropped once the cap is exceeded. A cap of zero means
/// unlimited.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    max_messages: usize,
}

impl Transcript {
    /// Create a transcript keeping at most `max_messages` entries
    #[must_use]
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_messages,
        }
    }

    /// Record a user message
    pub fn push_user(&mut self, content: impl Into<String>) -> MessageId {
        self.push(ChatRole::User, content.into())
    }

    /// Record an agent response
    pub fn push_agent(&mut self, content: impl Into<String>) -> MessageId {
        self.push(ChatRole::Agent, content.into())
    }

    fn push(&mut self, role: ChatRole, content: String) -> MessageId {
        let message = ChatMessage::new(role, content);
        let id = message.id.clone();
        self.messages.push(message);
        self.prune_if_needed();
        id
    }

    /// All entries, oldest first
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The last `count` entries
    #[must_use]
    pub fn recent(&self, count: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(count);
        &self.messages[start..]
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the transcript is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop all entries
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    fn prune_if_needed(&mut self) {
        if self.max_messages == 0 {
            return;
        }
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(..excess);
            tracing::debug!(
                removed = excess,
                remaining = self.messages.len(),
                "Pruned transcript"
            );
        }
    }
}

/// Get current timestamp in milliseconds
fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_push_and_read_back() {
        let mut transcript = Transcript::new(0);

        let id = transcript.push_user("status?");
        transcript.push_agent("All systems nominal.");

        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.messages()[0].id, id);
        assert_eq!(transcript.messages()[0].role, ChatRole::User);
        assert_eq!(transcript.messages()[1].role, ChatRole::Agent);
        assert_eq!(transcript.messages()[1].content, "All systems nominal.");
    }

    #[test]
    fn test_cap_drops_oldest() {
        let mut transcript = Transcript::new(3);

        for i in 1..=5 {
            transcript.push_user(format!("message {i}"));
        }

        assert_eq!(transcript.len(), 3);
        let contents: Vec<_> = transcript
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["message 3", "message 4", "message 5"]);
    }

    #[test]
    fn test_zero_cap_is_unlimited() {
        let mut transcript = Transcript::new(0);
        for i in 0..100 {
            transcript.push_user(format!("{i}"));
        }
        assert_eq!(transcript.len(), 100);
    }

    #[test]
    fn test_recent_window() {
        let mut transcript = Transcript::new(0);
        transcript.push_user("first");
        transcript.push_user("second");
        transcript.push_user("third");

        let recent: Vec<_> = transcript.recent(2).iter().map(|m| m.content.as_str()).collect();
        assert_eq!(recent, vec!["second", "third"]);

        // Asking for more than exists returns everything
        assert_eq!(transcript.recent(10).len(), 3);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = MessageId::new();
        let b = MessageId::new();
        assert_ne!(a, b);
    }
}
