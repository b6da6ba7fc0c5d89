//! Chat message value carried by the broker.

/// Numeric user identity. Assigned once, never reused.
pub type UserId = u64;

/// Author id reserved for system announcements.
pub const SYSTEM_USER_ID: UserId = 0;

/// Display name of the system user.
pub const SYSTEM_USER_NAME: &str = "system";

/// A formatted chat line and its author.
///
/// The text already carries the timestamp and sender name, so subscribers
/// only need the author id to apply self and mute filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    text: String,
    author: UserId,
}

impl ChatMessage {
    /// Create a message from already formatted text.
    pub fn new(text: impl Into<String>, author: UserId) -> Self {
        Self {
            text: text.into(),
            author,
        }
    }

    /// Formatted text, newline terminated.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Author id.
    pub fn author(&self) -> UserId {
        self.author
    }

    /// Whether this is a system announcement.
    pub fn is_system(&self) -> bool {
        self.author == SYSTEM_USER_ID
    }
}

/// Render a line as `<HH:MM> [<name>] <text>\n`.
pub fn format_message(timestamp: &str, sender_name: &str, text: &str) -> String {
    format!("{timestamp} [{sender_name}] {text}\n")
}
