//! Platform-neutral chat vocabulary
//!
//! Inbound updates and outbound keyboards as the dispatcher sees them. The
//! Telegram transport converts its wire types into these and back.

use std::fmt;

/// Identity of the person sending an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

/// Identity of the chat an update arrived in (and replies go to)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Identifier of a message previously sent in a chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Inbound
// ============================================================================

/// A single inbound event delivered by the transport
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub update_id: i64,
    pub sender: UserId,
    pub chat: ChatId,
    pub kind: UpdateKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    /// Free text (commands included)
    Text(String),
    /// Inline keyboard button press
    Button {
        callback_id: String,
        payload: String,
        /// The message that carried the keyboard
        message: MessageId,
    },
    /// File attachment
    Document(Document),
}

/// An uploaded file, not yet downloaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

impl Document {
    /// Whether the upload looks like delimited text, by the media type guessed
    /// from its file name or the declared one.
    pub fn is_csv(&self) -> bool {
        let by_name = self.file_name.as_deref().is_some_and(|name| {
            mime_guess::from_path(name)
                .iter()
                .any(|guess| guess.subtype().as_str() == "csv")
        });
        let by_mime = self
            .mime_type
            .as_deref()
            .is_some_and(|mime| mime.to_lowercase().contains("csv"));
        by_name || by_mime
    }
}

// ============================================================================
// Outbound
// ============================================================================

/// A single inline button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub payload: String,
}

impl Button {
    pub fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: payload.into(),
        }
    }
}

/// Rows of inline buttons attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new(rows: Vec<Vec<Button>>) -> Self {
        Self { rows }
    }

    pub fn with_row(mut self, row: Vec<Button>) -> Self {
        self.rows.push(row);
        self
    }

    /// All payloads in rendering order
    #[allow(dead_code)] // Used by tests to inspect rendered keyboards
    pub fn payloads(&self) -> Vec<&str> {
        self.rows
            .iter()
            .flatten()
            .map(|b| b.payload.as_str())
            .collect()
    }
}
