//! Effects produced by state transitions

use crate::chat::{Document, Keyboard, MessageId};
use crate::db::{EntryId, FieldChange, NewEntry};

/// Outbound chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Send {
        text: String,
        keyboard: Option<Keyboard>,
    },
    /// Rewrite a message sent earlier, typically the one carrying a keyboard
    Edit {
        message: MessageId,
        text: String,
        keyboard: Option<Keyboard>,
    },
}

impl Reply {
    #[allow(dead_code)] // Used by tests to inspect replies
    pub fn text(&self) -> &str {
        match self {
            Reply::Send { text, .. } | Reply::Edit { text, .. } => text,
        }
    }
}

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send or edit a chat message
    Reply(Reply),

    /// Fetch an entry; answers with `EntryFound` or `EntryMissing`
    LookupEntry(EntryId),

    /// Answers with `EntryAdded`
    InsertEntry(NewEntry),

    /// Answers with `EntryUpdated` or `EntryMissing`
    UpdateEntry {
        entry_id: EntryId,
        change: FieldChange,
    },

    /// Answers with `EntryDeleted`
    DeleteEntry(EntryId),

    /// Download the file and run the import; answers with `Imported` or
    /// `DownloadFailed`
    ImportDocument(Document),
}

impl Effect {
    pub fn send(text: impl Into<String>) -> Self {
        Effect::Reply(Reply::Send {
            text: text.into(),
            keyboard: None,
        })
    }

    pub fn send_with(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Effect::Reply(Reply::Send {
            text: text.into(),
            keyboard: Some(keyboard),
        })
    }

    pub fn edit(message: MessageId, text: impl Into<String>) -> Self {
        Effect::Reply(Reply::Edit {
            message,
            text: text.into(),
            keyboard: None,
        })
    }

    pub fn edit_with(message: MessageId, text: impl Into<String>, keyboard: Keyboard) -> Self {
        Effect::Reply(Reply::Edit {
            message,
            text: text.into(),
            keyboard: Some(keyboard),
        })
    }

    /// Edit `prompt` in place when known, otherwise send a new message
    pub fn edit_or_send(prompt: Option<MessageId>, text: impl Into<String>) -> Self {
        match prompt {
            Some(message) => Effect::edit(message, text),
            None => Effect::send(text),
        }
    }

    /// Whether executing this effect touches the store or the network
    /// beyond sending a reply
    pub fn is_io(&self) -> bool {
        !matches!(self, Effect::Reply(_))
    }
}
