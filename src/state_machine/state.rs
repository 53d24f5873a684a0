//! Dialog state types

use crate::chat::MessageId;
use crate::db::{EntryId, EntryKind, FieldChange};
use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;

/// Why an entry is being looked up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Edit,
    Delete,
}

/// A store write in flight
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWrite {
    Add,
    Update {
        entry_id: EntryId,
        change: FieldChange,
        /// Message to rewrite with the result, when there is one
        prompt: Option<MessageId>,
    },
    Delete {
        entry_id: EntryId,
        prompt: MessageId,
    },
}

/// Where a user is inside a dialog.
///
/// Each variant carries only what that step needs. `Locating`, `Saving` and
/// `Importing` last only while the runtime executes the matching effect.
#[derive(Debug, Clone, PartialEq)]
pub enum DialogState {
    // Add
    SelectType,
    SelectCategory {
        kind: EntryKind,
    },
    EnterAmount {
        kind: EntryKind,
        category: String,
    },
    EnterDescription {
        kind: EntryKind,
        category: String,
        amount: Decimal,
    },

    // Edit
    EnterEditId,
    SelectEditField {
        entry_id: EntryId,
    },
    SelectEditType {
        entry_id: EntryId,
        prompt: MessageId,
    },
    SelectEditCategory {
        entry_id: EntryId,
        prompt: MessageId,
    },
    EnterEditAmount {
        entry_id: EntryId,
        prompt: MessageId,
    },
    EnterEditDescription {
        entry_id: EntryId,
        prompt: MessageId,
    },

    // Delete
    EnterDeleteId,
    ConfirmDelete {
        entry_id: EntryId,
    },

    // Bulk import
    AwaitFile,

    // Pending
    Locating {
        entry_id: EntryId,
        purpose: Lookup,
        /// Dialog to restore if the entry does not exist
        resume: Option<Box<DialogState>>,
    },
    Saving {
        pending: PendingWrite,
    },
    Importing,
}

impl DialogState {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            DialogState::SelectType => "select_type",
            DialogState::SelectCategory { .. } => "select_category",
            DialogState::EnterAmount { .. } => "enter_amount",
            DialogState::EnterDescription { .. } => "enter_description",
            DialogState::EnterEditId => "enter_edit_id",
            DialogState::SelectEditField { .. } => "select_edit_field",
            DialogState::SelectEditType { .. } => "select_edit_type",
            DialogState::SelectEditCategory { .. } => "select_edit_category",
            DialogState::EnterEditAmount { .. } => "enter_edit_amount",
            DialogState::EnterEditDescription { .. } => "enter_edit_description",
            DialogState::EnterDeleteId => "enter_delete_id",
            DialogState::ConfirmDelete { .. } => "confirm_delete",
            DialogState::AwaitFile => "await_file",
            DialogState::Locating { .. } => "locating",
            DialogState::Saving { .. } => "saving",
            DialogState::Importing => "importing",
        }
    }

    /// Whether an effect outcome is outstanding
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            DialogState::Locating { .. } | DialogState::Saving { .. } | DialogState::Importing
        )
    }
}

/// Read-only inputs the transition function needs besides the state
#[derive(Debug, Clone)]
pub struct DialogContext {
    /// Known categories, alphabetical
    pub categories: Vec<String>,
    pub now: DateTime<FixedOffset>,
}

impl DialogContext {
    pub fn new(categories: Vec<String>, now: DateTime<FixedOffset>) -> Self {
        Self { categories, now }
    }

    /// Canonical spelling of a known category, ignoring case
    pub fn resolve_category(&self, name: &str) -> Option<&str> {
        let name = name.trim().to_lowercase();
        self.categories
            .iter()
            .find(|c| c.to_lowercase() == name)
            .map(String::as_str)
    }
}
