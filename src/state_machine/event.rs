//! Events that drive a dialog

use crate::chat::{Document, MessageId};
use crate::db::{EntryId, LedgerEntry};
use crate::import::ImportReport;

/// Commands that open (or replace) a dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogCommand {
    Add,
    /// `/edit`, optionally with the id already given
    Edit(Option<EntryId>),
    Delete(Option<EntryId>),
    BulkImport,
}

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // User events
    Start(DialogCommand),
    Text(String),
    Button {
        payload: String,
        message: MessageId,
    },
    Document(Document),

    // Effect outcomes
    EntryFound(LedgerEntry),
    EntryMissing(EntryId),
    EntryAdded(EntryId),
    EntryUpdated,
    EntryDeleted {
        removed: bool,
    },
    Imported(ImportReport),
    /// The store reported an error; details are logged by the runtime
    StoreFailed,
    DownloadFailed,
}
