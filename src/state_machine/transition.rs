//! Pure state transition function
//!
//! Given the current dialog (if any), read-only context and one event,
//! produce the next dialog and the effects to run. No I/O happens here; store
//! and network access are requested as effects and their outcomes come back
//! as events.

use super::payload::{self, Payload};
use super::state::{Lookup, PendingWrite};
use super::{DialogCommand, DialogContext, DialogState, Effect, Event};
use crate::chat::{Document, MessageId};
use crate::db::{parse_amount, EditField, EntryId, FieldChange, NewEntry, MAX_DESCRIPTION_CHARS};
use thiserror::Error;

pub const NOT_UNDERSTOOD: &str = "I don't understand that command.";
pub const NO_IMPORT_IN_PROGRESS: &str = "No bulk import in progress. Start with /bulk_transactions";

const CHOOSE_TYPE: &str = "Please choose the type of transaction:";
const ENTER_DESCRIPTION: &str = "Enter a description for the transaction (max 100 characters).";
const INVALID_AMOUNT: &str = "Invalid amount. Please enter a positive number.";
const DESCRIPTION_TOO_LONG: &str = "Description too long. Please keep it under 100 characters.";
const INVALID_ID: &str = "Invalid ID. Please enter a valid transaction ID number.";
const IMPORT_INSTRUCTIONS: &str = "Please send the CSV file as a document now. Expected CSV columns: type,category,amount,description (optional),created_at (optional). Send 'cancel' to abort.";
const AWAITING_FILE: &str =
    "Awaiting CSV file. Please send it as a document, or send 'cancel' to abort.";
const NOT_CSV: &str =
    "Please upload a CSV file (filename must end with .csv or mime type should indicate CSV).";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    /// `None` ends the dialog
    pub new_state: Option<DialogState>,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: DialogState) -> Self {
        Self {
            new_state: Some(state),
            effects: vec![],
        }
    }

    pub fn cleared() -> Self {
        Self {
            new_state: None,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Events the current dialog cannot accept
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("No dialog in progress")]
    NoActiveDialog,
    #[error("Button does not belong to the current dialog")]
    StaleDialog,
    #[error("No bulk import in progress")]
    NoImportInProgress,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same inputs this always produces the same outputs. An event that
/// does not fit the current step either re-prompts with the state unchanged
/// or returns an error; it never advances the dialog.
pub fn transition(
    state: Option<&DialogState>,
    context: &DialogContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match event {
        Event::Start(command) => Ok(start(state, command)),
        Event::Text(text) => {
            let state = state.ok_or(TransitionError::NoActiveDialog)?;
            on_text(state, context, &text)
        }
        Event::Button { payload, message } => {
            let state = state.ok_or(TransitionError::StaleDialog)?;
            let payload = Payload::parse(&payload).ok_or(TransitionError::StaleDialog)?;
            on_button(state, context, payload, message)
        }
        Event::Document(document) => on_document(state, document),
        outcome => {
            let state = state.ok_or_else(|| {
                TransitionError::InvalidTransition(format!("{outcome:?} without a dialog"))
            })?;
            on_outcome(state, outcome)
        }
    }
}

// ============================================================================
// User input
// ============================================================================

fn start(current: Option<&DialogState>, command: DialogCommand) -> TransitionResult {
    match command {
        DialogCommand::Add => TransitionResult::new(DialogState::SelectType)
            .with_effect(Effect::send_with(CHOOSE_TYPE, payload::kind_keyboard())),
        DialogCommand::Edit(None) => TransitionResult::new(DialogState::EnterEditId)
            .with_effect(Effect::send(
                "Please enter the transaction ID you want to edit.",
            )),
        DialogCommand::Delete(None) => TransitionResult::new(DialogState::EnterDeleteId)
            .with_effect(Effect::send(
                "Please enter the transaction ID you want to delete.",
            )),
        // A direct id keeps whatever dialog was open in case the id is wrong
        DialogCommand::Edit(Some(id)) => locate(id, Lookup::Edit, resumable(current)),
        DialogCommand::Delete(Some(id)) => locate(id, Lookup::Delete, resumable(current)),
        DialogCommand::BulkImport => TransitionResult::new(DialogState::AwaitFile)
            .with_effect(Effect::send(IMPORT_INSTRUCTIONS)),
    }
}

/// Pending states only live for one processing pass and are never resumed
fn resumable(current: Option<&DialogState>) -> Option<DialogState> {
    current.filter(|state| !state.is_pending()).cloned()
}

fn locate(entry_id: EntryId, purpose: Lookup, resume: Option<DialogState>) -> TransitionResult {
    TransitionResult::new(DialogState::Locating {
        entry_id,
        purpose,
        resume: resume.map(Box::new),
    })
    .with_effect(Effect::LookupEntry(entry_id))
}

fn save_update(entry_id: EntryId, change: FieldChange, prompt: Option<MessageId>) -> TransitionResult {
    TransitionResult::new(DialogState::Saving {
        pending: PendingWrite::Update {
            entry_id,
            change: change.clone(),
            prompt,
        },
    })
    .with_effect(Effect::UpdateEntry { entry_id, change })
}

fn reprompt(state: &DialogState, text: &str) -> TransitionResult {
    TransitionResult::new(state.clone()).with_effect(Effect::send(text))
}

/// Trimmed description, or `None` when over the limit
fn check_description(text: &str) -> Option<&str> {
    let text = text.trim();
    (text.chars().count() <= MAX_DESCRIPTION_CHARS).then_some(text)
}

fn parse_id(text: &str) -> Option<EntryId> {
    text.trim().parse::<EntryId>().ok().filter(|id| *id > 0)
}

fn on_text(
    state: &DialogState,
    context: &DialogContext,
    text: &str,
) -> Result<TransitionResult, TransitionError> {
    let result = match state {
        // Button-driven steps; free text is never a choice
        DialogState::SelectType
        | DialogState::SelectCategory { .. }
        | DialogState::SelectEditField { .. }
        | DialogState::SelectEditType { .. }
        | DialogState::SelectEditCategory { .. }
        | DialogState::ConfirmDelete { .. } => reprompt(state, NOT_UNDERSTOOD),

        DialogState::EnterAmount { kind, category } => match parse_amount(text) {
            Some(amount) => TransitionResult::new(DialogState::EnterDescription {
                kind: *kind,
                category: category.clone(),
                amount,
            })
            .with_effect(Effect::send(ENTER_DESCRIPTION)),
            None => reprompt(state, INVALID_AMOUNT),
        },

        DialogState::EnterDescription {
            kind,
            category,
            amount,
        } => match check_description(text) {
            Some(description) => TransitionResult::new(DialogState::Saving {
                pending: PendingWrite::Add,
            })
            .with_effect(Effect::InsertEntry(NewEntry {
                kind: *kind,
                category: category.clone(),
                amount: *amount,
                description: (!description.is_empty()).then(|| description.to_string()),
                created_at: context.now,
            })),
            None => reprompt(state, DESCRIPTION_TOO_LONG),
        },

        DialogState::EnterEditId => match parse_id(text) {
            Some(id) => locate(id, Lookup::Edit, None),
            None => reprompt(state, INVALID_ID),
        },

        DialogState::EnterDeleteId => match parse_id(text) {
            Some(id) => locate(id, Lookup::Delete, None),
            None => reprompt(state, INVALID_ID),
        },

        DialogState::EnterEditAmount { entry_id, prompt } => match parse_amount(text) {
            Some(amount) => save_update(*entry_id, FieldChange::Amount(amount), Some(*prompt)),
            None => reprompt(state, INVALID_AMOUNT),
        },

        DialogState::EnterEditDescription { entry_id, prompt } => match check_description(text) {
            Some(description) => save_update(
                *entry_id,
                FieldChange::Description(
                    (!description.is_empty()).then(|| description.to_string()),
                ),
                Some(*prompt),
            ),
            None => reprompt(state, DESCRIPTION_TOO_LONG),
        },

        DialogState::AwaitFile => {
            if text.trim().eq_ignore_ascii_case("cancel") {
                TransitionResult::cleared().with_effect(Effect::send("Bulk import canceled."))
            } else {
                reprompt(state, AWAITING_FILE)
            }
        }

        DialogState::Locating { .. } | DialogState::Saving { .. } | DialogState::Importing => {
            return Err(TransitionError::InvalidTransition(format!(
                "text while {}",
                state.name()
            )))
        }
    };
    Ok(result)
}

fn on_button(
    state: &DialogState,
    context: &DialogContext,
    payload: Payload,
    message: MessageId,
) -> Result<TransitionResult, TransitionError> {
    let result = match (state, payload) {
        // Add
        (DialogState::SelectType, Payload::Kind(kind)) => {
            TransitionResult::new(DialogState::SelectCategory { kind }).with_effect(
                Effect::edit_with(
                    message,
                    format!("You selected {kind}. Choose a category:"),
                    payload::category_keyboard(&context.categories),
                ),
            )
        }
        (DialogState::SelectCategory { kind }, Payload::Category(name)) => {
            let category = context
                .resolve_category(&name)
                .ok_or(TransitionError::StaleDialog)?;
            TransitionResult::new(DialogState::EnterAmount {
                kind: *kind,
                category: category.to_string(),
            })
            .with_effect(Effect::edit(
                message,
                format!("Selected category: {category}. Enter the transaction amount."),
            ))
        }
        (DialogState::SelectType | DialogState::SelectCategory { .. }, Payload::Cancel) => {
            TransitionResult::cleared().with_effect(Effect::edit(message, "Transaction canceled."))
        }

        // Edit
        (DialogState::SelectEditField { entry_id }, Payload::EditField(field)) => {
            let entry_id = *entry_id;
            match field {
                EditField::Kind => {
                    TransitionResult::new(DialogState::SelectEditType {
                        entry_id,
                        prompt: message,
                    })
                    .with_effect(Effect::edit_with(
                        message,
                        "Select new type:",
                        payload::kind_keyboard(),
                    ))
                }
                EditField::Category => {
                    TransitionResult::new(DialogState::SelectEditCategory {
                        entry_id,
                        prompt: message,
                    })
                    .with_effect(Effect::edit_with(
                        message,
                        "Select new category:",
                        payload::category_keyboard(&context.categories),
                    ))
                }
                EditField::Amount => {
                    TransitionResult::new(DialogState::EnterEditAmount {
                        entry_id,
                        prompt: message,
                    })
                    .with_effect(Effect::edit(message, "Enter new amount (positive number):"))
                }
                EditField::Description => {
                    TransitionResult::new(DialogState::EnterEditDescription {
                        entry_id,
                        prompt: message,
                    })
                    .with_effect(Effect::edit(
                        message,
                        "Enter new description (max 100 characters):",
                    ))
                }
            }
        }
        (DialogState::SelectEditType { entry_id, prompt }, Payload::Kind(kind)) => {
            save_update(*entry_id, FieldChange::Kind(kind), Some(*prompt))
        }
        (DialogState::SelectEditCategory { entry_id, prompt }, Payload::Category(name)) => {
            let category = context
                .resolve_category(&name)
                .ok_or(TransitionError::StaleDialog)?;
            save_update(
                *entry_id,
                FieldChange::Category(category.to_string()),
                Some(*prompt),
            )
        }
        (
            DialogState::SelectEditField { .. }
            | DialogState::SelectEditType { .. }
            | DialogState::SelectEditCategory { .. },
            Payload::Cancel,
        ) => TransitionResult::cleared().with_effect(Effect::edit(message, "Edit canceled.")),

        // Delete
        (DialogState::ConfirmDelete { entry_id }, Payload::ConfirmDelete) => {
            TransitionResult::new(DialogState::Saving {
                pending: PendingWrite::Delete {
                    entry_id: *entry_id,
                    prompt: message,
                },
            })
            .with_effect(Effect::DeleteEntry(*entry_id))
        }
        (DialogState::ConfirmDelete { .. }, Payload::Cancel) => {
            TransitionResult::cleared().with_effect(Effect::edit(message, "Deletion canceled."))
        }

        _ => return Err(TransitionError::StaleDialog),
    };
    Ok(result)
}

fn on_document(
    state: Option<&DialogState>,
    document: Document,
) -> Result<TransitionResult, TransitionError> {
    match state {
        Some(DialogState::AwaitFile) if document.is_csv() => {
            Ok(TransitionResult::new(DialogState::Importing)
                .with_effect(Effect::send("File received. Processing..."))
                .with_effect(Effect::ImportDocument(document)))
        }
        Some(state @ DialogState::AwaitFile) => Ok(reprompt(state, NOT_CSV)),
        _ => Err(TransitionError::NoImportInProgress),
    }
}

// ============================================================================
// Effect outcomes
// ============================================================================

fn not_found(entry_id: EntryId) -> String {
    format!("Transaction with ID {entry_id} not found.")
}

fn on_outcome(state: &DialogState, event: Event) -> Result<TransitionResult, TransitionError> {
    let result = match (state, event) {
        (DialogState::Locating { purpose, .. }, Event::EntryFound(entry)) => match purpose {
            Lookup::Edit => TransitionResult::new(DialogState::SelectEditField { entry_id: entry.id })
                .with_effect(Effect::send_with(
                    format!("{}\n\nChoose field to edit:", entry.details()),
                    payload::edit_field_keyboard(),
                )),
            Lookup::Delete => TransitionResult::new(DialogState::ConfirmDelete { entry_id: entry.id })
                .with_effect(Effect::send_with(
                    format!(
                        "{}\n\nAre you sure you want to DELETE this transaction?",
                        entry.details()
                    ),
                    payload::confirm_delete_keyboard(),
                )),
        },
        (DialogState::Locating { entry_id, resume, .. }, Event::EntryMissing(_)) => TransitionResult {
            new_state: resume.as_deref().cloned(),
            effects: vec![Effect::send(not_found(*entry_id))],
        },
        (DialogState::Locating { .. }, Event::StoreFailed) => {
            TransitionResult::cleared().with_effect(Effect::send("Failed to retrieve transaction."))
        }

        (
            DialogState::Saving {
                pending: PendingWrite::Add,
            },
            Event::EntryAdded(id),
        ) => TransitionResult::cleared().with_effect(Effect::send(format!(
            "Transaction added successfully! (ID {id})"
        ))),
        (
            DialogState::Saving {
                pending: PendingWrite::Add,
            },
            Event::StoreFailed,
        ) => TransitionResult::cleared().with_effect(Effect::send("Failed to save transaction.")),

        (
            DialogState::Saving {
                pending:
                    PendingWrite::Update {
                        entry_id,
                        change,
                        prompt,
                    },
            },
            outcome @ (Event::EntryUpdated | Event::EntryMissing(_) | Event::StoreFailed),
        ) => {
            let text = match outcome {
                Event::EntryUpdated => {
                    format!("Transaction {entry_id} updated: {}", change.describe())
                }
                Event::EntryMissing(_) => not_found(*entry_id),
                _ => format!(
                    "Failed to update transaction {}.",
                    change.field().as_str()
                ),
            };
            TransitionResult::cleared().with_effect(Effect::edit_or_send(*prompt, text))
        }

        (
            DialogState::Saving {
                pending: PendingWrite::Delete { entry_id, prompt },
            },
            outcome @ (Event::EntryDeleted { .. } | Event::StoreFailed),
        ) => {
            let text = match outcome {
                Event::EntryDeleted { removed: true } => {
                    format!("Transaction {entry_id} has been deleted.")
                }
                Event::EntryDeleted { removed: false } => {
                    format!("No transaction deleted. ID {entry_id} may not exist.")
                }
                _ => format!("Failed to delete transaction {entry_id}."),
            };
            TransitionResult::cleared().with_effect(Effect::edit(*prompt, text))
        }

        (DialogState::Importing, Event::Imported(report)) => {
            TransitionResult::cleared().with_effect(Effect::send(report.render()))
        }
        (DialogState::Importing, Event::DownloadFailed) => TransitionResult::cleared()
            .with_effect(Effect::send("Failed to download the uploaded file.")),
        (DialogState::Importing, Event::StoreFailed) => {
            TransitionResult::cleared().with_effect(Effect::send("Failed to import transactions."))
        }

        (state, event) => {
            return Err(TransitionError::InvalidTransition(format!(
                "{event:?} while {}",
                state.name()
            )))
        }
    };
    Ok(result)
}
