//! Button payloads and the keyboards that carry them
//!
//! Payloads are opaque to the chat platform and limited to 64 bytes.

use crate::chat::{Button, Keyboard};
use crate::db::{EditField, EntryKind};

/// Platform limit on callback data
pub const MAX_PAYLOAD_BYTES: usize = 64;

const CATEGORY_PREFIX: &str = "cat:";
const EDIT_FIELD_PREFIX: &str = "edit_field:";
const DELETE_CONFIRM: &str = "delete_confirm";
const CANCEL: &str = "cancel";

/// Decoded button press
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Kind(EntryKind),
    Category(String),
    EditField(EditField),
    ConfirmDelete,
    Cancel,
}

impl Payload {
    pub fn parse(raw: &str) -> Option<Self> {
        if let Some(name) = raw.strip_prefix(CATEGORY_PREFIX) {
            return (!name.is_empty()).then(|| Payload::Category(name.to_string()));
        }
        if let Some(field) = raw.strip_prefix(EDIT_FIELD_PREFIX) {
            return EditField::parse(field).map(Payload::EditField);
        }
        match raw {
            DELETE_CONFIRM => Some(Payload::ConfirmDelete),
            CANCEL => Some(Payload::Cancel),
            // Kinds are matched exactly, unlike file input
            "income" => Some(Payload::Kind(EntryKind::Income)),
            "expense" => Some(Payload::Kind(EntryKind::Expense)),
            _ => None,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Payload::Kind(kind) => kind.as_str().to_string(),
            Payload::Category(name) => format!("{CATEGORY_PREFIX}{name}"),
            Payload::EditField(field) => format!("{EDIT_FIELD_PREFIX}{}", field.as_str()),
            Payload::ConfirmDelete => DELETE_CONFIRM.to_string(),
            Payload::Cancel => CANCEL.to_string(),
        }
    }
}

fn button(label: &str, payload: &Payload) -> Button {
    Button::new(label, payload.encode())
}

fn cancel_row() -> Vec<Button> {
    vec![button("Cancel", &Payload::Cancel)]
}

/// Income/Expense, then Cancel
pub fn kind_keyboard() -> Keyboard {
    let kinds = EntryKind::ALL
        .iter()
        .map(|kind| button(kind.label(), &Payload::Kind(*kind)))
        .collect();
    Keyboard::new(vec![kinds]).with_row(cancel_row())
}

/// One category per row, then Cancel. Names that would overflow the payload
/// limit are left out.
pub fn category_keyboard(categories: &[String]) -> Keyboard {
    let rows = categories
        .iter()
        .filter_map(|name| {
            let payload = Payload::Category(name.clone());
            (payload.encode().len() <= MAX_PAYLOAD_BYTES).then(|| vec![button(name, &payload)])
        })
        .collect();
    Keyboard::new(rows).with_row(cancel_row())
}

/// The four editable fields, two per row, then Cancel
pub fn edit_field_keyboard() -> Keyboard {
    let mut keyboard = Keyboard::default();
    for pair in EditField::ALL.chunks(2) {
        keyboard = keyboard.with_row(
            pair.iter()
                .map(|field| button(field.label(), &Payload::EditField(*field)))
                .collect(),
        );
    }
    keyboard.with_row(cancel_row())
}

pub fn confirm_delete_keyboard() -> Keyboard {
    Keyboard::new(vec![vec![
        button("Confirm Delete", &Payload::ConfirmDelete),
        button("Cancel", &Payload::Cancel),
    ]])
}
