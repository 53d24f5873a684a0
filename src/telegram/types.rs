//! Bot API wire types
//!
//! Only the fields the bot reads are modelled; everything else in the JSON is
//! ignored.

use super::TransportError;
use crate::chat::{ChatId, Document, Keyboard, MessageId, Update, UpdateKind, UserId};
use serde::{Deserialize, Serialize};

// ============================================================================
// Inbound
// ============================================================================

/// Envelope of every Bot API response
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn into_result(self, method: &'static str) -> Result<T, TransportError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(TransportError::Api {
                method,
                description: "response without result".to_string(),
            }),
            (false, _) => Err(TransportError::Api {
                method,
                description: self.description.unwrap_or_else(|| "unknown error".to_string()),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiChat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiDocument {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiMessage {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<ApiUser>,
    pub chat: ApiChat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub document: Option<ApiDocument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiCallbackQuery {
    pub id: String,
    pub from: ApiUser,
    #[serde(default)]
    pub message: Option<ApiMessage>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<ApiMessage>,
    #[serde(default)]
    pub callback_query: Option<ApiCallbackQuery>,
}

impl ApiUpdate {
    /// Convert to the dispatcher's vocabulary. Updates the bot does not act
    /// on (edits, channel posts, stickers, ...) yield `None`.
    pub fn into_update(self) -> Option<Update> {
        let update_id = self.update_id;

        if let Some(message) = self.message {
            let sender = UserId(message.from?.id);
            let kind = if let Some(doc) = message.document {
                UpdateKind::Document(Document {
                    file_id: doc.file_id,
                    file_name: doc.file_name,
                    mime_type: doc.mime_type,
                })
            } else {
                UpdateKind::Text(message.text?)
            };
            return Some(Update {
                update_id,
                sender,
                chat: ChatId(message.chat.id),
                kind,
            });
        }

        let query = self.callback_query?;
        let message = query.message?;
        Some(Update {
            update_id,
            sender: UserId(query.from.id),
            chat: ChatId(message.chat.id),
            kind: UpdateKind::Button {
                callback_id: query.id,
                payload: query.data.unwrap_or_default(),
                message: MessageId(message.message_id),
            },
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiFile {
    #[allow(dead_code)] // Part of the response; downloads go by path
    pub file_id: String,
    #[serde(default)]
    pub file_path: Option<String>,
}

// ============================================================================
// Outbound
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl From<&Keyboard> for InlineKeyboardMarkup {
    fn from(keyboard: &Keyboard) -> Self {
        Self {
            inline_keyboard: keyboard
                .rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|button| InlineKeyboardButton {
                            text: button.label.clone(),
                            callback_data: button.payload.clone(),
                        })
                        .collect()
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GetUpdatesRequest {
    pub offset: i64,
    pub timeout: u64,
    pub allowed_updates: [&'static str; 2],
}

#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    pub chat_id: i64,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
pub struct EditMessageTextRequest<'a> {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
pub struct AnswerCallbackQueryRequest<'a> {
    pub callback_query_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct GetFileRequest<'a> {
    pub file_id: &'a str,
}
