//! Telegram Bot API transport
//!
//! A thin `reqwest` client for the handful of methods the bot uses, plus the
//! long-polling loop that feeds the dispatcher.

pub mod types;

use crate::chat::{ChatId, Keyboard, MessageId};
use crate::runtime::{ChatClient, Dispatcher, LedgerStore, ReportRunner};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use types::{
    AnswerCallbackQueryRequest, ApiFile, ApiMessage, ApiResponse, ApiUpdate, ApiUser,
    EditMessageTextRequest, GetFileRequest, GetUpdatesRequest, InlineKeyboardMarkup,
    SendMessageRequest,
};

const API_BASE: &str = "https://api.telegram.org";

/// Long-poll duration requested from `getUpdates`
const POLL_TIMEOUT_SECS: u64 = 60;

/// Must outlast a full long poll
const HTTP_TIMEOUT: Duration = Duration::from_secs(POLL_TIMEOUT_SECS + 15);

const RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{method} failed: {description}")]
    Api {
        method: &'static str,
        description: String,
    },
    #[error("getFile returned no file path")]
    MissingFilePath,
}

impl TransportError {
    /// Request URLs embed the bot token; keep it out of error messages
    fn http(e: reqwest::Error) -> Self {
        TransportError::Http(e.without_url())
    }
}

/// Bot API client
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    /// `{base}/bot{token}`
    method_base: String,
    /// `{base}/file/bot{token}`
    file_base: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self, TransportError> {
        Self::with_base_url(token, API_BASE)
    }

    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(TransportError::http)?;
        let base_url = base_url.trim_end_matches('/');

        Ok(Self {
            client,
            method_base: format!("{base_url}/bot{token}"),
            file_base: format!("{base_url}/file/bot{token}"),
        })
    }

    async fn call<B, T>(&self, method: &'static str, body: &B) -> Result<T, TransportError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response: ApiResponse<T> = self
            .client
            .post(format!("{}/{method}", self.method_base))
            .json(body)
            .send()
            .await
            .map_err(TransportError::http)?
            .json()
            .await
            .map_err(TransportError::http)?;
        response.into_result(method)
    }

    /// Identity of the bot, used as a startup credential check
    pub async fn get_me(&self) -> Result<ApiUser, TransportError> {
        self.call("getMe", &serde_json::json!({})).await
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<ApiUpdate>, TransportError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: POLL_TIMEOUT_SECS,
            allowed_updates: ["message", "callback_query"],
        };
        self.call("getUpdates", &request).await
    }
}

#[async_trait]
impl ChatClient for TelegramClient {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        let request = SendMessageRequest {
            chat_id: chat.0,
            text,
            reply_markup: keyboard.map(InlineKeyboardMarkup::from),
        };
        let message: ApiMessage = self.call("sendMessage", &request).await?;
        Ok(MessageId(message.message_id))
    }

    async fn edit_message(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        let request = EditMessageTextRequest {
            chat_id: chat.0,
            message_id: message.0,
            text,
            reply_markup: keyboard.map(InlineKeyboardMarkup::from),
        };
        // Result is the edited message or `true`
        let _: Value = self.call("editMessageText", &request).await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        let request = AnswerCallbackQueryRequest {
            callback_query_id: callback_id,
        };
        let _: bool = self.call("answerCallbackQuery", &request).await?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat: ChatId,
        file_name: &str,
        contents: Vec<u8>,
        caption: &str,
    ) -> Result<(), TransportError> {
        let mime = mime_guess::from_path(file_name).first_or_octet_stream();
        let part = Part::bytes(contents)
            .file_name(file_name.to_string())
            .mime_str(mime.essence_str())
            .map_err(TransportError::http)?;
        let form = Form::new()
            .text("chat_id", chat.to_string())
            .text("caption", caption.to_string())
            .part("document", part);

        let response: ApiResponse<Value> = self
            .client
            .post(format!("{}/sendDocument", self.method_base))
            .multipart(form)
            .send()
            .await
            .map_err(TransportError::http)?
            .json()
            .await
            .map_err(TransportError::http)?;
        response.into_result("sendDocument").map(|_| ())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        let file: ApiFile = self.call("getFile", &GetFileRequest { file_id }).await?;
        let path = file.file_path.ok_or(TransportError::MissingFilePath)?;

        let bytes = self
            .client
            .get(format!("{}/{path}", self.file_base))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(TransportError::http)?
            .bytes()
            .await
            .map_err(TransportError::http)?;
        Ok(bytes.to_vec())
    }
}

/// Poll for updates forever, handing each to the dispatcher in order.
///
/// An update is acknowledged (the offset advances past it) once the
/// dispatcher has finished with it.
pub async fn run_polling<S, C, R>(client: &TelegramClient, dispatcher: &mut Dispatcher<S, C, R>)
where
    S: LedgerStore,
    C: ChatClient,
    R: ReportRunner,
{
    let mut offset = 0;
    tracing::info!("Starting long polling");

    loop {
        let updates = match client.get_updates(offset).await {
            Ok(updates) => updates,
            Err(e) => {
                tracing::warn!(error = %e, "getUpdates failed, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };

        for raw in updates {
            offset = raw.update_id + 1;
            match raw.into_update() {
                Some(update) => dispatcher.handle_update(update).await,
                None => tracing::debug!(update_id = offset - 1, "Ignoring unsupported update"),
            }
        }
    }
}
