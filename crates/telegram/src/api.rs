use std::time::Duration;

use async_trait::async_trait;
use atlantis_core::config::TelegramConfig;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::commands::COMMAND_MENU;
use crate::polling::{BotTransport, TransportError};
use crate::updates::{ApiResponse, File, Update, User};

const MARKDOWN_PARSE_FAILURE: &str = "can't parse entities";
/// Extra time added on top of the long-poll timeout before the HTTP client gives up.
const POLL_GRACE: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseMode {
    Markdown,
    Plain,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub caption: Option<String>,
}

/// Bot API client over HTTPS. The token only ever appears in request URLs.
pub struct BotApi {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
    poll_timeout_secs: u64,
}

impl BotApi {
    pub fn new(
        base_url: impl Into<String>,
        token: SecretString,
        poll_timeout_secs: u64,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT.max(Duration::from_secs(poll_timeout_secs) + POLL_GRACE))
            .build()
            .map_err(|error| TransportError::Request(error.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self { http, base_url, token, poll_timeout_secs })
    }

    pub fn from_config(config: &TelegramConfig) -> Result<Self, TransportError> {
        Self::new(config.api_base_url.clone(), config.bot_token.clone(), config.poll_timeout_secs)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token.expose_secret())
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{file_path}", self.base_url, self.token.expose_secret())
    }

    async fn call<T, B>(&self, method: &str, body: &B) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|error| TransportError::Request(redact(&error.to_string(), &self.token)))?;
        decode_response(method, response).await
    }

    pub async fn get_me(&self) -> Result<User, TransportError> {
        self.call("getMe", &json!({})).await
    }

    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, TransportError> {
        let mut body = json!({
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        self.call("getUpdates", &body).await
    }

    /// Sends text; a Markdown body Telegram cannot parse is resent as plain text.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: ParseMode,
        reply_to: Option<i64>,
    ) -> Result<(), TransportError> {
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if let Some(reply_to) = reply_to {
            body["reply_to_message_id"] = json!(reply_to);
            body["allow_sending_without_reply"] = json!(true);
        }

        if parse_mode == ParseMode::Markdown {
            let mut markdown = body.clone();
            markdown["parse_mode"] = json!("Markdown");
            match self.call::<serde_json::Value, _>("sendMessage", &markdown).await {
                Err(TransportError::Api { status: 400, description })
                    if description.contains(MARKDOWN_PARSE_FAILURE) =>
                {
                    warn!(
                        event_name = "delivery.telegram.markdown_rejected",
                        chat_id,
                        "markdown rejected; resending as plain text"
                    );
                }
                other => return other.map(|_| ()),
            }
        }

        self.call::<serde_json::Value, _>("sendMessage", &body).await.map(|_| ())
    }

    pub async fn send_chat_action(&self, chat_id: i64, action: &str) -> Result<(), TransportError> {
        self.call::<bool, _>("sendChatAction", &json!({ "chat_id": chat_id, "action": action }))
            .await
            .map(|_| ())
    }

    pub async fn get_file(&self, file_id: &str) -> Result<File, TransportError> {
        self.call("getFile", &json!({ "file_id": file_id })).await
    }

    pub async fn download_file(&self, file_path: &str) -> Result<Vec<u8>, TransportError> {
        let response = self
            .http
            .get(self.file_url(file_path))
            .send()
            .await
            .map_err(|error| TransportError::Request(redact(&error.to_string(), &self.token)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Api {
                status: status.as_u16(),
                description: "file download failed".to_owned(),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|error| TransportError::Request(redact(&error.to_string(), &self.token)))?;
        Ok(bytes.to_vec())
    }

    /// Resolves a photo's `file_id` and downloads its content.
    pub async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        let file = self.get_file(file_id).await?;
        let Some(file_path) = file.file_path else {
            return Err(TransportError::Decode(format!("file {file_id} has no download path")));
        };
        self.download_file(&file_path).await
    }

    pub async fn send_document(
        &self,
        chat_id: i64,
        document: DocumentUpload,
    ) -> Result<(), TransportError> {
        let part = Part::bytes(document.bytes)
            .file_name(document.file_name)
            .mime_str(&document.mime_type)
            .map_err(|error| TransportError::Request(error.to_string()))?;
        let mut form = Form::new().text("chat_id", chat_id.to_string()).part("document", part);
        if let Some(caption) = document.caption {
            form = form.text("caption", caption);
        }

        let response = self
            .http
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|error| TransportError::Request(redact(&error.to_string(), &self.token)))?;
        decode_response::<serde_json::Value>("sendDocument", response).await.map(|_| ())
    }

    pub async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<(), TransportError> {
        self.call::<bool, _>(
            "deleteWebhook",
            &json!({ "drop_pending_updates": drop_pending_updates }),
        )
        .await
        .map(|_| ())
    }

    pub async fn set_my_commands(&self) -> Result<(), TransportError> {
        let commands: Vec<_> = COMMAND_MENU
            .iter()
            .map(|(command, description)| json!({ "command": command, "description": description }))
            .collect();
        self.call::<bool, _>("setMyCommands", &json!({ "commands": commands })).await.map(|_| ())
    }
}

#[async_trait]
impl BotTransport for BotApi {
    async fn prepare(&self) -> Result<(), TransportError> {
        self.delete_webhook(true).await?;
        if let Err(error) = self.set_my_commands().await {
            if error.is_fatal() {
                return Err(error);
            }
            warn!(error = %error, "command menu registration failed; continuing");
        }
        Ok(())
    }

    async fn poll(&self, offset: Option<i64>) -> Result<Option<Vec<Update>>, TransportError> {
        let updates = self.get_updates(offset).await?;
        debug!(count = updates.len(), offset = ?offset, "long poll returned");
        Ok(Some(updates))
    }
}

async fn decode_response<T>(method: &str, response: reqwest::Response) -> Result<T, TransportError>
where
    T: DeserializeOwned,
{
    let status = response.status().as_u16();
    let envelope = match response.json::<ApiResponse<T>>().await {
        Ok(envelope) => envelope,
        Err(_) if !(200..300).contains(&status) => {
            return Err(status_error(status, format!("{method} failed")));
        }
        Err(error) => return Err(TransportError::Decode(error.to_string())),
    };

    if !envelope.ok {
        let code = envelope.error_code.unwrap_or(status);
        let description = envelope.description.unwrap_or_else(|| format!("{method} failed"));
        return Err(status_error(code, description));
    }
    envelope
        .result
        .ok_or_else(|| TransportError::Decode(format!("{method} returned no result")))
}

fn status_error(status: u16, description: String) -> TransportError {
    match status {
        401 | 404 => TransportError::Unauthorized,
        409 => TransportError::Conflict,
        _ => TransportError::Api { status, description },
    }
}

fn redact(message: &str, token: &SecretString) -> String {
    message.replace(token.expose_secret(), "<redacted>")
}
