//! Glue between the Telegram transport and the agent runtime.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use atlantis_agent::{AgentRuntime, ChatContext, OutboundMessage, ReplySink, TextFormat};
use atlantis_core::{ApplicationError, Directory, UserId};
use atlantis_telegram::api::{BotApi, DocumentUpload, ParseMode};
use atlantis_telegram::commands::{BotCommand, ParsedCommand};
use atlantis_telegram::events::{ChatService, EventContext, EventHandlerError};
use atlantis_telegram::messages::{self, StatusSnapshot};
use atlantis_telegram::updates::{Message, PhotoSize};
use tracing::{info, warn};

/// `ReplySink` that sends through the Bot API.
pub struct TelegramOutbox {
    api: Arc<BotApi>,
}

impl TelegramOutbox {
    pub fn new(api: Arc<BotApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ReplySink for TelegramOutbox {
    async fn deliver(&self, chat_id: i64, message: OutboundMessage) -> Result<()> {
        match message {
            OutboundMessage::Text { text, format, reply_to } => {
                let parse_mode = match format {
                    TextFormat::Markdown => ParseMode::Markdown,
                    TextFormat::Plain => ParseMode::Plain,
                };
                self.api.send_message(chat_id, &text, parse_mode, reply_to).await?;
            }
            OutboundMessage::Typing => self.api.send_chat_action(chat_id, "typing").await?,
            OutboundMessage::Document(document) => {
                self.api
                    .send_document(
                        chat_id,
                        DocumentUpload {
                            file_name: document.file_name,
                            mime_type: document.mime_type,
                            bytes: document.bytes,
                            caption: document.caption,
                        },
                    )
                    .await?
            }
        }
        Ok(())
    }
}

pub struct AtlantisBot {
    runtime: Arc<AgentRuntime>,
    api: Arc<BotApi>,
    directory: Arc<Directory>,
}

impl AtlantisBot {
    pub fn new(runtime: Arc<AgentRuntime>, api: Arc<BotApi>, directory: Arc<Directory>) -> Self {
        Self { runtime, api, directory }
    }

    fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            model: self.runtime.llm_model().to_owned(),
            port_count: self.directory.port_count(),
            document_format: self.runtime.document_format().map(str::to_owned),
            vision_enabled: self.runtime.vision_configured(),
        }
    }

    /// Best-effort user-safe notice; returns the error text for the dispatcher log.
    async fn report_failure(
        &self,
        message: &Message,
        ctx: &EventContext,
        error: anyhow::Error,
    ) -> String {
        let interface = ApplicationError::Integration(error.to_string())
            .into_interface(ctx.correlation_id.clone());
        if let Err(send_error) = self
            .api
            .send_message(
                message.chat.id,
                interface.user_message(),
                ParseMode::Plain,
                Some(message.message_id),
            )
            .await
        {
            warn!(
                event_name = "egress.telegram.failure_notice_failed",
                correlation_id = interface.correlation_id(),
                error = %send_error,
                "could not tell the user about a failed request"
            );
        }
        interface.to_string()
    }

    async fn reply_markdown(&self, message: &Message, text: String) -> Result<()> {
        self.api
            .send_message(message.chat.id, &text, ParseMode::Markdown, Some(message.message_id))
            .await?;
        Ok(())
    }
}

fn chat_context(message: &Message, ctx: &EventContext) -> ChatContext {
    ChatContext {
        chat_id: message.chat.id,
        user_id: UserId(message.sender_id().unwrap_or(message.chat.id)),
        message_id: Some(message.message_id),
        correlation_id: ctx.correlation_id.clone(),
    }
}

#[async_trait]
impl ChatService for AtlantisBot {
    async fn on_command(
        &self,
        command: &ParsedCommand,
        message: &Message,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError> {
        info!(
            event_name = "ingress.telegram.command",
            command = command.command.name(),
            correlation_id = %ctx.correlation_id,
            chat_id = message.chat.id,
            "handling bot command"
        );
        let chat = chat_context(message, ctx);
        let result = match &command.command {
            BotCommand::Start | BotCommand::Help => {
                self.reply_markdown(message, messages::welcome_message()).await
            }
            BotCommand::Quote => self.runtime.start_quote(&chat).await,
            BotCommand::Cancel => self.runtime.cancel_quote(&chat).await.map(|_| ()),
            BotCommand::Analyze => self.reply_markdown(message, messages::analyze_message()).await,
            BotCommand::Docs => {
                self.reply_markdown(message, messages::documents_guide_message()).await
            }
            BotCommand::Ports => {
                self.reply_markdown(message, messages::ports_message(&self.directory)).await
            }
            BotCommand::Carriers => {
                self.reply_markdown(message, messages::carriers_message(&self.directory)).await
            }
            BotCommand::Status => {
                self.reply_markdown(message, messages::status_message(&self.status())).await
            }
            BotCommand::Unknown(name) => {
                self.reply_markdown(message, messages::unknown_command_message(name)).await
            }
        };
        match result {
            Ok(()) => Ok(()),
            Err(error) => {
                Err(EventHandlerError::Command(self.report_failure(message, ctx, error).await))
            }
        }
    }

    async fn on_text(
        &self,
        text: &str,
        message: &Message,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError> {
        match self.runtime.handle_text(&chat_context(message, ctx), text).await {
            Ok(_) => Ok(()),
            Err(error) => Err(EventHandlerError::Text(self.report_failure(message, ctx, error).await)),
        }
    }

    async fn on_photo(
        &self,
        photo: &PhotoSize,
        message: &Message,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError> {
        let api = Arc::clone(&self.api);
        let file_id = photo.file_id.clone();
        let download = async move { api.fetch_file(&file_id).await.map_err(anyhow::Error::from) };

        self.runtime
            .handle_photo(&chat_context(message, ctx), message.caption.as_deref(), download)
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use atlantis_agent::{AgentRuntime, CaptionClient, LlmClient, LlmError, VisionError};
    use atlantis_core::{Directory, QuoteEngine, QuoteWizard};
    use atlantis_telegram::api::BotApi;
    use atlantis_telegram::events::{chat_dispatcher, EventContext, EventDispatcher, UpdateEnvelope};
    use atlantis_telegram::updates::{Chat, Message, PhotoSize, Update, User};
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{AtlantisBot, TelegramOutbox};

    const TOKEN: &str = "4242:bot-token";

    struct EchoLlm;

    #[async_trait]
    impl LlmClient for EchoLlm {
        async fn complete(&self, prompt: &str, _context: Option<&str>) -> Result<String, LlmError> {
            Ok(format!("answer to: {prompt}"))
        }

        fn model(&self) -> &str {
            "echo-model"
        }
    }

    struct StaticCaption;

    #[async_trait]
    impl CaptionClient for StaticCaption {
        async fn caption(&self, image: Vec<u8>) -> Result<String, VisionError> {
            Ok(format!("{} bytes of cargo", image.len()))
        }

        fn is_configured(&self) -> bool {
            false
        }
    }

    async fn telegram() -> MockServer {
        let server = MockServer::start().await;
        mount_telegram(&server).await;
        server
    }

    async fn mount_telegram(server: &MockServer) {
        for endpoint in ["sendMessage", "sendChatAction", "sendDocument"] {
            Mock::given(method("POST"))
                .and(path(format!("/bot{TOKEN}/{endpoint}")))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": true })),
                )
                .mount(server)
                .await;
        }
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/getFile")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": { "file_id": "ph-1", "file_path": "photos/ph-1.jpg" }
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/file/bot{TOKEN}/photos/ph-1.jpg")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7_u8; 12]))
            .mount(server)
            .await;
    }

    fn dispatcher(server: &MockServer) -> EventDispatcher {
        let api = Arc::new(
            BotApi::new(server.uri(), SecretString::from(TOKEN.to_owned()), 1).expect("client"),
        );
        let directory = Arc::new(Directory::embedded().expect("embedded directory"));
        let wizard = Arc::new(QuoteWizard::new(QuoteEngine::new(Arc::clone(&directory))));
        let runtime = Arc::new(AgentRuntime::new(
            wizard,
            Arc::new(EchoLlm),
            Arc::new(StaticCaption),
            Arc::new(TelegramOutbox::new(Arc::clone(&api))),
        ));
        chat_dispatcher(Arc::new(AtlantisBot::new(runtime, api, directory)))
    }

    fn update(update_id: i64, text: Option<&str>, photo: bool) -> UpdateEnvelope {
        let message = Message {
            message_id: update_id,
            from: Some(User { id: 11, is_bot: false, first_name: "Ana".to_owned(), username: None }),
            chat: Chat { id: 11, kind: "private".to_owned() },
            text: text.map(str::to_owned),
            caption: None,
            photo: photo.then(|| {
                vec![PhotoSize {
                    file_id: "ph-1".to_owned(),
                    file_unique_id: "u1".to_owned(),
                    width: 800,
                    height: 600,
                    file_size: None,
                }]
            }),
        };
        UpdateEnvelope::from_update(Update { update_id, message: Some(message) }, None)
    }

    async fn sent_texts(server: &MockServer) -> Vec<String> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path().ends_with("/sendMessage"))
            .filter_map(|request| serde_json::from_slice::<Value>(&request.body).ok())
            .filter_map(|body| body["text"].as_str().map(str::to_owned))
            .collect()
    }

    #[tokio::test]
    async fn quote_conversation_runs_end_to_end() {
        let server = telegram().await;
        let dispatcher = dispatcher(&server);
        let ctx = EventContext::default();

        let inputs = ["/quote", "algeria", "algiers", "spain", "valencia", "general", "50"];
        for (index, input) in inputs.iter().enumerate() {
            dispatcher
                .dispatch(&update(index as i64 + 1, Some(input), false), &ctx)
                .await
                .expect("dispatch");
        }
        let mut texts = sent_texts(&server).await;
        for _ in 0..40 {
            if texts.iter().any(|text| text.starts_with("💡 *Tips:*")) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            texts = sent_texts(&server).await;
        }

        assert!(texts[0].starts_with("*Step 1/6:* Origin country?"));
        assert!(texts.iter().any(|text| text.contains("*TOTAL: $2,936 USD*")));
        assert!(texts.iter().any(|text| text.starts_with("💡 *Tips:*\nanswer to: Give 3 key tips")));
    }

    #[tokio::test]
    async fn informational_commands_reply_with_markdown() {
        let server = telegram().await;
        let dispatcher = dispatcher(&server);

        dispatcher.dispatch(&update(1, Some("/status"), false), &EventContext::default()).await.expect("dispatch");
        dispatcher.dispatch(&update(2, Some("/track"), false), &EventContext::default()).await.expect("dispatch");

        let texts = sent_texts(&server).await;
        assert!(texts[0].contains("AI: echo-model"));
        assert!(texts[0].contains("Vision: ❌"));
        assert!(texts[1].contains("/track"));

        let requests = server.received_requests().await.unwrap_or_default();
        let body: Value = serde_json::from_slice(&requests[0].body).expect("json body");
        assert_eq!(body["parse_mode"], "Markdown");
        assert_eq!(body["reply_to_message_id"], 1);
    }

    #[tokio::test]
    async fn informational_commands_leave_the_wizard_in_place() {
        let server = telegram().await;
        let dispatcher = dispatcher(&server);
        let ctx = EventContext::default();

        for (index, input) in ["/quote", "algeria", "/ports", "algiers"].iter().enumerate() {
            dispatcher
                .dispatch(&update(index as i64 + 1, Some(input), false), &ctx)
                .await
                .expect("dispatch");
        }

        let texts = sent_texts(&server).await;
        assert_eq!(texts.len(), 4);
        assert!(texts[1].starts_with("*Step 2/6:*"));
        assert!(!texts[2].starts_with("*Step"));
        assert!(texts[3].starts_with("*Step 3/6:* Destination country?"));
    }

    #[tokio::test]
    async fn quote_command_mid_wizard_starts_over() {
        let server = telegram().await;
        let dispatcher = dispatcher(&server);
        let ctx = EventContext::default();

        for (index, input) in ["/quote", "algeria", "algiers", "/quote", "spain"].iter().enumerate() {
            dispatcher
                .dispatch(&update(index as i64 + 1, Some(input), false), &ctx)
                .await
                .expect("dispatch");
        }

        let texts = sent_texts(&server).await;
        assert_eq!(texts.len(), 5);
        assert!(texts[2].starts_with("*Step 3/6:*"));
        assert!(texts[3].starts_with("*Step 1/6:* Origin country?"));
        assert!(texts[4].starts_with("*Step 2/6:*"));
    }

    #[tokio::test]
    async fn photos_are_downloaded_and_captioned() {
        let server = telegram().await;
        let dispatcher = dispatcher(&server);

        dispatcher.dispatch(&update(3, None, true), &EventContext::default()).await.expect("dispatch");

        let texts = sent_texts(&server).await;
        assert_eq!(
            texts,
            vec!["📸 Result: 12 bytes of cargo\n\n💡 Add 'analyze' caption for documents".to_owned()]
        );
    }

    #[tokio::test]
    async fn failed_replies_send_a_user_safe_notice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/sendMessage")))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "ok": false,
                "error_code": 500,
                "description": "Internal Server Error"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_telegram(&server).await;
        let dispatcher = dispatcher(&server);

        let result = dispatcher
            .dispatch(&update(5, Some("/quote"), false), &EventContext::default())
            .await;

        assert!(result.is_err());
        let texts = sent_texts(&server).await;
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[1], "The service is temporarily unavailable. Please retry shortly.");
    }
}
