use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use atlantis_core::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink, NoopAuditSink};
use atlantis_core::{FreightQuote, QuoteWizard, UserId};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::conversation::{classify_caption, mentions_pricing, PhotoIntent, QUOTE_TIP};
use crate::llm::{LlmClient, LlmError};
use crate::prompts::{document_analysis_prompt, SHIPMENT_TIPS_PROMPT};
use crate::vision::CaptionClient;

pub const GENERATING_QUOTE_REPLY: &str = "⚙️ Generating quote...";
pub const QUOTE_CANCELLED_REPLY: &str = "Quote cancelled. Send /quote to start a new one.";
pub const NO_QUOTE_REPLY: &str = "No quote in progress. Send /quote to start one.";
const AUDIT_ACTOR: &str = "agent-runtime";

/// Where a message came from; replies go back to the same chat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatContext {
    pub chat_id: i64,
    pub user_id: UserId,
    pub message_id: Option<i64>,
    pub correlation_id: String,
}

impl ChatContext {
    fn audit(&self, correlation_id: &str) -> AuditContext {
        AuditContext::new(Some(self.user_id), Some(self.chat_id), correlation_id, AUDIT_ACTOR)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextFormat {
    Markdown,
    Plain,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedDocument {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub caption: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundMessage {
    Text { text: String, format: TextFormat, reply_to: Option<i64> },
    Typing,
    Document(RenderedDocument),
}

impl OutboundMessage {
    pub fn markdown(text: impl Into<String>) -> Self {
        Self::Text { text: text.into(), format: TextFormat::Markdown, reply_to: None }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::Text { text: text.into(), format: TextFormat::Plain, reply_to: None }
    }

    pub fn replying_to(self, message_id: Option<i64>) -> Self {
        match self {
            Self::Text { text, format, .. } => Self::Text { text, format, reply_to: message_id },
            other => other,
        }
    }
}

#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn deliver(&self, chat_id: i64, message: OutboundMessage) -> Result<()>;
}

#[async_trait]
pub trait QuoteDocumentRenderer: Send + Sync {
    async fn render(&self, quote: &FreightQuote, correlation_id: &str) -> Result<RenderedDocument>;

    /// Short label for status output, e.g. "PDF" or "HTML".
    fn format_label(&self) -> &str;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    Delivered,
    /// The tips message still went out, carrying the inline error text.
    InferenceFailed(LlmError),
    DeliveryFailed(String),
}

#[derive(Debug)]
pub enum TextOutcome {
    WizardStep,
    QuoteCompleted {
        quote: Box<FreightQuote>,
        document_sent: bool,
        enrichment: JoinHandle<EnrichmentOutcome>,
    },
    Answered { inference_ok: bool, suggested_quote: bool },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhotoOutcome {
    Described,
    DocumentAnalyzed,
    Failed(String),
}

pub struct AgentRuntime {
    wizard: Arc<QuoteWizard>,
    llm: Arc<dyn LlmClient>,
    vision: Arc<dyn CaptionClient>,
    outbox: Arc<dyn ReplySink>,
    documents: Option<Arc<dyn QuoteDocumentRenderer>>,
    audit: Arc<dyn AuditSink>,
    pending_enrichments: Arc<AtomicUsize>,
}

impl AgentRuntime {
    pub fn new(
        wizard: Arc<QuoteWizard>,
        llm: Arc<dyn LlmClient>,
        vision: Arc<dyn CaptionClient>,
        outbox: Arc<dyn ReplySink>,
    ) -> Self {
        Self {
            wizard,
            llm,
            vision,
            outbox,
            documents: None,
            audit: Arc::new(NoopAuditSink),
            pending_enrichments: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_documents(mut self, renderer: Arc<dyn QuoteDocumentRenderer>) -> Self {
        self.documents = Some(renderer);
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn wizard(&self) -> &QuoteWizard {
        &self.wizard
    }

    pub fn shared_wizard(&self) -> Arc<QuoteWizard> {
        Arc::clone(&self.wizard)
    }

    pub fn llm_model(&self) -> &str {
        self.llm.model()
    }

    pub fn vision_configured(&self) -> bool {
        self.vision.is_configured()
    }

    /// Tips requests spawned after a finished quote that have not replied yet.
    pub fn pending_enrichments(&self) -> usize {
        self.pending_enrichments.load(Ordering::SeqCst)
    }

    pub fn document_format(&self) -> Option<&str> {
        self.documents.as_ref().map(|renderer| renderer.format_label())
    }

    pub async fn start_quote(&self, ctx: &ChatContext) -> Result<()> {
        let prompt = self.wizard.start(ctx.user_id);
        self.reply(ctx, OutboundMessage::markdown(prompt)).await
    }

    pub async fn cancel_quote(&self, ctx: &ChatContext) -> Result<bool> {
        let cancelled = self.wizard.cancel(ctx.user_id);
        let text = if cancelled { QUOTE_CANCELLED_REPLY } else { NO_QUOTE_REPLY };
        self.reply(ctx, OutboundMessage::plain(text)).await?;
        Ok(cancelled)
    }

    /// Routes non-command text: active wizard first, otherwise a free-form answer.
    pub async fn handle_text(&self, ctx: &ChatContext, text: &str) -> Result<TextOutcome> {
        let Some(reply) = self.wizard.advance_wizard(ctx.user_id, text) else {
            return self.answer(ctx, text).await;
        };

        let quote = match reply.quote {
            Some(quote) if reply.completed => quote,
            _ => {
                self.reply(ctx, OutboundMessage::markdown(reply.text)).await?;
                return Ok(TextOutcome::WizardStep);
            }
        };

        self.outbox.deliver(ctx.chat_id, OutboundMessage::plain(GENERATING_QUOTE_REPLY)).await?;
        self.outbox.deliver(ctx.chat_id, OutboundMessage::markdown(reply.text)).await?;
        let document_sent = self.send_document(ctx, &quote, &reply.correlation_id).await;
        let enrichment = self.spawn_enrichment(ctx, &quote, &reply.correlation_id);

        Ok(TextOutcome::QuoteCompleted { quote: Box::new(quote), document_sent, enrichment })
    }

    /// Captions a photo and, when the caption asks for it, reviews it as a
    /// shipping document. Failures are reported to the chat, never returned.
    pub async fn handle_photo<F>(
        &self,
        ctx: &ChatContext,
        caption: Option<&str>,
        download: F,
    ) -> PhotoOutcome
    where
        F: Future<Output = Result<Vec<u8>>> + Send,
    {
        match self.describe_photo(ctx, caption, download).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(
                    event_name = "agent.photo.failed",
                    correlation_id = %ctx.correlation_id,
                    chat_id = ctx.chat_id,
                    error = %error,
                    "photo handling failed"
                );
                let text = format!("❌ Error: {error}");
                if let Err(send_error) = self.reply(ctx, OutboundMessage::plain(text)).await {
                    warn!(
                        event_name = "agent.photo.error_reply_failed",
                        correlation_id = %ctx.correlation_id,
                        error = %send_error,
                        "could not report photo failure"
                    );
                }
                PhotoOutcome::Failed(error.to_string())
            }
        }
    }

    async fn describe_photo<F>(
        &self,
        ctx: &ChatContext,
        caption: Option<&str>,
        download: F,
    ) -> Result<PhotoOutcome>
    where
        F: Future<Output = Result<Vec<u8>>> + Send,
    {
        let image = download.await?;
        let scan = match self.vision.caption(image).await {
            Ok(scan) => scan,
            Err(error) => error.user_text(),
        };

        match classify_caption(caption) {
            PhotoIntent::DocumentReview => {
                self.outbox
                    .deliver(
                        ctx.chat_id,
                        OutboundMessage::markdown(format!("👁️ Scan: {scan}\n\n⚙️ Analyzing...")),
                    )
                    .await?;
                let analysis = self.complete_inline(&document_analysis_prompt(&scan), None).await;
                self.outbox
                    .deliver(
                        ctx.chat_id,
                        OutboundMessage::markdown(format!("📋 *ANALYSIS*\n\n{}", analysis.text)),
                    )
                    .await?;
                Ok(PhotoOutcome::DocumentAnalyzed)
            }
            PhotoIntent::Snapshot => {
                let text =
                    format!("📸 Result: {scan}\n\n💡 Add 'analyze' caption for documents");
                self.reply(ctx, OutboundMessage::markdown(text)).await?;
                Ok(PhotoOutcome::Described)
            }
        }
    }

    async fn answer(&self, ctx: &ChatContext, text: &str) -> Result<TextOutcome> {
        self.outbox.deliver(ctx.chat_id, OutboundMessage::Typing).await?;
        let completion = self.complete_inline(text, None).await;
        if let Some(error) = &completion.error {
            self.audit.emit(
                ctx.audit(&ctx.correlation_id)
                    .event("inference.answer.failed", AuditCategory::Inference, AuditOutcome::Failed)
                    .with_metadata("error", error.to_string()),
            );
        }
        self.reply(ctx, OutboundMessage::plain(completion.text)).await?;

        let suggested_quote = mentions_pricing(text);
        if suggested_quote {
            self.outbox.deliver(ctx.chat_id, OutboundMessage::markdown(QUOTE_TIP)).await?;
        }
        Ok(TextOutcome::Answered { inference_ok: completion.error.is_none(), suggested_quote })
    }

    async fn send_document(&self, ctx: &ChatContext, quote: &FreightQuote, correlation_id: &str) -> bool {
        let Some(renderer) = &self.documents else {
            return false;
        };
        let audit = ctx.audit(correlation_id);

        let result = match renderer.render(quote, correlation_id).await {
            Ok(document) => self.outbox.deliver(ctx.chat_id, OutboundMessage::Document(document)).await,
            Err(error) => Err(error),
        };

        match result {
            Ok(()) => {
                self.audit.emit(audit.event(
                    "delivery.document.sent",
                    AuditCategory::Delivery,
                    AuditOutcome::Success,
                ));
                true
            }
            Err(error) => {
                warn!(
                    event_name = "delivery.document.failed",
                    correlation_id = %correlation_id,
                    chat_id = ctx.chat_id,
                    error = %error,
                    "quote document was not delivered"
                );
                self.audit.emit(
                    audit
                        .event("delivery.document.failed", AuditCategory::Delivery, AuditOutcome::Failed)
                        .with_metadata("error", error.to_string()),
                );
                false
            }
        }
    }

    fn spawn_enrichment(
        &self,
        ctx: &ChatContext,
        quote: &FreightQuote,
        correlation_id: &str,
    ) -> JoinHandle<EnrichmentOutcome> {
        let llm = Arc::clone(&self.llm);
        let outbox = Arc::clone(&self.outbox);
        let audit_sink = Arc::clone(&self.audit);
        let audit = ctx.audit(correlation_id);
        let chat_id = ctx.chat_id;
        let advisory_context = quote.advisory_context();
        let pending = Arc::clone(&self.pending_enrichments);
        pending.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            let (insights, failure) =
                match llm.complete(SHIPMENT_TIPS_PROMPT, Some(advisory_context.as_str())).await {
                    Ok(insights) => (insights, None),
                    Err(error) => (error.user_text(), Some(error)),
                };

            let message = OutboundMessage::markdown(format!("💡 *Tips:*\n{insights}"));
            let outcome = match (outbox.deliver(chat_id, message).await, failure) {
                (Err(error), _) => EnrichmentOutcome::DeliveryFailed(error.to_string()),
                (Ok(()), Some(error)) => EnrichmentOutcome::InferenceFailed(error),
                (Ok(()), None) => EnrichmentOutcome::Delivered,
            };

            let audit_outcome = if outcome == EnrichmentOutcome::Delivered {
                AuditOutcome::Success
            } else {
                AuditOutcome::Failed
            };
            audit_sink.emit(
                audit
                    .event("inference.enrichment.finished", AuditCategory::Inference, audit_outcome)
                    .with_metadata("outcome", format!("{outcome:?}")),
            );
            info!(
                event_name = "inference.enrichment.finished",
                correlation_id = %audit.correlation_id,
                chat_id,
                outcome = ?outcome,
                "shipment tips enrichment finished"
            );
            pending.fetch_sub(1, Ordering::SeqCst);
            outcome
        })
    }

    async fn complete_inline(&self, prompt: &str, context: Option<&str>) -> InlineCompletion {
        match self.llm.complete(prompt, context).await {
            Ok(text) => InlineCompletion { text, error: None },
            Err(error) => InlineCompletion { text: error.user_text(), error: Some(error) },
        }
    }

    async fn reply(&self, ctx: &ChatContext, message: OutboundMessage) -> Result<()> {
        self.outbox.deliver(ctx.chat_id, message.replying_to(ctx.message_id)).await
    }
}

struct InlineCompletion {
    text: String,
    error: Option<LlmError>,
}
