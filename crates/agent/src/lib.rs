//! Agent Runtime - inference clients and chat orchestration
//!
//! This crate sits between the chat transport and the deterministic core:
//! - Routes non-command text to the quote wizard or to a free-form answer
//! - Calls the chat-completion API with a rotating key pool (`llm`)
//! - Captions photos and reviews shipping documents (`vision`, `prompts`)
//! - Requests shipment tips after a quote on a detached task
//!
//! # Key Types
//!
//! - `AgentRuntime` - Main orchestrator (see `runtime` module)
//! - `LlmClient` - Pluggable completion trait, `ChatCompletionsClient` for OpenAI-compatible APIs
//! - `ReplySink` - Outbound seam implemented by the chat transport
//!
//! Prices never come from the model. Quotes are computed by `atlantis-core`
//! and the model only adds commentary next to them.

pub mod conversation;
pub mod llm;
pub mod prompts;
pub mod runtime;
pub mod vision;

pub use llm::{ChatCompletionsClient, KeyRing, LlmClient, LlmError, RetryPolicy};
pub use runtime::{
    AgentRuntime, ChatContext, EnrichmentOutcome, OutboundMessage, PhotoOutcome,
    QuoteDocumentRenderer, RenderedDocument, ReplySink, TextFormat, TextOutcome,
};
pub use vision::{CaptionClient, InferenceCaptionClient, VisionError};
