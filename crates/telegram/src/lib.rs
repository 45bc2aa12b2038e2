//! Telegram Integration - long-polling bot interface
//!
//! This crate provides the Telegram interface for Atlantis:
//! - **Polling** (`polling`) - `getUpdates` loop with offset tracking and backoff
//! - **Bot API** (`api`) - HTTPS client for messages, files, documents and chat actions
//! - **Commands** (`commands`) - `/quote`, `/ports`, `/status`, etc.
//! - **Events** (`events`) - Classifies updates into commands, text and photos
//! - **Messages** (`messages`) - Markdown bodies for informational commands
//!
//! # Getting Started
//!
//! 1. Create a bot with @BotFather and copy its token
//! 2. Set `ATLANTIS_TELEGRAM_BOT_TOKEN`
//! 3. Run `atlantis-server`; no public URL is needed
//!
//! # Architecture
//!
//! ```text
//! getUpdates → PollingRunner → EventDispatcher → ChatService → Agent Runtime → Core
//!                                                    ↓
//!                                  sendMessage / sendDocument ← Reply
//! ```
//!
//! # Key Types
//!
//! - `PollingRunner` - Update loop with reconnect backoff
//! - `EventDispatcher` - Routes updates to the matching handler
//! - `ChatService` - Trait implemented by the application
//! - `BotApi` - reqwest-backed `BotTransport`

pub mod api;
pub mod commands;
pub mod events;
pub mod messages;
pub mod polling;
pub mod updates;

pub use api::{BotApi, DocumentUpload, ParseMode};
pub use commands::{parse_command, BotCommand, ParsedCommand};
pub use events::{chat_dispatcher, ChatService, EventContext, EventDispatcher, EventHandlerError};
pub use polling::{BotTransport, PollingError, PollingRunner, ReconnectPolicy, TransportError};
