use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::commands::{parse_command, CommandParseError, ParsedCommand};
use crate::updates::{Message, PhotoSize, Update};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateEnvelope {
    pub update_id: i64,
    pub event: InboundEvent,
}

impl UpdateEnvelope {
    /// Classifies a raw update; `bot_username` filters commands meant for other bots.
    pub fn from_update(update: Update, bot_username: Option<&str>) -> Self {
        Self { update_id: update.update_id, event: InboundEvent::classify(update, bot_username) }
    }

    pub fn chat_id(&self) -> Option<i64> {
        self.event.message().map(|message| message.chat.id)
    }

    pub fn user_id(&self) -> Option<i64> {
        self.event.message().and_then(Message::sender_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    Command { command: ParsedCommand, message: Message },
    Text { text: String, message: Message },
    Photo { photo: PhotoSize, message: Message },
    Unsupported { reason: String },
}

impl InboundEvent {
    pub fn event_type(&self) -> InboundEventType {
        match self {
            Self::Command { .. } => InboundEventType::Command,
            Self::Text { .. } => InboundEventType::Text,
            Self::Photo { .. } => InboundEventType::Photo,
            Self::Unsupported { .. } => InboundEventType::Unsupported,
        }
    }

    pub fn message(&self) -> Option<&Message> {
        match self {
            Self::Command { message, .. } | Self::Text { message, .. } | Self::Photo { message, .. } => {
                Some(message)
            }
            Self::Unsupported { .. } => None,
        }
    }

    fn classify(update: Update, bot_username: Option<&str>) -> Self {
        let Some(message) = update.message else {
            return Self::Unsupported { reason: "update carries no message".to_owned() };
        };
        if message.from.is_none() {
            return Self::Unsupported { reason: "message has no sender".to_owned() };
        }

        if let Some(photo) = message.largest_photo().cloned() {
            return Self::Photo { photo, message };
        }

        let Some(text) = message.text.clone() else {
            return Self::Unsupported { reason: "message has neither text nor photo".to_owned() };
        };

        match parse_command(&text, bot_username) {
            Ok(Some(command)) => Self::Command { command, message },
            Ok(None) => Self::Text { text, message },
            Err(CommandParseError::AddressedElsewhere(bot)) => {
                Self::Unsupported { reason: format!("command addressed to @{bot}") }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InboundEventType {
    Command,
    Text,
    Photo,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("command handler failure: {0}")]
    Command(String),
    #[error("text handler failure: {0}")]
    Text(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> InboundEventType;
    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<InboundEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Application side of the bot: one method per inbound event kind.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn on_command(
        &self,
        command: &ParsedCommand,
        message: &Message,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError>;

    async fn on_text(
        &self,
        text: &str,
        message: &Message,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError>;

    async fn on_photo(
        &self,
        photo: &PhotoSize,
        message: &Message,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError>;
}

pub fn chat_dispatcher<S>(service: Arc<S>) -> EventDispatcher
where
    S: ChatService + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(CommandHandler { service: Arc::clone(&service) });
    dispatcher.register(TextHandler { service: Arc::clone(&service) });
    dispatcher.register(PhotoHandler { service });
    dispatcher
}

pub struct CommandHandler<S> {
    service: Arc<S>,
}

#[async_trait]
impl<S> EventHandler for CommandHandler<S>
where
    S: ChatService + 'static,
{
    fn event_type(&self) -> InboundEventType {
        InboundEventType::Command
    }

    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InboundEvent::Command { command, message } = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.service.on_command(command, message, ctx).await?;
        Ok(HandlerResult::Processed)
    }
}

pub struct TextHandler<S> {
    service: Arc<S>,
}

#[async_trait]
impl<S> EventHandler for TextHandler<S>
where
    S: ChatService + 'static,
{
    fn event_type(&self) -> InboundEventType {
        InboundEventType::Text
    }

    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InboundEvent::Text { text, message } = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.service.on_text(text, message, ctx).await?;
        Ok(HandlerResult::Processed)
    }
}

pub struct PhotoHandler<S> {
    service: Arc<S>,
}

#[async_trait]
impl<S> EventHandler for PhotoHandler<S>
where
    S: ChatService + 'static,
{
    fn event_type(&self) -> InboundEventType {
        InboundEventType::Photo
    }

    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InboundEvent::Photo { photo, message } = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.service.on_photo(photo, message, ctx).await?;
        Ok(HandlerResult::Processed)
    }
}
