use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::events::{EventContext, EventDispatcher, UpdateEnvelope};
use crate::updates::Update;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("bot token was rejected by the Bot API")]
    Unauthorized,
    #[error("another instance is already polling this bot")]
    Conflict,
    #[error("transport request failed: {0}")]
    Request(String),
    #[error("Bot API returned status {status}: {description}")]
    Api { status: u16, description: String },
    #[error("Bot API response could not be decoded: {0}")]
    Decode(String),
}

impl TransportError {
    /// Errors that retrying cannot fix.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::Conflict)
    }
}

#[derive(Debug, Error)]
pub enum PollingError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("polling gave up after {attempts} consecutive failures: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: TransportError },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failures tolerated before the runner stops; `None` retries forever.
    pub max_retries: Option<u32>,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: None, base_delay_ms: 1_000, max_delay_ms: 60_000 }
    }
}

impl ReconnectPolicy {
    pub fn with_max_delay(max_delay: Duration) -> Self {
        let max_delay_ms = u64::try_from(max_delay.as_millis()).unwrap_or(u64::MAX);
        Self { max_delay_ms, ..Self::default() }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    fn exhausted(&self, failures: u32) -> bool {
        self.max_retries.is_some_and(|max_retries| failures > max_retries)
    }
}

#[async_trait]
pub trait BotTransport: Send + Sync {
    /// Runs once before polling: clears webhooks and stale updates.
    async fn prepare(&self) -> Result<(), TransportError>;
    /// `Ok(None)` means the update stream is closed.
    async fn poll(&self, offset: Option<i64>) -> Result<Option<Vec<Update>>, TransportError>;
}

pub struct PollingRunner {
    transport: Arc<dyn BotTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
    bot_username: Option<String>,
}

impl PollingRunner {
    pub fn new(
        transport: Arc<dyn BotTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy, bot_username: None }
    }

    pub fn with_bot_username(mut self, bot_username: impl Into<String>) -> Self {
        self.bot_username = Some(bot_username.into());
        self
    }

    /// Polls until the stream closes or a fatal transport error occurs.
    pub async fn start(&self) -> Result<(), PollingError> {
        self.with_retries("prepare", || self.transport.prepare()).await?;
        info!(event_name = "ingress.telegram.polling_started", "long polling started");

        let mut offset: Option<i64> = None;
        let mut failures: u32 = 0;
        loop {
            let batch = match self.transport.poll(offset).await {
                Ok(Some(batch)) => batch,
                Ok(None) => {
                    info!(event_name = "ingress.telegram.polling_stopped", "update stream closed");
                    return Ok(());
                }
                Err(transport_error) => {
                    failures += 1;
                    self.on_failure("poll", failures, transport_error).await?;
                    continue;
                }
            };
            failures = 0;

            for update in batch {
                offset = Some(offset.map_or(update.update_id + 1, |current| {
                    current.max(update.update_id + 1)
                }));
                self.dispatch_update(update).await;
            }
        }
    }

    async fn dispatch_update(&self, update: Update) {
        let envelope = UpdateEnvelope::from_update(update, self.bot_username.as_deref());
        let correlation_id = format!("tg-{}", envelope.update_id);

        info!(
            event_name = "ingress.telegram.update_received",
            update_id = envelope.update_id,
            event_type = ?envelope.event.event_type(),
            correlation_id = %correlation_id,
            chat_id = envelope.chat_id().unwrap_or_default(),
            user_id = envelope.user_id().unwrap_or_default(),
            "received telegram update"
        );

        let context = EventContext { correlation_id };
        match self.dispatcher.dispatch(&envelope, &context).await {
            Ok(result) => debug!(
                event_name = "ingress.telegram.update_handled",
                update_id = envelope.update_id,
                correlation_id = %context.correlation_id,
                result = ?result,
                "update handled"
            ),
            Err(error) => warn!(
                update_id = envelope.update_id,
                correlation_id = %context.correlation_id,
                error = %error,
                "update dispatch failed; continuing polling loop"
            ),
        }
    }

    async fn with_retries<F, Fut>(&self, operation: &str, mut call: F) -> Result<(), PollingError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<(), TransportError>>,
    {
        let mut failures = 0;
        loop {
            match call().await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    failures += 1;
                    self.on_failure(operation, failures, transport_error).await?;
                }
            }
        }
    }

    async fn on_failure(
        &self,
        operation: &str,
        failures: u32,
        transport_error: TransportError,
    ) -> Result<(), PollingError> {
        if transport_error.is_fatal() {
            error!(
                event_name = "ingress.telegram.polling_aborted",
                operation,
                error = %transport_error,
                "telegram transport failed permanently"
            );
            return Err(PollingError::Transport(transport_error));
        }

        if self.reconnect_policy.exhausted(failures) {
            return Err(PollingError::RetriesExhausted {
                attempts: failures,
                last_error: transport_error,
            });
        }

        let delay = self.reconnect_policy.backoff(failures.saturating_sub(1));
        warn!(
            operation,
            attempt = failures,
            max_retries = ?self.reconnect_policy.max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %transport_error,
            "telegram transport failed; backing off"
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}
