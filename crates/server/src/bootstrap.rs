use std::sync::Arc;
use std::time::Duration;

use atlantis_agent::{
    AgentRuntime, ChatCompletionsClient, InferenceCaptionClient, LlmError, VisionError,
};
use atlantis_core::config::{AppConfig, ConfigError, LoadOptions};
use atlantis_core::{Directory, DirectoryError, QuoteEngine, QuoteWizard, TracingAuditSink};
use atlantis_telegram::{
    chat_dispatcher, BotApi, BotTransport, PollingRunner, ReconnectPolicy, TransportError,
};
use thiserror::Error;
use tracing::info;

use crate::bot::{AtlantisBot, TelegramOutbox};
use crate::document::{DocumentError, QuoteDocumentGenerator};
use crate::health::HealthState;

pub struct Application {
    pub config: AppConfig,
    pub directory: Arc<Directory>,
    pub runtime: Arc<AgentRuntime>,
    pub api: Arc<BotApi>,
    pub runner: PollingRunner,
    pub inference_keys: usize,
}

impl Application {
    pub fn health_state(&self) -> HealthState {
        HealthState {
            directory: Arc::clone(&self.directory),
            wizard: self.runtime.shared_wizard(),
            inference_keys: self.inference_keys,
            transport_mode: "long_polling",
        }
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("port directory could not be loaded: {0}")]
    Directory(#[from] DirectoryError),
    #[error("telegram client could not be built: {0}")]
    Transport(#[source] TransportError),
    #[error("inference client could not be built: {0}")]
    Inference(#[source] LlmError),
    #[error("vision client could not be built: {0}")]
    Vision(#[source] VisionError),
    #[error("quote document generator could not be built: {0}")]
    Document(#[from] DocumentError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let directory = Arc::new(Directory::load_or_embedded(config.directory.path.as_deref())?);
    info!(
        event_name = "system.bootstrap.directory_loaded",
        correlation_id = "bootstrap",
        ports = directory.port_count(),
        carriers = directory.carrier_count(),
        "port directory loaded"
    );

    let wizard = Arc::new(
        QuoteWizard::new(QuoteEngine::new(Arc::clone(&directory)))
            .with_audit_sink(Arc::new(TracingAuditSink)),
    );

    let llm = ChatCompletionsClient::from_config(&config.llm).map_err(BootstrapError::Inference)?;
    let inference_keys = llm.key_count();
    info!(
        event_name = "system.bootstrap.inference_ready",
        correlation_id = "bootstrap",
        model = %config.llm.model,
        api_keys = inference_keys,
        "inference client initialized"
    );

    let vision =
        InferenceCaptionClient::from_config(&config.vision).map_err(BootstrapError::Vision)?;
    let api = Arc::new(BotApi::from_config(&config.telegram).map_err(BootstrapError::Transport)?);

    let mut runtime = AgentRuntime::new(
        wizard,
        Arc::new(llm),
        Arc::new(vision),
        Arc::new(TelegramOutbox::new(Arc::clone(&api))),
    )
    .with_audit_sink(Arc::new(TracingAuditSink));

    if config.documents.enabled {
        let generator = QuoteDocumentGenerator::new(&config.documents.converter)?;
        info!(
            event_name = "system.bootstrap.documents_ready",
            correlation_id = "bootstrap",
            pdf = generator.produces_pdf(),
            "quote document generator initialized"
        );
        runtime = runtime.with_documents(Arc::new(generator));
    }
    let runtime = Arc::new(runtime);

    let dispatcher = chat_dispatcher(Arc::new(AtlantisBot::new(
        Arc::clone(&runtime),
        Arc::clone(&api),
        Arc::clone(&directory),
    )));
    let runner = PollingRunner::new(
        Arc::clone(&api) as Arc<dyn BotTransport>,
        dispatcher,
        ReconnectPolicy::with_max_delay(Duration::from_secs(config.telegram.max_backoff_secs)),
    );

    info!(
        event_name = "system.bootstrap.complete",
        correlation_id = "bootstrap",
        "application bootstrap complete"
    );

    Ok(Application { config, directory, runtime, api, runner, inference_keys })
}
