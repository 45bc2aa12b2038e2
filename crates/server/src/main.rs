mod bootstrap;
mod bot;
mod document;
mod health;

use std::time::Duration;

use anyhow::Result;
use atlantis_core::config::{AppConfig, LoadOptions};
use atlantis_telegram::TransportError;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use atlantis_core::config::LogFormat::*;

    // RUST_LOG wins over the configured level when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.health_state(),
    )
    .await?;

    let runner = match app.api.get_me().await {
        Ok(me) => {
            tracing::info!(
                event_name = "system.server.bot_identity",
                correlation_id = "bootstrap",
                bot_id = me.id,
                username = me.username.as_deref().unwrap_or("unknown"),
                "bot identity confirmed"
            );
            match me.username {
                Some(username) => app.runner.with_bot_username(username),
                None => app.runner,
            }
        }
        Err(TransportError::Unauthorized) => return Err(TransportError::Unauthorized.into()),
        Err(error) => {
            tracing::warn!(
                event_name = "system.server.bot_identity_unavailable",
                correlation_id = "bootstrap",
                error = %error,
                "could not confirm bot identity; group command addressing is disabled"
            );
            app.runner
        }
    };

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        transport_mode = "long_polling",
        model = %app.config.llm.model,
        "atlantis-server started"
    );

    tokio::select! {
        result = runner.start() => {
            if let Err(error) = &result {
                tracing::error!(
                    event_name = "system.server.polling_failed",
                    correlation_id = "shutdown",
                    error = %error,
                    "telegram polling stopped"
                );
            }
            result?;
        }
        signal = wait_for_shutdown() => signal?,
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        active_quotes = app.runtime.wizard().active_sessions(),
        "atlantis-server stopping"
    );
    let drained = tokio::time::timeout(
        Duration::from_secs(app.config.server.graceful_shutdown_secs),
        async {
            while app.runtime.pending_enrichments() > 0 {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        },
    )
    .await;
    if drained.is_err() {
        tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            pending = app.runtime.pending_enrichments(),
            "shutting down with shipment tips still pending"
        );
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
