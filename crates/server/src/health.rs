use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use atlantis_core::{Directory, QuoteWizard};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    pub directory: Arc<Directory>,
    pub wizard: Arc<QuoteWizard>,
    pub inference_keys: usize,
    pub transport_mode: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub directory: HealthCheck,
    pub inference: HealthCheck,
    pub transport_mode: &'static str,
    pub active_quotes: usize,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let directory = HealthCheck {
        status: "ready",
        detail: format!(
            "{} ports, {} carriers, {} cargo types",
            state.directory.port_count(),
            state.directory.carrier_count(),
            state.directory.cargo_keys().len()
        ),
    };
    let inference = inference_check(state.inference_keys);
    let ready = inference.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "atlantis-server runtime initialized".to_string(),
        },
        directory,
        inference,
        transport_mode: state.transport_mode,
        active_quotes: state.wizard.active_sessions(),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn inference_check(keys: usize) -> HealthCheck {
    if keys == 0 {
        HealthCheck {
            status: "degraded",
            detail: "no inference api keys configured; answers fall back to error text".to_string(),
        }
    } else {
        HealthCheck { status: "ready", detail: format!("{keys} inference api key(s) in rotation") }
    }
}
