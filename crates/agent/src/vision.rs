use std::time::Duration;

use async_trait::async_trait;
use atlantis_core::config::VisionConfig;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

const UNRECOGNIZED: &str = "Unable to recognize";

#[async_trait]
pub trait CaptionClient: Send + Sync {
    async fn caption(&self, image: Vec<u8>) -> Result<String, VisionError>;

    fn is_configured(&self) -> bool;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum VisionError {
    #[error("captioning api returned status {0}")]
    Status(u16),
    #[error("captioning request failed: {0}")]
    Transport(String),
}

impl VisionError {
    pub fn user_text(&self) -> String {
        match self {
            Self::Status(code) => format!("API Error: {code}"),
            Self::Transport(detail) => format!("Error: {detail}"),
        }
    }
}

/// Hugging Face style image-to-text endpoint: raw bytes in, `[{generated_text}]` out.
pub struct InferenceCaptionClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
}

impl InferenceCaptionClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, VisionError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| VisionError::Transport(error.to_string()))?;
        Ok(Self { http, endpoint: endpoint.into(), api_key })
    }

    pub fn from_config(config: &VisionConfig) -> Result<Self, VisionError> {
        Self::new(
            config.endpoint.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl CaptionClient for InferenceCaptionClient {
    async fn caption(&self, image: Vec<u8>) -> Result<String, VisionError> {
        let mut request = self.http.post(&self.endpoint).body(image);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response =
            request.send().await.map_err(|error| VisionError::Transport(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            warn!(
                event_name = "inference.caption.failed",
                status = status.as_u16(),
                "captioning endpoint rejected the image"
            );
            return Err(VisionError::Status(status.as_u16()));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|error| VisionError::Transport(error.to_string()))?;
        debug!(event_name = "inference.caption.succeeded", "caption received");
        Ok(caption_from_body(&body))
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

fn caption_from_body(body: &Value) -> String {
    match body.as_array().and_then(|results| results.first()) {
        Some(first) => first
            .get("generated_text")
            .and_then(Value::as_str)
            .unwrap_or(UNRECOGNIZED)
            .to_string(),
        None => body.to_string(),
    }
}
