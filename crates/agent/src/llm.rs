use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use atlantis_core::config::LlmConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::prompts;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// `context` is appended to the system prompt when present.
    async fn complete(&self, prompt: &str, context: Option<&str>) -> Result<String, LlmError>;

    fn model(&self) -> &str;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("no inference api keys are configured")]
    NoKeys,
    #[error("inference api rejected the api key")]
    Unauthorized,
    #[error("inference api rate limit reached")]
    RateLimited,
    #[error("inference api returned status {0}")]
    Status(u16),
    #[error("inference request failed: {0}")]
    Transport(String),
    #[error("inference response could not be decoded: {0}")]
    Decode(String),
}

impl LlmError {
    /// Short text sent to the chat in place of a completion.
    pub fn user_text(&self) -> String {
        match self {
            Self::NoKeys | Self::Unauthorized => "Invalid API key".to_string(),
            Self::RateLimited => "Rate limit. Wait and retry.".to_string(),
            Self::Status(code) => format!("Error {code}"),
            Self::Transport(_) | Self::Decode(_) => "Error. Please retry.".to_string(),
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited | Self::Transport(_) => true,
            Self::Status(code) => *code >= 500,
            Self::NoKeys | Self::Unauthorized | Self::Decode(_) => false,
        }
    }
}

/// Hands out API keys round-robin, one per request attempt.
#[derive(Debug)]
pub struct KeyRing {
    keys: Vec<SecretString>,
    cursor: AtomicUsize,
}

impl KeyRing {
    pub fn new(keys: Vec<SecretString>) -> Self {
        Self { keys, cursor: AtomicUsize::new(0) }
    }

    pub fn next_key(&self) -> Option<&SecretString> {
        if self.keys.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        self.keys.get(index)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, base_delay_ms: 500, max_delay_ms: 8_000 }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl From<&LlmConfig> for CompletionSettings {
    fn from(config: &LlmConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// OpenAI-compatible `/chat/completions` client.
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    settings: CompletionSettings,
    keys: KeyRing,
    retry: RetryPolicy,
}

impl ChatCompletionsClient {
    pub fn new(
        settings: CompletionSettings,
        keys: KeyRing,
        retry: RetryPolicy,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;
        Ok(Self { http, settings, keys, retry })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        Self::new(
            CompletionSettings::from(config),
            KeyRing::new(config.api_keys.clone()),
            RetryPolicy { max_retries: config.max_retries, ..RetryPolicy::default() },
        )
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url)
    }

    async fn attempt(&self, key: &SecretString, request: &ChatRequest<'_>) -> Result<String, LlmError> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        let status = response.status().as_u16();
        match status {
            200..=299 => {}
            401 => return Err(LlmError::Unauthorized),
            429 => return Err(LlmError::RateLimited),
            other => return Err(LlmError::Status(other)),
        }

        let body = response
            .json::<ChatResponse>()
            .await
            .map_err(|error| LlmError::Decode(error.to_string()))?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LlmError::Decode("response carried no choices".to_string()))
    }
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    async fn complete(&self, prompt: &str, context: Option<&str>) -> Result<String, LlmError> {
        let system = prompts::system_message(context);
        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage { role: "system", content: &system },
                ChatMessage { role: "user", content: prompt },
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let mut attempt = 0;
        loop {
            let key = self.keys.next_key().ok_or(LlmError::NoKeys)?;
            let error = match self.attempt(key, &request).await {
                Ok(content) => {
                    debug!(
                        event_name = "inference.completion.succeeded",
                        attempt,
                        model = %self.settings.model,
                        "completion received"
                    );
                    return Ok(content);
                }
                Err(error) => error,
            };

            let rotate = matches!(error, LlmError::Unauthorized | LlmError::RateLimited)
                && self.keys.len() > 1;
            if attempt >= self.retry.max_retries || !(error.is_retryable() || rotate) {
                warn!(
                    event_name = "inference.completion.failed",
                    attempt,
                    error = %error,
                    "completion failed"
                );
                return Err(error);
            }

            warn!(
                event_name = "inference.completion.retrying",
                attempt,
                max_retries = self.retry.max_retries,
                error = %error,
                "completion attempt failed; retrying"
            );
            // a fresh key is tried immediately after an auth failure
            if !matches!(error, LlmError::Unauthorized) {
                let delay = self.retry.backoff(attempt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            attempt += 1;
        }
    }

    fn model(&self) -> &str {
        &self.settings.model
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use secrecy::{ExposeSecret, SecretString};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{ChatCompletionsClient, CompletionSettings, KeyRing, LlmClient, LlmError, RetryPolicy};

    fn keys(values: &[&str]) -> KeyRing {
        KeyRing::new(values.iter().map(|value| SecretString::from(value.to_string())).collect())
    }

    fn client(server: &MockServer, ring: KeyRing, max_retries: u32) -> ChatCompletionsClient {
        ChatCompletionsClient::new(
            CompletionSettings {
                base_url: server.uri(),
                model: "llama-3.3-70b-versatile".to_string(),
                temperature: 0.7,
                max_tokens: 600,
                timeout: Duration::from_secs(5),
            },
            ring,
            RetryPolicy { max_retries, base_delay_ms: 0, max_delay_ms: 0 },
        )
        .expect("client builds")
    }

    fn completion(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .set_body_json(json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] }))
    }

    #[test]
    fn key_ring_rotates_round_robin() {
        let ring = keys(&["k1", "k2", "k3"]);
        let handed_out: Vec<String> =
            (0..5).filter_map(|_| ring.next_key()).map(|key| key.expose_secret().to_string()).collect();

        assert_eq!(handed_out, vec!["k1", "k2", "k3", "k1", "k2"]);
        assert!(keys(&[]).next_key().is_none());
    }

    #[test]
    fn errors_map_to_inline_user_text() {
        assert_eq!(LlmError::Unauthorized.user_text(), "Invalid API key");
        assert_eq!(LlmError::RateLimited.user_text(), "Rate limit. Wait and retry.");
        assert_eq!(LlmError::Status(503).user_text(), "Error 503");
        assert_eq!(LlmError::Transport("reset".into()).user_text(), "Error. Please retry.");
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy { max_retries: 5, base_delay_ms: 100, max_delay_ms: 1_000 };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(10), Duration::from_millis(1_000));
    }

    #[tokio::test]
    async fn completion_sends_system_prompt_with_context() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer k1"))
            .and(body_partial_json(json!({
                "model": "llama-3.3-70b-versatile",
                "max_tokens": 600,
                "messages": [
                    { "role": "system" },
                    { "role": "user", "content": "Give 3 key tips for this shipment" }
                ]
            })))
            .respond_with(completion("1. Book early"))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client(&server, keys(&["k1"]), 0)
            .complete("Give 3 key tips for this shipment", Some("Route: A to B, 5.0t general"))
            .await
            .expect("completion succeeds");

        assert_eq!(reply, "1. Book early");
        let requests = server.received_requests().await.expect("recorded requests");
        let body: serde_json::Value =
            serde_json::from_slice(&requests[0].body).expect("json body");
        let system = body["messages"][0]["content"].as_str().expect("system prompt");
        assert!(system.starts_with("You are Atlantis AI"));
        assert!(system.ends_with("\n\nContext: Route: A to B, 5.0t general"));
    }

    #[tokio::test]
    async fn unauthorized_with_single_key_maps_to_invalid_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let error = client(&server, keys(&["bad"]), 3)
            .complete("hello", None)
            .await
            .expect_err("401 is terminal with one key");

        assert_eq!(error, LlmError::Unauthorized);
        assert_eq!(error.user_text(), "Invalid API key");
    }

    #[tokio::test]
    async fn rate_limited_key_rotates_to_next_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer k1"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer k2"))
            .respond_with(completion("ok from k2"))
            .mount(&server)
            .await;

        let reply = client(&server, keys(&["k1", "k2"]), 2)
            .complete("hello", None)
            .await
            .expect("second key succeeds");

        assert_eq!(reply, "ok from k2");
    }

    #[tokio::test]
    async fn rate_limit_exhausting_retries_reports_rate_limit_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let error = client(&server, keys(&["k1"]), 2)
            .complete("hello", None)
            .await
            .expect_err("always rate limited");

        assert_eq!(error.user_text(), "Rate limit. Wait and retry.");
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_succeed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(completion("recovered"))
            .mount(&server)
            .await;

        let reply = client(&server, keys(&["k1"]), 1)
            .complete("hello", None)
            .await
            .expect("retry succeeds");

        assert_eq!(reply, "recovered");
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let error = client(&server, keys(&["k1"]), 3)
            .complete("hello", None)
            .await
            .expect_err("400 is terminal");

        assert_eq!(error, LlmError::Status(400));
        assert_eq!(error.user_text(), "Error 400");
    }

    #[tokio::test]
    async fn missing_keys_fail_without_a_request() {
        let server = MockServer::start().await;
        let error = client(&server, keys(&[]), 3)
            .complete("hello", None)
            .await
            .expect_err("no keys configured");

        assert_eq!(error, LlmError::NoKeys);
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }
}
