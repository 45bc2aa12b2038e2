use std::env;
use std::fs;
use std::path::Path;

use atlantis_core::config::AppConfig;
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::offline_options;

struct ConfigField {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> String {
    let options = offline_options();
    let config_file_path = AppConfig::resolved_path(&options);
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn field(key: &'static str, env_keys: &'static [&'static str], value: String) -> ConfigField {
    ConfigField { key, env_keys, value }
}

fn fields(config: &AppConfig) -> Vec<ConfigField> {
    vec![
        field(
            "telegram.bot_token",
            &["ATLANTIS_TELEGRAM_BOT_TOKEN"],
            redact_bot_token(config.telegram.bot_token.expose_secret()),
        ),
        field(
            "telegram.api_base_url",
            &["ATLANTIS_TELEGRAM_API_BASE_URL"],
            config.telegram.api_base_url.clone(),
        ),
        field(
            "telegram.poll_timeout_secs",
            &["ATLANTIS_TELEGRAM_POLL_TIMEOUT_SECS"],
            config.telegram.poll_timeout_secs.to_string(),
        ),
        field(
            "telegram.max_backoff_secs",
            &["ATLANTIS_TELEGRAM_MAX_BACKOFF_SECS"],
            config.telegram.max_backoff_secs.to_string(),
        ),
        field("llm.api_keys", &["ATLANTIS_LLM_API_KEYS"], redact_key_count(config.llm.api_keys.len())),
        field("llm.base_url", &["ATLANTIS_LLM_BASE_URL"], config.llm.base_url.clone()),
        field("llm.model", &["ATLANTIS_LLM_MODEL"], config.llm.model.clone()),
        field("llm.temperature", &["ATLANTIS_LLM_TEMPERATURE"], config.llm.temperature.to_string()),
        field("llm.max_tokens", &["ATLANTIS_LLM_MAX_TOKENS"], config.llm.max_tokens.to_string()),
        field("llm.max_retries", &["ATLANTIS_LLM_MAX_RETRIES"], config.llm.max_retries.to_string()),
        field(
            "vision.api_key",
            &["ATLANTIS_VISION_API_KEY"],
            if config.vision.api_key.is_some() { "<redacted>" } else { "<unset>" }.to_string(),
        ),
        field("vision.endpoint", &["ATLANTIS_VISION_ENDPOINT"], config.vision.endpoint.clone()),
        field(
            "directory.path",
            &["ATLANTIS_DIRECTORY_PATH"],
            config
                .directory
                .path
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "<embedded>".to_string()),
        ),
        field(
            "documents.enabled",
            &["ATLANTIS_DOCUMENTS_ENABLED"],
            config.documents.enabled.to_string(),
        ),
        field(
            "documents.converter",
            &["ATLANTIS_DOCUMENTS_CONVERTER"],
            config.documents.converter.clone(),
        ),
        field(
            "server.bind_address",
            &["ATLANTIS_SERVER_BIND_ADDRESS"],
            config.server.bind_address.clone(),
        ),
        field(
            "server.health_check_port",
            &["ATLANTIS_SERVER_HEALTH_CHECK_PORT"],
            config.server.health_check_port.to_string(),
        ),
        field(
            "logging.level",
            &["ATLANTIS_LOGGING_LEVEL", "ATLANTIS_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        field(
            "logging.format",
            &["ATLANTIS_LOGGING_FORMAT", "ATLANTIS_LOG_FORMAT"],
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the public bot id, hides the secret half.
fn redact_bot_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((bot_id, _)) = trimmed.split_once(':') {
        return format!("{bot_id}:***");
    }

    "<redacted>".to_string()
}

fn redact_key_count(count: usize) -> String {
    match count {
        0 => "<unset>".to_string(),
        1 => "<1 key redacted>".to_string(),
        count => format!("<{count} keys redacted>"),
    }
}
