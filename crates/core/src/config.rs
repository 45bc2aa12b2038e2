use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "atlantis.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub llm: LlmConfig,
    pub vision: VisionConfig,
    pub directory: DirectoryConfig,
    pub documents: DocumentsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub api_base_url: String,
    pub poll_timeout_secs: u64,
    pub max_backoff_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    /// Rotated round-robin, one key per request.
    pub api_keys: Vec<SecretString>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct VisionConfig {
    pub api_key: Option<SecretString>,
    pub endpoint: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Default)]
pub struct DirectoryConfig {
    /// Replaces the embedded port/cargo/carrier table when set.
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct DocumentsConfig {
    pub enabled: bool,
    pub converter: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub llm_api_keys: Option<Vec<String>>,
    pub llm_model: Option<String>,
    pub vision_api_key: Option<String>,
    pub directory_path: Option<PathBuf>,
    pub documents_enabled: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    /// Skips the bot-token check for offline tooling such as `atlantis quote`.
    pub allow_missing_bot_token: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig {
                bot_token: String::new().into(),
                api_base_url: "https://api.telegram.org".to_string(),
                poll_timeout_secs: 50,
                max_backoff_secs: 60,
            },
            llm: LlmConfig {
                api_keys: Vec::new(),
                base_url: "https://api.groq.com/openai/v1".to_string(),
                model: "llama-3.3-70b-versatile".to_string(),
                temperature: 0.7,
                max_tokens: 600,
                timeout_secs: 60,
                max_retries: 3,
            },
            vision: VisionConfig {
                api_key: None,
                endpoint: "https://api-inference.huggingface.co/models/Salesforce/blip-image-captioning-large"
                    .to_string(),
                timeout_secs: 60,
            },
            directory: DirectoryConfig::default(),
            documents: DocumentsConfig { enabled: true, converter: "wkhtmltopdf".to_string() },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

/// Splits a comma separated key list, dropping blanks.
fn secret_list(value: &str) -> Vec<SecretString> {
    value
        .split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| secret_value(key.to_string()))
        .collect()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        if options.allow_missing_bot_token {
            config.validate_offline()?;
        } else {
            config.validate()?;
        }

        Ok(config)
    }

    /// The file that [`AppConfig::load`] would read for these options, if any.
    pub fn resolved_path(options: &LoadOptions) -> Option<PathBuf> {
        resolve_config_path(options.config_path.as_deref())
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(telegram) = patch.telegram {
            if let Some(bot_token_value) = telegram.bot_token {
                self.telegram.bot_token = secret_value(bot_token_value);
            }
            if let Some(api_base_url) = telegram.api_base_url {
                self.telegram.api_base_url = api_base_url;
            }
            if let Some(poll_timeout_secs) = telegram.poll_timeout_secs {
                self.telegram.poll_timeout_secs = poll_timeout_secs;
            }
            if let Some(max_backoff_secs) = telegram.max_backoff_secs {
                self.telegram.max_backoff_secs = max_backoff_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(api_keys) = llm.api_keys {
                self.llm.api_keys = api_keys.into_iter().map(secret_value).collect();
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(vision) = patch.vision {
            if let Some(vision_api_key_value) = vision.api_key {
                self.vision.api_key = Some(secret_value(vision_api_key_value));
            }
            if let Some(endpoint) = vision.endpoint {
                self.vision.endpoint = endpoint;
            }
            if let Some(timeout_secs) = vision.timeout_secs {
                self.vision.timeout_secs = timeout_secs;
            }
        }

        if let Some(directory) = patch.directory {
            if let Some(path) = directory.path {
                self.directory.path = Some(path);
            }
        }

        if let Some(documents) = patch.documents {
            if let Some(enabled) = documents.enabled {
                self.documents.enabled = enabled;
            }
            if let Some(converter) = documents.converter {
                self.documents.converter = converter;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ATLANTIS_TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("ATLANTIS_TELEGRAM_API_BASE_URL") {
            self.telegram.api_base_url = value;
        }
        if let Some(value) = read_env("ATLANTIS_TELEGRAM_POLL_TIMEOUT_SECS") {
            self.telegram.poll_timeout_secs =
                parse_u64("ATLANTIS_TELEGRAM_POLL_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("ATLANTIS_TELEGRAM_MAX_BACKOFF_SECS") {
            self.telegram.max_backoff_secs =
                parse_u64("ATLANTIS_TELEGRAM_MAX_BACKOFF_SECS", &value)?;
        }

        if let Some(value) = read_env("ATLANTIS_LLM_API_KEYS") {
            self.llm.api_keys = secret_list(&value);
        }
        if let Some(value) = read_env("ATLANTIS_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("ATLANTIS_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("ATLANTIS_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("ATLANTIS_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("ATLANTIS_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("ATLANTIS_LLM_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("ATLANTIS_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("ATLANTIS_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("ATLANTIS_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("ATLANTIS_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("ATLANTIS_VISION_API_KEY") {
            self.vision.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("ATLANTIS_VISION_ENDPOINT") {
            self.vision.endpoint = value;
        }
        if let Some(value) = read_env("ATLANTIS_VISION_TIMEOUT_SECS") {
            self.vision.timeout_secs = parse_u64("ATLANTIS_VISION_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ATLANTIS_DIRECTORY_PATH") {
            self.directory.path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("ATLANTIS_DOCUMENTS_ENABLED") {
            self.documents.enabled = parse_bool("ATLANTIS_DOCUMENTS_ENABLED", &value)?;
        }
        if let Some(value) = read_env("ATLANTIS_DOCUMENTS_CONVERTER") {
            self.documents.converter = value;
        }

        if let Some(value) = read_env("ATLANTIS_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("ATLANTIS_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("ATLANTIS_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("ATLANTIS_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("ATLANTIS_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("ATLANTIS_LOGGING_LEVEL").or_else(|| read_env("ATLANTIS_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ATLANTIS_LOGGING_FORMAT").or_else(|| read_env("ATLANTIS_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.telegram_bot_token {
            self.telegram.bot_token = secret_value(bot_token);
        }
        if let Some(api_keys) = overrides.llm_api_keys {
            self.llm.api_keys = api_keys.into_iter().map(secret_value).collect();
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(vision_api_key) = overrides.vision_api_key {
            self.vision.api_key = Some(secret_value(vision_api_key));
        }
        if let Some(directory_path) = overrides.directory_path {
            self.directory.path = Some(directory_path);
        }
        if let Some(enabled) = overrides.documents_enabled {
            self.documents.enabled = enabled;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_telegram(&self.telegram)?;
        self.validate_offline()
    }

    fn validate_offline(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_vision(&self.vision)?;
        validate_documents(&self.documents)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_telegram(telegram: &TelegramConfig) -> Result<(), ConfigError> {
    let bot_token = telegram.bot_token.expose_secret();
    if bot_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "telegram.bot_token is required. Create a bot with @BotFather and copy the token it returns".to_string(),
        ));
    }
    // BotFather tokens look like `123456789:AA...`
    let well_formed = bot_token
        .split_once(':')
        .map(|(id, secret)| {
            !id.is_empty() && id.chars().all(|ch| ch.is_ascii_digit()) && !secret.is_empty()
        })
        .unwrap_or(false);
    if !well_formed {
        return Err(ConfigError::Validation(
            "telegram.bot_token must look like `<numeric bot id>:<secret>` as issued by @BotFather"
                .to_string(),
        ));
    }

    validate_url("telegram.api_base_url", &telegram.api_base_url)?;

    if telegram.poll_timeout_secs == 0 || telegram.poll_timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "telegram.poll_timeout_secs must be in range 1..=120".to_string(),
        ));
    }
    if telegram.max_backoff_secs == 0 {
        return Err(ConfigError::Validation(
            "telegram.max_backoff_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation("llm.temperature must be in range 0..=2".to_string()));
    }
    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }
    if llm.api_keys.iter().any(|key| key.expose_secret().trim().is_empty()) {
        return Err(ConfigError::Validation("llm.api_keys must not contain blank keys".to_string()));
    }

    validate_url("llm.base_url", &llm.base_url)
}

fn validate_vision(vision: &VisionConfig) -> Result<(), ConfigError> {
    if vision.timeout_secs == 0 || vision.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "vision.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    validate_url("vision.endpoint", &vision.endpoint)
}

fn validate_documents(documents: &DocumentsConfig) -> Result<(), ConfigError> {
    if documents.enabled && documents.converter.trim().is_empty() {
        return Err(ConfigError::Validation(
            "documents.converter must name an executable when documents are enabled".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{key} must start with http:// or https://")))
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    telegram: Option<TelegramPatch>,
    llm: Option<LlmPatch>,
    vision: Option<VisionPatch>,
    directory: Option<DirectoryPatch>,
    documents: Option<DocumentsPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    api_base_url: Option<String>,
    poll_timeout_secs: Option<u64>,
    max_backoff_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_keys: Option<Vec<String>>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct VisionPatch {
    api_key: Option<String>,
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DirectoryPatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct DocumentsPatch {
    enabled: Option<bool>,
    converter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    const TOKEN: &str = "123456:ABC-test-token";

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_ATLANTIS_BOT_TOKEN", "98765:from-env");
        env::set_var("TEST_ATLANTIS_GROQ_KEY", "gsk_from_env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("atlantis.toml");
            fs::write(
                &path,
                r#"
[telegram]
bot_token = "${TEST_ATLANTIS_BOT_TOKEN}"

[llm]
api_keys = ["${TEST_ATLANTIS_GROQ_KEY}", "gsk_literal"]
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.telegram.bot_token.expose_secret() == "98765:from-env",
                "bot token should be loaded from environment",
            )?;
            ensure(config.llm.api_keys.len() == 2, "both llm keys should be loaded")?;
            ensure(
                config.llm.api_keys[0].expose_secret() == "gsk_from_env",
                "first llm key should be interpolated",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_ATLANTIS_BOT_TOKEN", "TEST_ATLANTIS_GROQ_KEY"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ATLANTIS_TELEGRAM_BOT_TOKEN", TOKEN);
        env::set_var("ATLANTIS_LOG_LEVEL", "warn");
        env::set_var("ATLANTIS_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["ATLANTIS_TELEGRAM_BOT_TOKEN", "ATLANTIS_LOG_LEVEL", "ATLANTIS_LOG_FORMAT"]);
        result
    }

    #[test]
    fn llm_keys_env_is_split_on_commas() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ATLANTIS_TELEGRAM_BOT_TOKEN", TOKEN);
        env::set_var("ATLANTIS_LLM_API_KEYS", "gsk_one, gsk_two ,,gsk_three");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let keys: Vec<&str> =
                config.llm.api_keys.iter().map(|key| key.expose_secret()).collect();

            ensure(keys == ["gsk_one", "gsk_two", "gsk_three"], "keys should be trimmed and split")
        })();

        clear_vars(&["ATLANTIS_TELEGRAM_BOT_TOKEN", "ATLANTIS_LLM_API_KEYS"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ATLANTIS_TELEGRAM_BOT_TOKEN", "111:from-env");
        env::set_var("ATLANTIS_LLM_MODEL", "model-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("atlantis.toml");
            fs::write(
                &path,
                r#"
[telegram]
bot_token = "222:from-file"
poll_timeout_secs = 25

[llm]
model = "model-from-file"

[documents]
enabled = true

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    llm_model: Some("model-from-override".to_string()),
                    log_level: Some("debug".to_string()),
                    documents_enabled: Some(false),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.llm.model == "model-from-override", "override model should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(!config.documents.enabled, "override should disable documents")?;
            ensure(config.telegram.poll_timeout_secs == 25, "file value should beat default")?;
            ensure(
                config.telegram.bot_token.expose_secret() == "111:from-env",
                "env bot token should win over file and defaults",
            )?;
            Ok(())
        })();

        clear_vars(&["ATLANTIS_TELEGRAM_BOT_TOKEN", "ATLANTIS_LLM_MODEL"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ATLANTIS_TELEGRAM_BOT_TOKEN", "not-a-token");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("telegram.bot_token")
            );
            ensure(has_message, "validation failure should mention telegram.bot_token")
        })();

        clear_vars(&["ATLANTIS_TELEGRAM_BOT_TOKEN"]);
        result
    }

    #[test]
    fn offline_load_skips_bot_token_check() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&["ATLANTIS_TELEGRAM_BOT_TOKEN"]);

        let config =
            AppConfig::load(LoadOptions { allow_missing_bot_token: true, ..LoadOptions::default() })
                .map_err(|err| format!("offline load failed: {err}"))?;

        ensure(config.llm.model == "llama-3.3-70b-versatile", "default model should be kept")?;
        ensure(config.llm.max_tokens == 600, "default max tokens should be kept")
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ATLANTIS_TELEGRAM_BOT_TOKEN", TOKEN);
        env::set_var("ATLANTIS_LLM_MAX_RETRIES", "lots");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                ensure(key == "ATLANTIS_LLM_MAX_RETRIES", "error should name the variable")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
            Ok(_) => Err("expected invalid override error".to_string()),
        };

        clear_vars(&["ATLANTIS_TELEGRAM_BOT_TOKEN", "ATLANTIS_LLM_MAX_RETRIES"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ATLANTIS_TELEGRAM_BOT_TOKEN", "424242:bot-secret-value");
        env::set_var("ATLANTIS_LLM_API_KEYS", "gsk_secret_value");
        env::set_var("ATLANTIS_VISION_API_KEY", "hf_secret_value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("bot-secret-value"), "debug output should not contain bot token")?;
            ensure(!debug.contains("gsk_secret_value"), "debug output should not contain llm key")?;
            ensure(!debug.contains("hf_secret_value"), "debug output should not contain vision key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&[
            "ATLANTIS_TELEGRAM_BOT_TOKEN",
            "ATLANTIS_LLM_API_KEYS",
            "ATLANTIS_VISION_API_KEY",
        ]);
        result
    }
}
