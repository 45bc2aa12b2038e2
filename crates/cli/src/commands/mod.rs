pub mod config;
pub mod directory;
pub mod doctor;
pub mod quote;

use atlantis_core::config::{AppConfig, LoadOptions};
use atlantis_core::Directory;
use serde::Serialize;

/// Exit code for configuration that fails to load or validate.
pub const EXIT_CONFIG: u8 = 2;
/// Exit code for rejected command arguments.
pub const EXIT_USAGE: u8 = 3;
/// Exit code for directory data that fails to load.
pub const EXIT_DIRECTORY: u8 = 4;
/// Exit code for a doctor run with at least one failed check.
pub const EXIT_DOCTOR_FAILED: u8 = 5;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

/// Offline commands never talk to Telegram, so a missing bot token is fine.
pub(crate) fn offline_options() -> LoadOptions {
    LoadOptions { allow_missing_bot_token: true, ..LoadOptions::default() }
}

/// Loads the configured directory, or the embedded one when no path is set.
pub(crate) fn load_directory(command: &str) -> Result<Directory, CommandResult> {
    let config = AppConfig::load(offline_options()).map_err(|error| {
        CommandResult::failure(command, "config_validation", error.to_string(), EXIT_CONFIG)
    })?;
    Directory::load_or_embedded(config.directory.path.as_deref()).map_err(|error| {
        CommandResult::failure(command, "directory_load", error.to_string(), EXIT_DIRECTORY)
    })
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
