use std::env;
use std::sync::{Mutex, OnceLock};

use atlantis_cli::commands::quote::QuoteArgs;
use atlantis_cli::commands::{config, directory, doctor, quote};
use serde_json::Value;

const BOT_TOKEN: &str = "123456:AAE-test-secret";

#[test]
fn quote_prices_a_directory_route_offline() {
    with_env(&[], || {
        let result = quote::run(&args("algeria/algiers", "spain/valencia", "50"));
        assert_eq!(result.exit_code, 0, "expected offline quote without a bot token");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "quote");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["route"], "Port of Algiers → Port of Valencia");
        assert_eq!(payload["total_usd"], "$2,936");
        assert_eq!(payload["quote"]["route_source"], "directory");
        assert_eq!(payload["quote"]["container"], "twenty_foot");
    });
}

#[test]
fn quote_uses_fallback_estimates_for_unknown_ports() {
    with_env(&[], || {
        let result = quote::run(&args("atlantis/lost city", "spain/valencia", "10"));
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["quote"]["route_source"], "fallback");
        assert_eq!(payload["quote"]["distance_nm"], 1000.0);
    });
}

#[test]
fn quote_rejects_invalid_weight() {
    with_env(&[], || {
        let result = quote::run(&args("algeria/algiers", "spain/valencia", "0"));
        assert_eq!(result.exit_code, 3, "expected usage failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "invalid_argument");
    });
}

#[test]
fn quote_reports_unreadable_directory_file() {
    with_env(&[("ATLANTIS_DIRECTORY_PATH", "/nonexistent/atlantis-directory.toml")], || {
        let result = quote::run(&args("algeria/algiers", "spain/valencia", "5"));
        assert_eq!(result.exit_code, 4, "expected directory failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "directory_load");
    });
}

#[test]
fn config_redacts_secrets_and_attributes_env_sources() {
    with_env(
        &[
            ("ATLANTIS_TELEGRAM_BOT_TOKEN", BOT_TOKEN),
            ("ATLANTIS_LLM_API_KEYS", "gsk_one,gsk_two"),
            ("ATLANTIS_LOG_LEVEL", "debug"),
        ],
        || {
            let output = config::run();

            assert!(output.starts_with("effective config"));
            assert!(output.contains(
                "- telegram.bot_token = 123456:*** (source: env (ATLANTIS_TELEGRAM_BOT_TOKEN))"
            ));
            assert!(output.contains(
                "- llm.api_keys = <2 keys redacted> (source: env (ATLANTIS_LLM_API_KEYS))"
            ));
            assert!(output.contains("- logging.level = debug (source: env (ATLANTIS_LOG_LEVEL))"));
            assert!(output.contains("- server.bind_address = "));
            assert!(!output.contains("test-secret"));
            assert!(!output.contains("gsk_one"));
        },
    );
}

#[test]
fn doctor_passes_with_token_and_keys() {
    with_env(
        &[
            ("ATLANTIS_TELEGRAM_BOT_TOKEN", BOT_TOKEN),
            ("ATLANTIS_LLM_API_KEYS", "gsk_one"),
            ("ATLANTIS_DOCUMENTS_ENABLED", "false"),
        ],
        || {
            let result = doctor::run(true);
            assert_eq!(result.exit_code, 0);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["overall_status"], "pass");
            let names: Vec<&str> = payload["checks"]
                .as_array()
                .expect("checks array")
                .iter()
                .filter_map(|check| check["name"].as_str())
                .collect();
            assert_eq!(
                names,
                ["config_validation", "directory", "inference_keys", "vision", "document_converter"]
            );
        },
    );
}

#[test]
fn doctor_fails_without_bot_token() {
    with_env(&[], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 5, "expected doctor failure code");

        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [fail] config_validation: "));
        assert!(result.output.contains("- [skip] inference_keys: "));
    });
}

#[test]
fn doctor_flags_missing_inference_keys() {
    with_env(&[("ATLANTIS_TELEGRAM_BOT_TOKEN", BOT_TOKEN)], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 5);

        let payload = parse_payload(&result.output);
        let inference = payload["checks"]
            .as_array()
            .expect("checks array")
            .iter()
            .find(|check| check["name"] == "inference_keys")
            .cloned()
            .expect("inference check");
        assert_eq!(inference["status"], "fail");
    });
}

#[test]
fn ports_and_carriers_list_the_directory() {
    with_env(&[], || {
        let ports = directory::ports();
        assert_eq!(ports.exit_code, 0);
        assert!(ports.output.contains("Port of Valencia"));

        let carriers = directory::carriers();
        assert_eq!(carriers.exit_code, 0);
        assert!(carriers.output.contains("carriers:"));
    });
}

fn args(from: &str, to: &str, weight: &str) -> QuoteArgs {
    QuoteArgs {
        from: from.to_string(),
        to: to.to_string(),
        cargo: "general".to_string(),
        weight: weight.to_string(),
        container: "20ft".to_string(),
    }
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "ATLANTIS_TELEGRAM_BOT_TOKEN",
        "ATLANTIS_TELEGRAM_API_BASE_URL",
        "ATLANTIS_TELEGRAM_POLL_TIMEOUT_SECS",
        "ATLANTIS_TELEGRAM_MAX_BACKOFF_SECS",
        "ATLANTIS_LLM_API_KEYS",
        "ATLANTIS_LLM_BASE_URL",
        "ATLANTIS_LLM_MODEL",
        "ATLANTIS_LLM_TEMPERATURE",
        "ATLANTIS_LLM_MAX_TOKENS",
        "ATLANTIS_LLM_TIMEOUT_SECS",
        "ATLANTIS_LLM_MAX_RETRIES",
        "ATLANTIS_VISION_API_KEY",
        "ATLANTIS_VISION_ENDPOINT",
        "ATLANTIS_VISION_TIMEOUT_SECS",
        "ATLANTIS_DIRECTORY_PATH",
        "ATLANTIS_DOCUMENTS_ENABLED",
        "ATLANTIS_DOCUMENTS_CONVERTER",
        "ATLANTIS_SERVER_BIND_ADDRESS",
        "ATLANTIS_SERVER_HEALTH_CHECK_PORT",
        "ATLANTIS_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "ATLANTIS_LOGGING_LEVEL",
        "ATLANTIS_LOGGING_FORMAT",
        "ATLANTIS_LOG_LEVEL",
        "ATLANTIS_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
