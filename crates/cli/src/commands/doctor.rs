use atlantis_core::config::{AppConfig, LoadOptions};
use atlantis_core::Directory;
use serde::Serialize;

use crate::commands::{CommandResult, EXIT_DOCTOR_FAILED};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { EXIT_DOCTOR_FAILED } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated, bot token is well formed"
                    .to_string(),
            });
            checks.push(check_directory(&config));
            checks.push(check_inference_keys(&config));
            checks.push(check_vision(&config));
            checks.push(check_document_converter(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["directory", "inference_keys", "vision", "document_converter"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_directory(config: &AppConfig) -> DoctorCheck {
    match Directory::load_or_embedded(config.directory.path.as_deref()) {
        Ok(directory) => DoctorCheck {
            name: "directory",
            status: CheckStatus::Pass,
            details: format!(
                "{} ports, {} carriers, {} cargo types ({})",
                directory.port_count(),
                directory.carrier_count(),
                directory.cargo_keys().len(),
                config
                    .directory
                    .path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "embedded".to_string())
            ),
        },
        Err(error) => {
            DoctorCheck { name: "directory", status: CheckStatus::Fail, details: error.to_string() }
        }
    }
}

fn check_inference_keys(config: &AppConfig) -> DoctorCheck {
    match config.llm.api_keys.len() {
        0 => DoctorCheck {
            name: "inference_keys",
            status: CheckStatus::Fail,
            details: "no llm.api_keys configured; free-text answers would fail".to_string(),
        },
        count => DoctorCheck {
            name: "inference_keys",
            status: CheckStatus::Pass,
            details: format!("{count} key(s) for model `{}`", config.llm.model),
        },
    }
}

fn check_vision(config: &AppConfig) -> DoctorCheck {
    if config.vision.api_key.is_some() {
        DoctorCheck {
            name: "vision",
            status: CheckStatus::Pass,
            details: format!("captioning via {}", config.vision.endpoint),
        }
    } else {
        DoctorCheck {
            name: "vision",
            status: CheckStatus::Warn,
            details: "no vision.api_key; captioning runs unauthenticated and may be throttled"
                .to_string(),
        }
    }
}

fn check_document_converter(config: &AppConfig) -> DoctorCheck {
    if !config.documents.enabled {
        return DoctorCheck {
            name: "document_converter",
            status: CheckStatus::Skipped,
            details: "quote documents are disabled".to_string(),
        };
    }

    match which::which(&config.documents.converter) {
        Ok(path) => DoctorCheck {
            name: "document_converter",
            status: CheckStatus::Pass,
            details: format!("PDF quotes via {}", path.display()),
        },
        Err(_) => DoctorCheck {
            name: "document_converter",
            status: CheckStatus::Warn,
            details: format!(
                "`{}` not found in PATH; quotes will be sent as HTML",
                config.documents.converter
            ),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
