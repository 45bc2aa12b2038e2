use std::sync::Arc;

use atlantis_core::domain::quote::format_usd;
use atlantis_core::flows::parse_weight;
use atlantis_core::{ContainerSize, FreightQuote, QuoteEngine, QuoteRequest, RouteEndpoint};
use serde::Serialize;

use crate::commands::{load_directory, CommandResult, EXIT_USAGE};

const COMMAND: &str = "quote";

#[derive(Clone, Debug)]
pub struct QuoteArgs {
    pub from: String,
    pub to: String,
    pub cargo: String,
    pub weight: String,
    pub container: String,
}

#[derive(Debug, Serialize)]
struct QuoteOutput<'a> {
    command: &'static str,
    status: &'static str,
    route: String,
    total_usd: String,
    quote: &'a FreightQuote,
}

pub fn run(args: &QuoteArgs) -> CommandResult {
    let request = match parse_request(args) {
        Ok(request) => request,
        Err(message) => return CommandResult::failure(COMMAND, "invalid_argument", message, EXIT_USAGE),
    };
    let directory = match load_directory(COMMAND) {
        Ok(directory) => directory,
        Err(failure) => return failure,
    };

    let quote = QuoteEngine::new(Arc::new(directory)).compute_quote(&request);
    let payload = QuoteOutput {
        command: COMMAND,
        status: "ok",
        route: quote.route_line(),
        total_usd: format_usd(quote.breakdown.total),
        quote: &quote,
    };

    match serde_json::to_string_pretty(&payload) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure(COMMAND, "serialization", error.to_string(), 1),
    }
}

fn parse_request(args: &QuoteArgs) -> Result<QuoteRequest, String> {
    let origin = parse_endpoint("--from", &args.from)?;
    let destination = parse_endpoint("--to", &args.to)?;
    let weight = parse_weight(args.weight.trim()).map_err(|error| error.to_string())?;
    let container = match args.container.trim().to_ascii_lowercase().as_str() {
        "20ft" | "20" => ContainerSize::TwentyFoot,
        "40ft" | "40" => ContainerSize::FortyFoot,
        other => return Err(format!("--container must be 20ft or 40ft, got `{other}`")),
    };

    Ok(QuoteRequest::new(origin, destination, args.cargo.trim().to_lowercase(), weight)
        .with_container(container))
}

fn parse_endpoint(flag: &str, raw: &str) -> Result<RouteEndpoint, String> {
    match raw.split_once('/') {
        Some((country, city)) if !country.trim().is_empty() && !city.trim().is_empty() => {
            Ok(RouteEndpoint::new(country.trim().to_lowercase(), city.trim().to_lowercase()))
        }
        _ => Err(format!("{flag} expects COUNTRY/CITY, got `{raw}`")),
    }
}
