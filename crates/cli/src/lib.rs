pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "atlantis",
    about = "Atlantis operator CLI",
    long_about = "Inspect Atlantis configuration, check runtime readiness, and price routes offline.",
    after_help = "Examples:\n  atlantis doctor --json\n  atlantis config\n  atlantis quote --from algeria/algiers --to spain/valencia --cargo general --weight 50"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, directory data, inference keys and document tooling")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Price a route offline and print the quote as JSON")]
    Quote {
        #[arg(long, value_name = "COUNTRY/CITY", help = "Origin port, e.g. algeria/algiers")]
        from: String,
        #[arg(long, value_name = "COUNTRY/CITY", help = "Destination port, e.g. spain/valencia")]
        to: String,
        #[arg(long, default_value = "general", help = "Cargo type key")]
        cargo: String,
        #[arg(long, help = "Weight in metric tons")]
        weight: String,
        #[arg(long, default_value = "20ft", help = "Container size used for pricing (20ft or 40ft)")]
        container: String,
    },
    #[command(about = "List directory ports grouped by country")]
    Ports,
    #[command(about = "List partner carriers with ratings")]
    Carriers,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Quote { from, to, cargo, weight, container } => {
            commands::quote::run(&commands::quote::QuoteArgs {
                from,
                to,
                cargo,
                weight,
                container,
            })
        }
        Command::Ports => commands::directory::ports(),
        Command::Carriers => commands::directory::carriers(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
