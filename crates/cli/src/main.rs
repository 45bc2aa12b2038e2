use std::process::ExitCode;

fn main() -> ExitCode {
    atlantis_cli::run()
}
