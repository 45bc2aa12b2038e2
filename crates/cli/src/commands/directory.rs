use atlantis_core::freight::title_case;
use atlantis_core::Directory;

use crate::commands::{load_directory, CommandResult};

pub fn ports() -> CommandResult {
    match load_directory("ports") {
        Ok(directory) => CommandResult { exit_code: 0, output: render_ports(&directory) },
        Err(failure) => failure,
    }
}

pub fn carriers() -> CommandResult {
    match load_directory("carriers") {
        Ok(directory) => CommandResult { exit_code: 0, output: render_carriers(&directory) },
        Err(failure) => failure,
    }
}

fn render_ports(directory: &Directory) -> String {
    let mut lines = vec![format!("{} ports:", directory.port_count())];
    for (country, cities) in directory.countries() {
        lines.push(format!("{}:", title_case(country)));
        for (key, port) in cities {
            lines.push(format!("  - {} [{key}] ({:.4}, {:.4})", port.name, port.lat, port.lon));
        }
    }
    lines.join("\n")
}

fn render_carriers(directory: &Directory) -> String {
    let mut lines = vec![format!("{} carriers:", directory.carrier_count())];
    for carrier in directory.carriers() {
        lines.push(format!(
            "  - {} ({}) rating {:.1}/5 {}",
            carrier.name, carrier.id.0, carrier.rating, carrier.website
        ));
    }
    lines.join("\n")
}
