//! Deterministic route and cost derivation.
//!
//! Everything here is pure: the same request against the same directory always
//! yields the same [`FreightQuote`].

pub mod distance;
pub mod pricing;

use std::sync::Arc;

use crate::directory::Directory;
use crate::domain::quote::{FreightQuote, QuoteRequest, RouteEndpoint, RouteSource};

pub use distance::{haversine_nm, transit_days, DEFAULT_SPEED_KNOTS, EARTH_RADIUS_NM};
pub use pricing::{price_freight, price_freight_for_key, unrounded_costs, UnroundedCosts};

/// Distance assumed when either port is missing from the directory.
/// This is a product policy, not a geographic estimate.
pub const FALLBACK_DISTANCE_NM: f64 = 1000.0;
pub const FALLBACK_TRANSIT_DAYS: f64 = 10.0;

#[derive(Clone, Debug)]
pub struct QuoteEngine {
    directory: Arc<Directory>,
    speed_knots: f64,
}

impl QuoteEngine {
    pub fn new(directory: Arc<Directory>) -> Self {
        Self { directory, speed_knots: DEFAULT_SPEED_KNOTS }
    }

    pub fn with_speed_knots(mut self, speed_knots: f64) -> Self {
        self.speed_knots = speed_knots;
        self
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn compute_quote(&self, request: &QuoteRequest) -> FreightQuote {
        let origin = self.directory.find_port(&request.origin.country, &request.origin.city);
        let destination =
            self.directory.find_port(&request.destination.country, &request.destination.city);

        let (origin_label, destination_label, route_source, distance_nm, transit) =
            match (origin, destination) {
                (Some(origin), Some(destination)) => {
                    let distance = haversine_nm(origin.coordinates(), destination.coordinates());
                    (
                        origin.name.clone(),
                        destination.name.clone(),
                        RouteSource::Directory,
                        distance,
                        transit_days(distance, self.speed_knots),
                    )
                }
                _ => (
                    fallback_label(&request.origin),
                    fallback_label(&request.destination),
                    RouteSource::Fallback,
                    FALLBACK_DISTANCE_NM,
                    FALLBACK_TRANSIT_DAYS,
                ),
            };

        let cargo_type = self.directory.cargo_or_general(&request.cargo).clone();
        let breakdown =
            price_freight(distance_nm, request.weight_tons, &cargo_type, request.container);

        tracing::debug!(
            event_name = "freight.quote.computed",
            route_source = ?route_source,
            distance_nm,
            cargo = %request.cargo,
            total = %breakdown.total,
            "freight quote computed"
        );

        FreightQuote {
            origin_label,
            destination_label,
            route_source,
            distance_nm,
            transit_days: transit,
            cargo_key: request.cargo.clone(),
            cargo_type,
            weight_tons: request.weight_tons,
            container: request.container,
            breakdown,
        }
    }
}

fn fallback_label(endpoint: &RouteEndpoint) -> String {
    format!("{}, {}", title_case(&endpoint.city), title_case(&endpoint.country))
}

/// Upper-cases the first letter of every alphabetic run and lower-cases the rest.
pub fn title_case(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut previous_alphabetic = false;
    for ch in input.chars() {
        if ch.is_alphabetic() {
            if previous_alphabetic {
                output.extend(ch.to_lowercase());
            } else {
                output.extend(ch.to_uppercase());
            }
            previous_alphabetic = true;
        } else {
            output.push(ch);
            previous_alphabetic = false;
        }
    }
    output
}
