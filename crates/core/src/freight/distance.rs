use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::port::Coordinates;

/// Mean Earth radius expressed in nautical miles.
pub const EARTH_RADIUS_NM: f64 = 3440.065;
pub const DEFAULT_SPEED_KNOTS: f64 = 20.0;

/// Great-circle distance between two points via the haversine formula.
pub fn haversine_nm(from: Coordinates, to: Coordinates) -> f64 {
    let (lat1, lon1) = (from.lat.to_radians(), from.lon.to_radians());
    let (lat2, lon2) = (to.lat.to_radians(), to.lon.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    EARTH_RADIUS_NM * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Days at sea at a constant speed, rounded to one decimal place.
///
/// Rounds the exact binary value half-to-even, so `59.15` (stored just below
/// the midpoint) becomes `59.1`.
pub fn transit_days(distance_nm: f64, speed_knots: f64) -> f64 {
    let days = distance_nm / speed_knots / 24.0;
    Decimal::from_f64_retain(days)
        .map(|exact| exact.round_dp_with_strategy(1, RoundingStrategy::MidpointNearestEven))
        .and_then(|rounded| rounded.to_f64())
        .unwrap_or(days)
}
