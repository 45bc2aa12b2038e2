use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::cargo::{CargoType, ContainerSize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEndpoint {
    pub country: String,
    pub city: String,
}

impl RouteEndpoint {
    pub fn new(country: impl Into<String>, city: impl Into<String>) -> Self {
        Self { country: country.into(), city: city.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub origin: RouteEndpoint,
    pub destination: RouteEndpoint,
    pub cargo: String,
    pub weight_tons: f64,
    pub container: ContainerSize,
}

impl QuoteRequest {
    pub fn new(
        origin: RouteEndpoint,
        destination: RouteEndpoint,
        cargo: impl Into<String>,
        weight_tons: f64,
    ) -> Self {
        Self {
            origin,
            destination,
            cargo: cargo.into(),
            weight_tons,
            container: ContainerSize::default(),
        }
    }

    pub fn with_container(mut self, container: ContainerSize) -> Self {
        self.container = container;
        self
    }
}

/// Whole-unit USD amounts. `total` is rounded from the unrounded components,
/// so it can drift from the sum of the rounded fields by a unit or two.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub base_freight: Decimal,
    pub bunker_surcharge: Decimal,
    pub terminal_handling: Decimal,
    pub documentation: Decimal,
    pub customs_broker: Decimal,
    pub insurance: Decimal,
    pub total: Decimal,
}

impl CostBreakdown {
    pub fn components(&self) -> [(&'static str, Decimal); 6] {
        [
            ("Base", self.base_freight),
            ("Fuel", self.bunker_surcharge),
            ("Terminal", self.terminal_handling),
            ("Docs", self.documentation),
            ("Customs", self.customs_broker),
            ("Insurance", self.insurance),
        ]
    }

    pub fn rounded_component_sum(&self) -> Decimal {
        self.components().iter().map(|(_, amount)| *amount).sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    Directory,
    Fallback,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FreightQuote {
    pub origin_label: String,
    pub destination_label: String,
    pub route_source: RouteSource,
    pub distance_nm: f64,
    pub transit_days: f64,
    pub cargo_key: String,
    pub cargo_type: CargoType,
    pub weight_tons: f64,
    pub container: ContainerSize,
    pub breakdown: CostBreakdown,
}

impl FreightQuote {
    pub fn route_line(&self) -> String {
        format!("{} → {}", self.origin_label, self.destination_label)
    }

    /// Directory routes keep one decimal (`1.0`), the fallback estimate prints whole days.
    pub fn transit_label(&self) -> String {
        match self.route_source {
            RouteSource::Directory => format_weight(self.transit_days),
            RouteSource::Fallback => format!("{:.0}", self.transit_days),
        }
    }

    /// Context line handed to the inference client when asking for shipment tips.
    pub fn advisory_context(&self) -> String {
        format!(
            "Route: {} to {}, {}t {}",
            self.origin_label,
            self.destination_label,
            format_weight(self.weight_tons),
            self.cargo_key
        )
    }
}

/// Renders `12345` as `$12,345`.
pub fn format_usd(amount: Decimal) -> String {
    let rounded = amount.round();
    let digits = rounded.abs().trunc().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{sign}${grouped}")
}

/// Whole tonnages keep one decimal place (`50.0`), fractional ones print as entered.
pub fn format_weight(weight_tons: f64) -> String {
    if weight_tons.fract() == 0.0 && weight_tons.abs() < 1e15 {
        format!("{weight_tons:.1}")
    } else {
        weight_tons.to_string()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{format_usd, format_weight};

    #[test]
    fn usd_formatting_groups_thousands() {
        assert_eq!(format_usd(Decimal::from(0)), "$0");
        assert_eq!(format_usd(Decimal::from(950)), "$950");
        assert_eq!(format_usd(Decimal::from(12_345)), "$12,345");
        assert_eq!(format_usd(Decimal::from(1_234_567)), "$1,234,567");
    }

    #[test]
    fn weight_formatting_keeps_a_decimal_for_whole_tons() {
        assert_eq!(format_weight(50.0), "50.0");
        assert_eq!(format_weight(12.5), "12.5");
    }
}
