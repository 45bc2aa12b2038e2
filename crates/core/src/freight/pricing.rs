use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::directory::Directory;
use crate::domain::cargo::{CargoType, ContainerSize};
use crate::domain::quote::CostBreakdown;

/// USD per nautical mile per ton before cargo and container adjustments.
pub const BASE_RATE: f64 = 0.15;
pub const BUNKER_RATE: f64 = 0.15;
pub const INSURANCE_RATE: f64 = 0.02;
pub const DOCUMENTATION_FEE: u32 = 150;
pub const CUSTOMS_BROKER_FEE: u32 = 500;

/// Cost components before any rounding. Every rounded figure in
/// [`CostBreakdown`] is derived from these values independently.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnroundedCosts {
    pub freight: f64,
    pub bunker: f64,
    pub terminal: f64,
    pub documentation: f64,
    pub customs: f64,
    pub insurance: f64,
}

impl UnroundedCosts {
    pub fn sum(&self) -> f64 {
        self.freight + self.bunker + self.terminal + self.documentation + self.customs
            + self.insurance
    }
}

pub fn unrounded_costs(
    distance_nm: f64,
    weight_tons: f64,
    cargo_factor: f64,
    container: ContainerSize,
) -> UnroundedCosts {
    let freight =
        distance_nm * weight_tons * BASE_RATE * cargo_factor * container.freight_multiplier();

    UnroundedCosts {
        freight,
        bunker: freight * BUNKER_RATE,
        terminal: f64::from(container.terminal_handling()),
        documentation: f64::from(DOCUMENTATION_FEE),
        customs: f64::from(CUSTOMS_BROKER_FEE),
        insurance: freight * INSURANCE_RATE,
    }
}

pub fn price_freight(
    distance_nm: f64,
    weight_tons: f64,
    cargo: &CargoType,
    container: ContainerSize,
) -> CostBreakdown {
    let costs = unrounded_costs(distance_nm, weight_tons, cargo.factor, container);

    CostBreakdown {
        base_freight: whole_units(costs.freight),
        bunker_surcharge: whole_units(costs.bunker),
        terminal_handling: Decimal::from(container.terminal_handling()),
        documentation: Decimal::from(DOCUMENTATION_FEE),
        customs_broker: Decimal::from(CUSTOMS_BROKER_FEE),
        insurance: whole_units(costs.insurance),
        total: whole_units(costs.sum()),
    }
}

/// Prices by cargo key; unknown keys use the general cargo factor.
pub fn price_freight_for_key(
    directory: &Directory,
    distance_nm: f64,
    weight_tons: f64,
    cargo_key: &str,
    container: ContainerSize,
) -> CostBreakdown {
    price_freight(distance_nm, weight_tons, directory.cargo_or_general(cargo_key), container)
}

/// Rounds half-to-even to a whole currency unit.
pub fn whole_units(value: f64) -> Decimal {
    let rounded = value.round_ties_even();
    Decimal::from_f64(rounded)
        .unwrap_or(if rounded.is_sign_negative() { Decimal::MIN } else { Decimal::MAX })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    use super::{price_freight, price_freight_for_key, unrounded_costs, whole_units};
    use crate::directory::Directory;
    use crate::domain::cargo::{CargoType, ContainerSize};

    fn general() -> CargoType {
        CargoType { key: "general".to_string(), factor: 1.0, container: "20ft".to_string() }
    }

    #[test]
    fn reference_breakdown_for_general_cargo() {
        let breakdown = price_freight(1000.0, 50.0, &general(), ContainerSize::TwentyFoot);

        assert_eq!(breakdown.base_freight, Decimal::from(7500));
        assert_eq!(breakdown.bunker_surcharge, Decimal::from(1125));
        assert_eq!(breakdown.terminal_handling, Decimal::from(300));
        assert_eq!(breakdown.documentation, Decimal::from(150));
        assert_eq!(breakdown.customs_broker, Decimal::from(500));
        assert_eq!(breakdown.insurance, Decimal::from(150));
        assert_eq!(breakdown.total, Decimal::from(9725));
    }

    #[test]
    fn surcharges_are_rounded_from_unrounded_freight() {
        // freight = 3.3 * 1 * 0.15 = 0.495 -> base 0, bunker 0.07425 -> 0,
        // total = round(0.495 + 0.07425 + 300 + 150 + 500 + 0.0099) = 951
        let breakdown = price_freight(3.3, 1.0, &general(), ContainerSize::TwentyFoot);
        assert_eq!(breakdown.base_freight, Decimal::ZERO);
        assert_eq!(breakdown.total, Decimal::from(951));

        // freight 9.6 -> base 10, bunker round(1.44) = 1; rounding base first would give 2
        let freight = 9.6;
        let breakdown =
            price_freight(freight / 0.15, 1.0, &general(), ContainerSize::TwentyFoot);
        assert_eq!(breakdown.base_freight, Decimal::from(10));
        assert_eq!(breakdown.bunker_surcharge, Decimal::from(1));
    }

    #[test]
    fn forty_foot_container_doubles_terminal_and_scales_freight() {
        let twenty = price_freight(2500.0, 12.0, &general(), ContainerSize::TwentyFoot);
        let forty = price_freight(2500.0, 12.0, &general(), ContainerSize::FortyFoot);

        assert_eq!(forty.terminal_handling, twenty.terminal_handling * Decimal::from(2));
        assert_eq!(twenty.base_freight, Decimal::from(4500));
        assert_eq!(forty.base_freight, Decimal::from(8100));

        let twenty_raw = unrounded_costs(2500.0, 12.0, 1.0, ContainerSize::TwentyFoot);
        let forty_raw = unrounded_costs(2500.0, 12.0, 1.0, ContainerSize::FortyFoot);
        assert!((forty_raw.freight / twenty_raw.freight - 1.8).abs() < 1e-12);
    }

    #[test]
    fn unknown_cargo_uses_general_factor() {
        let directory = Directory::embedded().expect("embedded directory");
        let bananas =
            price_freight_for_key(&directory, 800.0, 20.0, "bananas", ContainerSize::TwentyFoot);
        let general =
            price_freight_for_key(&directory, 800.0, 20.0, "general", ContainerSize::TwentyFoot);

        assert_eq!(bananas, general);
    }

    #[test]
    fn pricing_is_deterministic() {
        let first = price_freight(4321.5, 33.3, &general(), ContainerSize::FortyFoot);
        let second = price_freight(4321.5, 33.3, &general(), ContainerSize::FortyFoot);
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn total_is_rounded_sum_of_unrounded_components(
            distance in 0.01f64..25_000.0,
            weight in 0.01f64..50_000.0,
            factor in prop::sample::select(vec![1.0, 1.1, 1.2, 1.3, 1.4, 1.5, 1.6]),
            forty in any::<bool>(),
        ) {
            let container = if forty { ContainerSize::FortyFoot } else { ContainerSize::TwentyFoot };
            let cargo = CargoType { key: "any".to_string(), factor, container: "20ft".to_string() };
            let breakdown = price_freight(distance, weight, &cargo, container);
            let raw = unrounded_costs(distance, weight, factor, container);

            prop_assert_eq!(breakdown.total, whole_units(raw.sum()));

            // three independently rounded components plus the rounded total
            let drift = (breakdown.total - breakdown.rounded_component_sum()).abs();
            prop_assert!(drift <= Decimal::from(2), "drift {} too large", drift);
        }
    }
}
