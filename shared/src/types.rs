//! Common types and unit helpers used across the platform

use rust_decimal::{Decimal, RoundingStrategy};

/// Kilograms in one quintal, the cooperative's native weight unit
pub const KG_PER_QUINTAL: u32 = 46;

/// Convert quintales to kilograms, saturating at the `Decimal` range
pub fn quintales_to_kg(quintales: Decimal) -> Decimal {
    quintales.saturating_mul(Decimal::from(KG_PER_QUINTAL))
}

/// Convert kilograms to quintales
pub fn kg_to_quintales(kg: Decimal) -> Decimal {
    if kg.is_zero() {
        Decimal::ZERO
    } else {
        kg / Decimal::from(KG_PER_QUINTAL)
    }
}

/// Sum weights without overflowing; out-of-range totals saturate
pub fn sum_weights<I>(weights: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    weights
        .into_iter()
        .fold(Decimal::ZERO, |total, weight| total.saturating_add(weight))
}

/// Round a weight to two decimal places, halves away from zero
pub fn round_weight(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
