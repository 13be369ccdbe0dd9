use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::eco::aggregator::validate_batch;
use crate::errors::AppError;
use crate::models::batch::BatchRecord;

/// CO2 one tree absorbs per year (20.00 kg). Display heuristic for `trees_equivalent`.
pub const CO2_PER_TREE_KG: Decimal = Decimal::from_parts(2000, 0, 0, false, 2);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactTotals {
    pub co2_saved_kg: Decimal,
    pub water_saved_liters: Decimal,
    pub energy_saved_kwh: Decimal,
    pub trees_equivalent: Decimal,
}

/// Sums `weight × coefficient` per batch for CO2, water and energy.
/// A missing coefficient contributes nothing; a negative one is rejected.
pub fn calculate_impact(batches: &[BatchRecord]) -> Result<ImpactTotals, AppError> {
    let mut totals = ImpactTotals::default();
    for batch in batches {
        validate_batch(batch)?;
        totals.co2_saved_kg = accumulate(totals.co2_saved_kg, batch, "co2_per_kg", batch.co2_per_kg)?;
        totals.water_saved_liters =
            accumulate(totals.water_saved_liters, batch, "water_per_kg", batch.water_per_kg)?;
        totals.energy_saved_kwh =
            accumulate(totals.energy_saved_kwh, batch, "energy_per_kg", batch.energy_per_kg)?;
    }
    totals.trees_equivalent = trees_equivalent(totals.co2_saved_kg);
    Ok(totals)
}

pub fn trees_equivalent(co2_saved_kg: Decimal) -> Decimal {
    co2_saved_kg / CO2_PER_TREE_KG
}

/// Adds `weight × coefficient` to `total`.
fn accumulate(
    total: Decimal,
    batch: &BatchRecord,
    coefficient: &str,
    value: Option<Decimal>,
) -> Result<Decimal, AppError> {
    let overflow = || {
        AppError::InvalidInput(format!("{coefficient} impact of batch {} overflows", batch.batch_id))
    };
    match value {
        None => Ok(total),
        Some(v) if v.is_sign_negative() && !v.is_zero() => Err(AppError::InvalidInput(format!(
            "batch {} material has negative {coefficient} {v}",
            batch.batch_id
        ))),
        Some(v) => batch
            .weight_kg
            .checked_mul(v)
            .and_then(|product| total.checked_add(product))
            .ok_or_else(overflow),
    }
}
