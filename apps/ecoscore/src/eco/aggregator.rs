use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::batch::BatchRecord;
use crate::models::eco::DECIMAL_PLACES;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityTotals {
    pub total_batches: u32,
    pub total_weight_kg: Decimal,
}

/// Counts batches and sums their weight. An empty set is all zeros.
pub fn aggregate(batches: &[BatchRecord]) -> Result<ActivityTotals, AppError> {
    let mut total_weight_kg = Decimal::ZERO;
    for batch in batches {
        validate_batch(batch)?;
        total_weight_kg = total_weight_kg
            .checked_add(batch.weight_kg)
            .ok_or_else(|| AppError::InvalidInput("total batch weight overflows".to_string()))?;
    }
    let total_batches = u32::try_from(batches.len())
        .map_err(|_| AppError::InvalidInput(format!("{} batches exceed counter range", batches.len())))?;
    Ok(ActivityTotals {
        total_batches,
        total_weight_kg,
    })
}

/// Batches recycled within `[start, end]`. Batches without a recycle date are excluded.
pub fn batches_between(batches: &[BatchRecord], start: NaiveDate, end: NaiveDate) -> Vec<BatchRecord> {
    batches
        .iter()
        .filter(|b| matches!(b.recycled_on, Some(d) if d >= start && d <= end))
        .cloned()
        .collect()
}

/// Batches recycled on or before `end`.
pub fn batches_until(batches: &[BatchRecord], end: NaiveDate) -> Vec<BatchRecord> {
    batches
        .iter()
        .filter(|b| matches!(b.recycled_on, Some(d) if d <= end))
        .cloned()
        .collect()
}

pub(crate) fn validate_batch(batch: &BatchRecord) -> Result<(), AppError> {
    if batch.weight_kg.is_sign_negative() && !batch.weight_kg.is_zero() {
        return Err(AppError::InvalidInput(format!(
            "batch {} has negative weight {}",
            batch.batch_id, batch.weight_kg
        )));
    }
    if batch.weight_kg.normalize().scale() > DECIMAL_PLACES {
        return Err(AppError::InvalidInput(format!(
            "batch {} weight {} has more than {DECIMAL_PLACES} decimal places",
            batch.batch_id, batch.weight_kg
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    pub(crate) fn batch(weight: Decimal, recycled_on: Option<NaiveDate>) -> BatchRecord {
        BatchRecord {
            batch_id: Uuid::new_v4(),
            weight_kg: weight,
            co2_per_kg: None,
            water_per_kg: None,
            energy_per_kg: None,
            recycled_on,
        }
    }

    fn day(d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2024, 5, d)
    }

    #[test]
    fn test_empty_set_is_zero() {
        let totals = aggregate(&[]).unwrap();
        assert_eq!(totals, ActivityTotals::default());
        assert_eq!(totals.total_weight_kg, Decimal::ZERO);
    }

    #[test]
    fn test_sums_weight_and_counts() {
        let batches = vec![batch(dec!(2.50), None), batch(dec!(7.25), day(3))];
        let totals = aggregate(&batches).unwrap();
        assert_eq!(totals.total_batches, 2);
        assert_eq!(totals.total_weight_kg, dec!(9.75));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let batches = vec![batch(dec!(1.00), None), batch(dec!(-0.50), None)];
        assert!(matches!(aggregate(&batches), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_zero_weight_batch_counts() {
        let totals = aggregate(&[batch(Decimal::ZERO, None)]).unwrap();
        assert_eq!(totals.total_batches, 1);
    }

    #[test]
    fn test_period_window_is_inclusive_and_skips_undated() {
        let batches = vec![
            batch(dec!(1.00), day(1)),
            batch(dec!(2.00), day(5)),
            batch(dec!(4.00), day(7)),
            batch(dec!(8.00), day(8)),
            batch(dec!(16.00), None),
        ];
        let totals = aggregate(&batches_between(&batches, day(5).unwrap(), day(7).unwrap())).unwrap();
        assert_eq!(totals.total_batches, 2);
        assert_eq!(totals.total_weight_kg, dec!(6.00));
    }

    #[test]
    fn test_batches_until_includes_end_day() {
        let batches = vec![batch(dec!(1.00), day(1)), batch(dec!(2.00), day(2)), batch(dec!(3.00), None)];
        assert_eq!(batches_until(&batches, day(2).unwrap()).len(), 2);
        assert_eq!(batches_until(&batches, day(1).unwrap()).len(), 1);
    }

    #[test]
    fn test_weight_beyond_two_decimals_rejected() {
        assert!(matches!(
            aggregate(&[batch(dec!(9.995), None)]),
            Err(AppError::InvalidInput(_))
        ));
        // Trailing zeros are not extra precision.
        assert_eq!(aggregate(&[batch(dec!(1.500), None)]).unwrap().total_weight_kg, dec!(1.5));
    }

    #[test]
    fn test_weight_overflow_is_invalid_input() {
        let batches = vec![batch(Decimal::MAX, None), batch(Decimal::MAX, None)];
        assert!(matches!(aggregate(&batches), Err(AppError::InvalidInput(_))));
    }
}
