use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A recycled, non-deleted batch as supplied by the batch-tracking collaborator,
/// joined with its material's environmental coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BatchRecord {
    pub batch_id: Uuid,
    pub weight_kg: Decimal,
    pub co2_per_kg: Option<Decimal>,
    pub water_per_kg: Option<Decimal>,
    pub energy_per_kg: Option<Decimal>,
    /// Day the batch was marked recycled; batches without one only count toward lifetime totals.
    pub recycled_on: Option<NaiveDate>,
}
