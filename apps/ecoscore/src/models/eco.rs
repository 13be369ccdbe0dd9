use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppError;

/// Fractional digits every stored decimal is kept at.
pub const DECIMAL_PLACES: u32 = 2;

/// Rounds a decimal to the stored precision, half away from zero (as Postgres `numeric` does).
pub fn quantize(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Per-user gamification snapshot.
///
/// Mutated only through `GamificationEngine::apply`; `version` is the optimistic
/// concurrency token the store bumps on every successful save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcoScore {
    pub user_id: Uuid,
    pub total_batches: u32,
    pub total_weight_kg: Decimal,
    pub total_co2_saved_kg: Decimal,
    pub total_water_saved_liters: Decimal,
    pub total_energy_saved_kwh: Decimal,
    pub level: u32,
    pub points: u32,
    pub badges: BTreeSet<String>,
    pub next_badge_progress: f64,
    pub streak_days: u32,
    pub longest_streak_days: u32,
    pub last_activity_date: Option<NaiveDate>,
    pub trees_equivalent: Decimal,
    pub global_rank: Option<u32>,
    pub region_rank: Option<u32>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EcoScore {
    /// The score every user starts with.
    pub fn new(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            total_batches: 0,
            total_weight_kg: Decimal::ZERO,
            total_co2_saved_kg: Decimal::ZERO,
            total_water_saved_liters: Decimal::ZERO,
            total_energy_saved_kwh: Decimal::ZERO,
            level: 1,
            points: 0,
            badges: BTreeSet::new(),
            next_badge_progress: 0.0,
            streak_days: 0,
            longest_streak_days: 0,
            last_activity_date: None,
            trees_equivalent: Decimal::ZERO,
            global_rank: None,
            region_rank: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct EcoScoreRow {
    pub user_id: Uuid,
    pub total_batches: i32,
    pub total_weight_kg: Decimal,
    pub total_co2_saved_kg: Decimal,
    pub total_water_saved_liters: Decimal,
    pub total_energy_saved_kwh: Decimal,
    pub level: i32,
    pub points: i32,
    pub badges: Vec<String>,
    pub next_badge_progress: f64,
    pub streak_days: i32,
    pub longest_streak_days: i32,
    pub last_activity_date: Option<NaiveDate>,
    pub trees_equivalent: Decimal,
    pub global_rank: Option<i32>,
    pub region_rank: Option<i32>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<EcoScoreRow> for EcoScore {
    type Error = AppError;

    fn try_from(row: EcoScoreRow) -> Result<Self, Self::Error> {
        Ok(EcoScore {
            user_id: row.user_id,
            total_batches: from_column("total_batches", row.total_batches)?,
            total_weight_kg: row.total_weight_kg,
            total_co2_saved_kg: row.total_co2_saved_kg,
            total_water_saved_liters: row.total_water_saved_liters,
            total_energy_saved_kwh: row.total_energy_saved_kwh,
            level: from_column("level", row.level)?,
            points: from_column("points", row.points)?,
            badges: row.badges.into_iter().collect(),
            next_badge_progress: row.next_badge_progress,
            streak_days: from_column("streak_days", row.streak_days)?,
            longest_streak_days: from_column("longest_streak_days", row.longest_streak_days)?,
            last_activity_date: row.last_activity_date,
            trees_equivalent: row.trees_equivalent,
            global_rank: row
                .global_rank
                .map(|r| from_column("global_rank", r))
                .transpose()?,
            region_rank: row
                .region_rank
                .map(|r| from_column("region_rank", r))
                .transpose()?,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<&EcoScore> for EcoScoreRow {
    type Error = AppError;

    fn try_from(score: &EcoScore) -> Result<Self, Self::Error> {
        Ok(EcoScoreRow {
            user_id: score.user_id,
            total_batches: to_column("total_batches", score.total_batches)?,
            total_weight_kg: score.total_weight_kg,
            total_co2_saved_kg: score.total_co2_saved_kg,
            total_water_saved_liters: score.total_water_saved_liters,
            total_energy_saved_kwh: score.total_energy_saved_kwh,
            level: to_column("level", score.level)?,
            points: to_column("points", score.points)?,
            badges: score.badges.iter().cloned().collect(),
            next_badge_progress: score.next_badge_progress,
            streak_days: to_column("streak_days", score.streak_days)?,
            longest_streak_days: to_column("longest_streak_days", score.longest_streak_days)?,
            last_activity_date: score.last_activity_date,
            trees_equivalent: score.trees_equivalent,
            global_rank: score
                .global_rank
                .map(|r| to_column("global_rank", r))
                .transpose()?,
            region_rank: score
                .region_rank
                .map(|r| to_column("region_rank", r))
                .transpose()?,
            version: score.version,
            created_at: score.created_at,
            updated_at: score.updated_at,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Daily => "daily",
            PeriodType::Weekly => "weekly",
            PeriodType::Monthly => "monthly",
            PeriodType::Yearly => "yearly",
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(PeriodType::Daily),
            "weekly" => Ok(PeriodType::Weekly),
            "monthly" => Ok(PeriodType::Monthly),
            "yearly" => Ok(PeriodType::Yearly),
            other => Err(AppError::InvalidInput(format!("unknown period type '{other}'"))),
        }
    }
}

/// Immutable rollup record, unique per `(user_id, date, period_type)`.
/// `date` is the first day of the period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcoHistory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub period_type: PeriodType,
    pub batches_count: u32,
    pub weight_kg: Decimal,
    pub co2_saved_kg: Decimal,
    pub water_saved_liters: Decimal,
    pub energy_saved_kwh: Decimal,
    pub cumulative_batches: u32,
    pub cumulative_weight_kg: Decimal,
    pub cumulative_co2_saved_kg: Decimal,
    pub cumulative_water_saved_liters: Decimal,
    pub cumulative_energy_saved_kwh: Decimal,
    pub level: u32,
    pub points: u32,
    pub badges_count: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct EcoHistoryRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub period_type: String,
    pub batches_count: i32,
    pub weight_kg: Decimal,
    pub co2_saved_kg: Decimal,
    pub water_saved_liters: Decimal,
    pub energy_saved_kwh: Decimal,
    pub cumulative_batches: i32,
    pub cumulative_weight_kg: Decimal,
    pub cumulative_co2_saved_kg: Decimal,
    pub cumulative_water_saved_liters: Decimal,
    pub cumulative_energy_saved_kwh: Decimal,
    pub level: i32,
    pub points: i32,
    pub badges_count: i32,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<EcoHistoryRow> for EcoHistory {
    type Error = AppError;

    fn try_from(row: EcoHistoryRow) -> Result<Self, Self::Error> {
        Ok(EcoHistory {
            id: row.id,
            user_id: row.user_id,
            date: row.date,
            period_type: row.period_type.parse()?,
            batches_count: from_column("batches_count", row.batches_count)?,
            weight_kg: row.weight_kg,
            co2_saved_kg: row.co2_saved_kg,
            water_saved_liters: row.water_saved_liters,
            energy_saved_kwh: row.energy_saved_kwh,
            cumulative_batches: from_column("cumulative_batches", row.cumulative_batches)?,
            cumulative_weight_kg: row.cumulative_weight_kg,
            cumulative_co2_saved_kg: row.cumulative_co2_saved_kg,
            cumulative_water_saved_liters: row.cumulative_water_saved_liters,
            cumulative_energy_saved_kwh: row.cumulative_energy_saved_kwh,
            level: from_column("level", row.level)?,
            points: from_column("points", row.points)?,
            badges_count: from_column("badges_count", row.badges_count)?,
            created_at: row.created_at,
        })
    }
}

fn from_column(column: &str, value: i32) -> Result<u32, AppError> {
    u32::try_from(value)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("column {column} holds negative value {value}")))
}

pub(crate) fn to_column(field: &str, value: u32) -> Result<i32, AppError> {
    i32::try_from(value)
        .map_err(|_| AppError::InvalidInput(format!("{field} value {value} exceeds storage range")))
}
