use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaType {
    Weight,
    Batches,
    Streak,
    Material,
    Location,
    Special,
}

impl FromStr for CriteriaType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weight" => Ok(CriteriaType::Weight),
            "batches" => Ok(CriteriaType::Batches),
            "streak" => Ok(CriteriaType::Streak),
            "material" => Ok(CriteriaType::Material),
            "location" => Ok(CriteriaType::Location),
            "special" => Ok(CriteriaType::Special),
            other => Err(AppError::InvalidInput(format!("unknown criteria type '{other}'"))),
        }
    }
}

/// Admin-managed achievement definition. Never mutated by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Achievement {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: String,
    pub criteria_type: String,
    pub criteria_value: Option<Decimal>,
    pub criteria_details: Option<Value>,
    pub icon: String,
    pub color: String,
    pub points_reward: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Achievement {
    pub fn criteria(&self) -> Result<CriteriaType, AppError> {
        self.criteria_type.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserAchievement {
    pub id: Uuid,
    pub user_id: Uuid,
    pub achievement_id: Uuid,
    pub earned_at: DateTime<Utc>,
    /// Triggering batch; nulled when the batch is deleted.
    pub batch_id: Option<Uuid>,
    pub is_viewed: bool,
}

/// A user achievement joined with its definition, as listed to the user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EarnedAchievement {
    pub id: Uuid,
    pub achievement_id: Uuid,
    pub code: String,
    pub name: String,
    pub icon: String,
    pub color: String,
    pub points_reward: i32,
    pub earned_at: DateTime<Utc>,
    pub batch_id: Option<Uuid>,
    pub is_viewed: bool,
}
