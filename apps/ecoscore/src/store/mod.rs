//! Storage seams for the eco cabinet.
//!
//! `AppState` carries each seam as an `Arc<dyn …>`: `PgStore` in production,
//! `MemoryStore` for local runs and tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::achievement::{Achievement, EarnedAchievement};
use crate::models::batch::BatchRecord;
use crate::models::eco::{EcoHistory, EcoScore, PeriodType};

#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Creates the initial score for a user; returns the existing one if present.
    async fn create(&self, user_id: Uuid) -> Result<EcoScore, AppError>;

    /// `NotFound` when the user has no score yet.
    async fn load(&self, user_id: Uuid) -> Result<EcoScore, AppError>;

    /// Compare-and-swap on `score.version`. Returns the stored score with its new
    /// version, or `ConcurrentWriteConflict` if another writer got there first.
    async fn save(&self, score: &EcoScore) -> Result<EcoScore, AppError>;

    /// Append-only. `DuplicateSnapshot` if `(user_id, date, period_type)` exists.
    async fn append_history(&self, snapshot: &EcoHistory) -> Result<(), AppError>;

    /// Snapshots for a user, oldest first.
    async fn history(
        &self,
        user_id: Uuid,
        period_type: Option<PeriodType>,
    ) -> Result<Vec<EcoHistory>, AppError>;

    async fn list_user_ids(&self) -> Result<Vec<Uuid>, AppError>;

    /// Highest points first, ties broken by weight.
    async fn leaderboard(&self, limit: u32) -> Result<Vec<EcoScore>, AppError>;
}

/// Supplies a user's recycled, non-deleted batches.
#[async_trait]
pub trait BatchSource: Send + Sync {
    async fn recycled_batches(&self, user_id: Uuid) -> Result<Vec<BatchRecord>, AppError>;
}

#[async_trait]
pub trait AchievementStore: Send + Sync {
    async fn active_achievements(&self) -> Result<Vec<Achievement>, AppError>;

    /// Records the achievement for the user unless already earned.
    /// Returns `true` when a new row was written.
    async fn award(
        &self,
        user_id: Uuid,
        achievement_id: Uuid,
        batch_id: Option<Uuid>,
    ) -> Result<bool, AppError>;

    async fn user_achievements(&self, user_id: Uuid) -> Result<Vec<EarnedAchievement>, AppError>;

    async fn mark_viewed(&self, user_id: Uuid, user_achievement_id: Uuid) -> Result<(), AppError>;

    /// Inserts definitions whose code is not yet present. Returns how many were added.
    async fn seed(&self, catalogue: &[Achievement]) -> Result<usize, AppError>;
}

pub async fn load_or_create(store: &dyn ScoreStore, user_id: Uuid) -> Result<EcoScore, AppError> {
    match store.load(user_id).await {
        Err(AppError::NotFound(_)) => store.create(user_id).await,
        other => other,
    }
}
