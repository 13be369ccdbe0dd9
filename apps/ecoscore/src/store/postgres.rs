use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::achievement::{Achievement, EarnedAchievement};
use crate::models::batch::BatchRecord;
use crate::models::eco::{to_column, EcoHistory, EcoHistoryRow, EcoScore, EcoScoreRow, PeriodType};
use crate::store::{AchievementStore, BatchSource, ScoreStore};

/// PostgreSQL backend. Batches are read from the batch-tracking tables
/// (`textile_batches`, `materials`), which this service does not own.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn not_found(user_id: Uuid) -> AppError {
        AppError::NotFound(format!("Eco score for user {user_id} not found"))
    }
}

#[async_trait]
impl ScoreStore for PgStore {
    async fn create(&self, user_id: Uuid) -> Result<EcoScore, AppError> {
        let inserted = sqlx::query("INSERT INTO eco_scores (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if inserted.rows_affected() == 1 {
            info!("Created eco score for user {user_id}");
        }
        self.load(user_id).await
    }

    async fn load(&self, user_id: Uuid) -> Result<EcoScore, AppError> {
        let row: Option<EcoScoreRow> = sqlx::query_as("SELECT * FROM eco_scores WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or_else(|| Self::not_found(user_id))?.try_into()
    }

    async fn save(&self, score: &EcoScore) -> Result<EcoScore, AppError> {
        let row = EcoScoreRow::try_from(score)?;
        // Optimistic lock: only the writer that read `version` may replace it.
        let saved: Option<EcoScoreRow> = sqlx::query_as(
            r#"
            UPDATE eco_scores SET
                total_batches = $3,
                total_weight_kg = $4,
                total_co2_saved_kg = $5,
                total_water_saved_liters = $6,
                total_energy_saved_kwh = $7,
                level = $8,
                points = $9,
                badges = $10,
                next_badge_progress = $11,
                streak_days = $12,
                longest_streak_days = $13,
                last_activity_date = $14,
                trees_equivalent = $15,
                version = version + 1,
                updated_at = NOW()
            WHERE user_id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(row.user_id)
        .bind(row.version)
        .bind(row.total_batches)
        .bind(row.total_weight_kg)
        .bind(row.total_co2_saved_kg)
        .bind(row.total_water_saved_liters)
        .bind(row.total_energy_saved_kwh)
        .bind(row.level)
        .bind(row.points)
        .bind(&row.badges)
        .bind(row.next_badge_progress)
        .bind(row.streak_days)
        .bind(row.longest_streak_days)
        .bind(row.last_activity_date)
        .bind(row.trees_equivalent)
        .fetch_optional(&self.pool)
        .await?;

        match saved {
            Some(row) => row.try_into(),
            None => {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM eco_scores WHERE user_id = $1)")
                        .bind(score.user_id)
                        .fetch_one(&self.pool)
                        .await?;
                if exists {
                    Err(AppError::ConcurrentWriteConflict {
                        user_id: score.user_id,
                        expected_version: score.version,
                    })
                } else {
                    Err(Self::not_found(score.user_id))
                }
            }
        }
    }

    async fn append_history(&self, snapshot: &EcoHistory) -> Result<(), AppError> {
        // Append-only: a conflicting key is reported, never overwritten.
        let result = sqlx::query(
            r#"
            INSERT INTO eco_history
                (id, user_id, date, period_type, batches_count, weight_kg, co2_saved_kg,
                 water_saved_liters, energy_saved_kwh, cumulative_batches, cumulative_weight_kg,
                 cumulative_co2_saved_kg, cumulative_water_saved_liters,
                 cumulative_energy_saved_kwh, level, points, badges_count, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (user_id, date, period_type) DO NOTHING
            "#,
        )
        .bind(snapshot.id)
        .bind(snapshot.user_id)
        .bind(snapshot.date)
        .bind(snapshot.period_type.as_str())
        .bind(to_column("batches_count", snapshot.batches_count)?)
        .bind(snapshot.weight_kg)
        .bind(snapshot.co2_saved_kg)
        .bind(snapshot.water_saved_liters)
        .bind(snapshot.energy_saved_kwh)
        .bind(to_column("cumulative_batches", snapshot.cumulative_batches)?)
        .bind(snapshot.cumulative_weight_kg)
        .bind(snapshot.cumulative_co2_saved_kg)
        .bind(snapshot.cumulative_water_saved_liters)
        .bind(snapshot.cumulative_energy_saved_kwh)
        .bind(to_column("level", snapshot.level)?)
        .bind(to_column("points", snapshot.points)?)
        .bind(to_column("badges_count", snapshot.badges_count)?)
        .bind(snapshot.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::DuplicateSnapshot {
                user_id: snapshot.user_id,
                date: snapshot.date,
                period_type: snapshot.period_type,
            });
        }
        Ok(())
    }

    async fn history(
        &self,
        user_id: Uuid,
        period_type: Option<PeriodType>,
    ) -> Result<Vec<EcoHistory>, AppError> {
        let rows: Vec<EcoHistoryRow> = sqlx::query_as(
            r#"
            SELECT * FROM eco_history
            WHERE user_id = $1 AND ($2::text IS NULL OR period_type = $2)
            ORDER BY date ASC, period_type ASC
            "#,
        )
        .bind(user_id)
        .bind(period_type.map(|p| p.as_str()))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(EcoHistory::try_from).collect()
    }

    async fn list_user_ids(&self) -> Result<Vec<Uuid>, AppError> {
        Ok(sqlx::query_scalar("SELECT user_id FROM eco_scores ORDER BY user_id")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn leaderboard(&self, limit: u32) -> Result<Vec<EcoScore>, AppError> {
        let rows: Vec<EcoScoreRow> = sqlx::query_as(
            "SELECT * FROM eco_scores ORDER BY points DESC, total_weight_kg DESC, user_id LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(EcoScore::try_from).collect()
    }
}

#[async_trait]
impl BatchSource for PgStore {
    async fn recycled_batches(&self, user_id: Uuid) -> Result<Vec<BatchRecord>, AppError> {
        Ok(sqlx::query_as::<_, BatchRecord>(
            r#"
            SELECT b.id AS batch_id,
                   b.weight_kg,
                   m.co2_per_kg,
                   m.water_per_kg,
                   m.energy_per_kg,
                   b.recycled_at::date AS recycled_on
            FROM textile_batches b
            LEFT JOIN materials m ON m.id = b.material_type_id
            WHERE b.owner_id = $1 AND b.status = 'recycled' AND b.is_active
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl AchievementStore for PgStore {
    async fn active_achievements(&self) -> Result<Vec<Achievement>, AppError> {
        Ok(sqlx::query_as::<_, Achievement>(
            "SELECT * FROM achievements WHERE is_active ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn award(
        &self,
        user_id: Uuid,
        achievement_id: Uuid,
        batch_id: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_achievements (id, user_id, achievement_id, batch_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, achievement_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(achievement_id)
        .bind(batch_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn user_achievements(&self, user_id: Uuid) -> Result<Vec<EarnedAchievement>, AppError> {
        Ok(sqlx::query_as::<_, EarnedAchievement>(
            r#"
            SELECT ua.id, ua.achievement_id, a.code, a.name, a.icon, a.color, a.points_reward,
                   ua.earned_at, ua.batch_id, ua.is_viewed
            FROM user_achievements ua
            JOIN achievements a ON a.id = ua.achievement_id
            WHERE ua.user_id = $1
            ORDER BY ua.earned_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn mark_viewed(&self, user_id: Uuid, user_achievement_id: Uuid) -> Result<(), AppError> {
        let result =
            sqlx::query("UPDATE user_achievements SET is_viewed = TRUE WHERE id = $1 AND user_id = $2")
                .bind(user_achievement_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Achievement {user_achievement_id} not found"
            )));
        }
        Ok(())
    }

    async fn seed(&self, catalogue: &[Achievement]) -> Result<usize, AppError> {
        let mut inserted = 0;
        for achievement in catalogue {
            let result = sqlx::query(
                r#"
                INSERT INTO achievements
                    (id, code, name, description, criteria_type, criteria_value, criteria_details,
                     icon, color, points_reward, is_active)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (code) DO NOTHING
                "#,
            )
            .bind(achievement.id)
            .bind(&achievement.code)
            .bind(&achievement.name)
            .bind(&achievement.description)
            .bind(&achievement.criteria_type)
            .bind(achievement.criteria_value)
            .bind(&achievement.criteria_details)
            .bind(&achievement.icon)
            .bind(&achievement.color)
            .bind(achievement.points_reward)
            .bind(achievement.is_active)
            .execute(&self.pool)
            .await?;
            inserted += result.rows_affected() as usize;
        }
        Ok(inserted)
    }
}
