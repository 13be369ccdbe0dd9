use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::achievement::{Achievement, EarnedAchievement, UserAchievement};
use crate::models::batch::BatchRecord;
use crate::models::eco::{EcoHistory, EcoScore, PeriodType};
use crate::store::{AchievementStore, BatchSource, ScoreStore};

/// Process-local backend implementing every store seam.
#[derive(Default)]
pub struct MemoryStore {
    scores: RwLock<HashMap<Uuid, EcoScore>>,
    history: RwLock<BTreeMap<(Uuid, NaiveDate, PeriodType), EcoHistory>>,
    batches: RwLock<HashMap<Uuid, Vec<BatchRecord>>>,
    achievements: RwLock<Vec<Achievement>>,
    earned: RwLock<Vec<UserAchievement>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn insert_batch(&self, user_id: Uuid, batch: BatchRecord) {
        self.batches.write().await.entry(user_id).or_default().push(batch);
    }
}

#[async_trait]
impl ScoreStore for MemoryStore {
    async fn create(&self, user_id: Uuid) -> Result<EcoScore, AppError> {
        let mut scores = self.scores.write().await;
        Ok(scores
            .entry(user_id)
            .or_insert_with(|| EcoScore::new(user_id, Utc::now()))
            .clone())
    }

    async fn load(&self, user_id: Uuid) -> Result<EcoScore, AppError> {
        self.scores
            .read()
            .await
            .get(&user_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Eco score for user {user_id} not found")))
    }

    async fn save(&self, score: &EcoScore) -> Result<EcoScore, AppError> {
        let mut scores = self.scores.write().await;
        let stored = scores.get_mut(&score.user_id).ok_or_else(|| {
            AppError::NotFound(format!("Eco score for user {} not found", score.user_id))
        })?;
        if stored.version != score.version {
            return Err(AppError::ConcurrentWriteConflict {
                user_id: score.user_id,
                expected_version: score.version,
            });
        }
        *stored = EcoScore {
            // Ranks belong to the ranking job, not to engine runs.
            global_rank: stored.global_rank,
            region_rank: stored.region_rank,
            version: score.version + 1,
            updated_at: Utc::now(),
            ..score.clone()
        };
        Ok(stored.clone())
    }

    async fn append_history(&self, snapshot: &EcoHistory) -> Result<(), AppError> {
        let key = (snapshot.user_id, snapshot.date, snapshot.period_type);
        let mut history = self.history.write().await;
        if history.contains_key(&key) {
            return Err(AppError::DuplicateSnapshot {
                user_id: snapshot.user_id,
                date: snapshot.date,
                period_type: snapshot.period_type,
            });
        }
        history.insert(key, snapshot.clone());
        Ok(())
    }

    async fn history(
        &self,
        user_id: Uuid,
        period_type: Option<PeriodType>,
    ) -> Result<Vec<EcoHistory>, AppError> {
        Ok(self
            .history
            .read()
            .await
            .values()
            .filter(|h| h.user_id == user_id)
            .filter(|h| period_type.map_or(true, |p| h.period_type == p))
            .cloned()
            .collect())
    }

    async fn list_user_ids(&self) -> Result<Vec<Uuid>, AppError> {
        let mut ids: Vec<Uuid> = self.scores.read().await.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    async fn leaderboard(&self, limit: u32) -> Result<Vec<EcoScore>, AppError> {
        let mut scores: Vec<EcoScore> = self.scores.read().await.values().cloned().collect();
        scores.sort_by(|a, b| {
            b.points
                .cmp(&a.points)
                .then(b.total_weight_kg.cmp(&a.total_weight_kg))
                .then(a.user_id.cmp(&b.user_id))
        });
        scores.truncate(limit as usize);
        Ok(scores)
    }
}

#[async_trait]
impl BatchSource for MemoryStore {
    async fn recycled_batches(&self, user_id: Uuid) -> Result<Vec<BatchRecord>, AppError> {
        Ok(self
            .batches
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl AchievementStore for MemoryStore {
    async fn active_achievements(&self) -> Result<Vec<Achievement>, AppError> {
        let mut active: Vec<Achievement> = self
            .achievements
            .read()
            .await
            .iter()
            .filter(|a| a.is_active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(active)
    }

    async fn award(
        &self,
        user_id: Uuid,
        achievement_id: Uuid,
        batch_id: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let mut earned = self.earned.write().await;
        if earned
            .iter()
            .any(|e| e.user_id == user_id && e.achievement_id == achievement_id)
        {
            return Ok(false);
        }
        earned.push(UserAchievement {
            id: Uuid::new_v4(),
            user_id,
            achievement_id,
            earned_at: Utc::now(),
            batch_id,
            is_viewed: false,
        });
        Ok(true)
    }

    async fn user_achievements(&self, user_id: Uuid) -> Result<Vec<EarnedAchievement>, AppError> {
        let achievements = self.achievements.read().await;
        let earned = self.earned.read().await;
        Ok(earned
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter_map(|e| {
                achievements
                    .iter()
                    .find(|a| a.id == e.achievement_id)
                    .map(|a| EarnedAchievement {
                        id: e.id,
                        achievement_id: a.id,
                        code: a.code.clone(),
                        name: a.name.clone(),
                        icon: a.icon.clone(),
                        color: a.color.clone(),
                        points_reward: a.points_reward,
                        earned_at: e.earned_at,
                        batch_id: e.batch_id,
                        is_viewed: e.is_viewed,
                    })
            })
            .collect())
    }

    async fn mark_viewed(&self, user_id: Uuid, user_achievement_id: Uuid) -> Result<(), AppError> {
        let mut earned = self.earned.write().await;
        let entry = earned
            .iter_mut()
            .find(|e| e.id == user_achievement_id && e.user_id == user_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("Achievement {user_achievement_id} not found"))
            })?;
        entry.is_viewed = true;
        Ok(())
    }

    async fn seed(&self, catalogue: &[Achievement]) -> Result<usize, AppError> {
        let mut achievements = self.achievements.write().await;
        let mut inserted = 0;
        for achievement in catalogue {
            if achievements.iter().all(|a| a.code != achievement.code) {
                achievements.push(achievement.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}
