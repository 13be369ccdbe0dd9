use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::eco::achievements::award_achievements;
use crate::eco::aggregator::aggregate;
use crate::eco::gamification::{GamificationEngine, ScoreUpdate};
use crate::eco::impact::calculate_impact;
use crate::eco::streak::StreakTransition;
use crate::errors::AppError;
use crate::models::batch::BatchRecord;
use crate::models::eco::EcoScore;
use crate::state::AppState;
use crate::store::load_or_create;

/// A batch owned by `user_id` was marked recycled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecycled {
    pub user_id: Uuid,
    #[serde(default)]
    pub batch_id: Option<Uuid>,
    /// Defaults to the service clock's today.
    #[serde(default)]
    pub occurred_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub score: EcoScore,
    pub new_badges: Vec<String>,
    pub streak: StreakTransition,
    pub achievements: Vec<String>,
    pub attempts: u32,
}

/// Aggregate, impact and gamify in one pure step over the user's full batch set.
pub fn recompute(
    engine: &GamificationEngine,
    current: &EcoScore,
    batches: &[BatchRecord],
    today: NaiveDate,
) -> Result<ScoreUpdate, AppError> {
    let activity = aggregate(batches)?;
    let impact = calculate_impact(batches)?;
    engine.apply(current, &activity, &impact, today)
}

/// Recomputes and persists the owner's eco score for a recycled batch.
///
/// Runs under the user's lock. A lost optimistic-lock race re-reads the score and
/// batches and recomputes from scratch, up to `max_recompute_attempts` times.
pub async fn handle_batch_recycled(
    state: &AppState,
    event: &BatchRecycled,
) -> Result<PipelineOutcome, AppError> {
    let user_id = event.user_id;
    let today = event.occurred_on.unwrap_or_else(|| state.clock.today());

    let _guard = state.locks.lock(user_id).await;

    let max_attempts = state.config.max_recompute_attempts.max(1);
    let mut attempts = 0;
    let (saved, update) = loop {
        attempts += 1;
        match recompute_and_save(state, user_id, today).await {
            Ok(done) => break done,
            Err(AppError::ConcurrentWriteConflict {
                expected_version, ..
            }) if attempts < max_attempts => {
                warn!(%user_id, expected_version, attempts, "Eco score changed during recompute, retrying");
            }
            Err(e) => return Err(e),
        }
    };

    // Announce before anything else can fail: a retry sees the badges as held.
    if !update.new_badges.is_empty() {
        if let Err(e) = state.notifier.badges_earned(&saved, &update.new_badges).await {
            warn!(%user_id, "Badge notification failed: {e}");
        }
    }

    let achievements = award_achievements(state.achievements.as_ref(), &saved, event.batch_id).await?;

    info!(
        %user_id,
        batches = saved.total_batches,
        weight_kg = %saved.total_weight_kg,
        points = saved.points,
        level = saved.level,
        streak_days = saved.streak_days,
        new_badges = ?update.new_badges,
        attempts,
        "Eco score updated"
    );

    Ok(PipelineOutcome {
        score: saved,
        new_badges: update.new_badges,
        streak: update.streak,
        achievements,
        attempts,
    })
}

async fn recompute_and_save(
    state: &AppState,
    user_id: Uuid,
    today: NaiveDate,
) -> Result<(EcoScore, ScoreUpdate), AppError> {
    let current = load_or_create(state.store.as_ref(), user_id).await?;
    let batches = state.batches.recycled_batches(user_id).await?;
    let update = recompute(&state.engine, &current, &batches, today)?;
    let saved = state.store.save(&update.score).await?;
    Ok((saved, update))
}
