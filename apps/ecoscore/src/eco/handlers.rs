use axum::{extract::State, http::StatusCode, Json};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::eco::pipeline::{handle_batch_recycled, BatchRecycled, PipelineOutcome};
use crate::eco::rollup::{run_rollup, RollupReport};
use crate::errors::AppError;
use crate::models::achievement::EarnedAchievement;
use crate::models::eco::{EcoHistory, EcoScore, PeriodType};
use crate::routes::extractors::{AppJson, AppPath, AppQuery};
use crate::state::AppState;

const DEFAULT_LEADERBOARD_LIMIT: u32 = 10;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct UserIdBody {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub user_id: Uuid,
    pub period_type: Option<String>,
}

#[derive(Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct RollupRequest {
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// POST /api/v1/eco/scores
/// 201 when the score is created, 200 when the user already had one.
pub async fn handle_create_score(
    State(state): State<AppState>,
    AppJson(req): AppJson<UserIdBody>,
) -> Result<(StatusCode, Json<EcoScore>), AppError> {
    match state.store.load(req.user_id).await {
        Ok(existing) => Ok((StatusCode::OK, Json(existing))),
        Err(AppError::NotFound(_)) => {
            let score = state.store.create(req.user_id).await?;
            Ok((StatusCode::CREATED, Json(score)))
        }
        Err(e) => Err(e),
    }
}

/// GET /api/v1/eco/score
pub async fn handle_get_score(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<UserIdQuery>,
) -> Result<Json<EcoScore>, AppError> {
    Ok(Json(state.store.load(params.user_id).await?))
}

/// POST /api/v1/eco/events/batch-recycled
pub async fn handle_batch_recycled_event(
    State(state): State<AppState>,
    AppJson(event): AppJson<BatchRecycled>,
) -> Result<Json<PipelineOutcome>, AppError> {
    Ok(Json(handle_batch_recycled(&state, &event).await?))
}

/// GET /api/v1/eco/history
pub async fn handle_get_history(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<HistoryQuery>,
) -> Result<Json<Vec<EcoHistory>>, AppError> {
    let period_type = params
        .period_type
        .as_deref()
        .map(str::parse::<PeriodType>)
        .transpose()?;
    Ok(Json(state.store.history(params.user_id, period_type).await?))
}

/// POST /api/v1/eco/rollup
pub async fn handle_rollup(
    State(state): State<AppState>,
    AppJson(req): AppJson<RollupRequest>,
) -> Result<Json<RollupReport>, AppError> {
    let today = req.date.unwrap_or_else(|| state.clock.today());
    let report = run_rollup(state.store.as_ref(), state.batches.as_ref(), today).await?;
    Ok(Json(report))
}

/// GET /api/v1/eco/leaderboard
pub async fn handle_leaderboard(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<LeaderboardQuery>,
) -> Result<Json<Vec<EcoScore>>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .clamp(1, state.config.leaderboard_max.max(1));
    Ok(Json(state.store.leaderboard(limit).await?))
}

/// GET /api/v1/eco/achievements
pub async fn handle_get_achievements(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<UserIdQuery>,
) -> Result<Json<Vec<EarnedAchievement>>, AppError> {
    Ok(Json(state.achievements.user_achievements(params.user_id).await?))
}

/// PATCH /api/v1/eco/achievements/:id/viewed
pub async fn handle_mark_viewed(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<UserIdBody>,
) -> Result<StatusCode, AppError> {
    state.achievements.mark_viewed(req.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
