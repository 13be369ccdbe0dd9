pub mod extractors;
pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::eco::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/eco/scores", post(handlers::handle_create_score))
        .route("/api/v1/eco/score", get(handlers::handle_get_score))
        .route(
            "/api/v1/eco/events/batch-recycled",
            post(handlers::handle_batch_recycled_event),
        )
        .route("/api/v1/eco/history", get(handlers::handle_get_history))
        .route("/api/v1/eco/rollup", post(handlers::handle_rollup))
        .route("/api/v1/eco/leaderboard", get(handlers::handle_leaderboard))
        .route(
            "/api/v1/eco/achievements",
            get(handlers::handle_get_achievements),
        )
        .route(
            "/api/v1/eco/achievements/:id/viewed",
            patch(handlers::handle_mark_viewed),
        )
        .with_state(state)
}
