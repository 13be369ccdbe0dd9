use async_trait::async_trait;
use redis::AsyncCommands;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::eco::EcoScore;

pub const BADGE_CHANNEL: &str = "eco:badges";

/// Payload announced when a recomputation earns new badges.
#[derive(Debug, Clone, Serialize)]
pub struct BadgesEarned<'a> {
    pub user_id: Uuid,
    pub badges: &'a [String],
    pub level: u32,
    pub points: u32,
}

/// Announces badge deltas to whoever notifies users.
#[async_trait]
pub trait BadgeNotifier: Send + Sync {
    async fn badges_earned(&self, score: &EcoScore, new_badges: &[String]) -> Result<(), AppError>;
}

/// Publishes to a Redis pub/sub channel.
pub struct RedisBadgeNotifier {
    client: redis::Client,
    channel: String,
}

impl RedisBadgeNotifier {
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            channel: BADGE_CHANNEL.to_string(),
        }
    }
}

#[async_trait]
impl BadgeNotifier for RedisBadgeNotifier {
    async fn badges_earned(&self, score: &EcoScore, new_badges: &[String]) -> Result<(), AppError> {
        let payload = serde_json::to_string(&BadgesEarned {
            user_id: score.user_id,
            badges: new_badges,
            level: score.level,
            points: score.points,
        })
        .map_err(|e| AppError::Notification(format!("Failed to encode badge event: {e}")))?;

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Notification(e.to_string()))?;
        let receivers: i64 = conn
            .publish(&self.channel, payload)
            .await
            .map_err(|e| AppError::Notification(e.to_string()))?;
        debug!(user_id = %score.user_id, receivers, "Published badge event");
        Ok(())
    }
}

/// Used when no Redis is configured.
pub struct NoopNotifier;

#[async_trait]
impl BadgeNotifier for NoopNotifier {
    async fn badges_earned(&self, score: &EcoScore, new_badges: &[String]) -> Result<(), AppError> {
        debug!(user_id = %score.user_id, ?new_badges, "Badge notification disabled");
        Ok(())
    }
}
