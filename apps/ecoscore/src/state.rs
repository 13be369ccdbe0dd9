use std::sync::Arc;

use crate::clock::Clock;
use crate::config::Config;
use crate::eco::gamification::GamificationEngine;
use crate::eco::locks::UserLocks;
use crate::eco::notifier::BadgeNotifier;
use crate::store::{AchievementStore, BatchSource, ScoreStore};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ScoreStore>,
    pub batches: Arc<dyn BatchSource>,
    pub achievements: Arc<dyn AchievementStore>,
    /// Receives the badge delta of every recomputation that earned something.
    pub notifier: Arc<dyn BadgeNotifier>,
    pub clock: Arc<dyn Clock>,
    pub engine: Arc<GamificationEngine>,
    pub locks: UserLocks,
    pub config: Config,
}

#[cfg(test)]
impl AppState {
    /// Wires every seam to one `MemoryStore`, with a fixed clock and no notifications.
    pub fn in_memory(store: Arc<crate::store::memory::MemoryStore>, today: chrono::NaiveDate) -> Self {
        use crate::clock::FixedClock;
        use crate::config::StoreBackend;
        use crate::eco::notifier::NoopNotifier;

        Self {
            store: store.clone(),
            batches: store.clone(),
            achievements: store,
            notifier: Arc::new(NoopNotifier),
            clock: Arc::new(FixedClock(today)),
            engine: Arc::new(GamificationEngine::default()),
            locks: UserLocks::new(),
            config: Config {
                store_backend: StoreBackend::Memory,
                database_url: None,
                redis_url: None,
                port: 0,
                rust_log: "info".to_string(),
                rollup_interval_secs: 0,
                max_recompute_attempts: 3,
                leaderboard_max: 100,
            },
        }
    }
}
