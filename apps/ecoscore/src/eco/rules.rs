use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Points needed to reach each level; level N starts at `LEVEL_THRESHOLDS[N - 1]`.
pub const LEVEL_THRESHOLDS: &[u32] = &[0, 100, 300, 600, 1000, 1500, 2100, 2800, 3600, 4500, 5500];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeMetric {
    /// Cumulative recycled weight in kg.
    WeightKg,
    /// Completed batch count.
    Batches,
    /// Current streak, after this run's streak update.
    StreakDays,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BadgeRule {
    pub metric: BadgeMetric,
    /// Inclusive lower bound on the metric.
    pub threshold: u32,
    pub code: &'static str,
}

const fn rule(metric: BadgeMetric, threshold: u32, code: &'static str) -> BadgeRule {
    BadgeRule {
        metric,
        threshold,
        code,
    }
}

pub const BADGE_RULES: &[BadgeRule] = &[
    rule(BadgeMetric::WeightKg, 1, "first_step"),
    rule(BadgeMetric::WeightKg, 10, "eco_starter"),
    rule(BadgeMetric::WeightKg, 50, "eco_enthusiast"),
    rule(BadgeMetric::WeightKg, 100, "eco_warrior"),
    rule(BadgeMetric::WeightKg, 500, "eco_champion"),
    rule(BadgeMetric::WeightKg, 1000, "eco_legend"),
    rule(BadgeMetric::Batches, 5, "regular_recycler"),
    rule(BadgeMetric::Batches, 20, "dedicated_recycler"),
    rule(BadgeMetric::Batches, 50, "recycling_expert"),
    rule(BadgeMetric::StreakDays, 7, "weekly_streak"),
    rule(BadgeMetric::StreakDays, 30, "monthly_streak"),
    rule(BadgeMetric::StreakDays, 100, "centurion"),
];

/// Level and badge tables the engine evaluates against.
#[derive(Debug, Clone)]
pub struct GamificationRules {
    level_thresholds: Vec<u32>,
    badge_rules: Vec<BadgeRule>,
}

impl Default for GamificationRules {
    fn default() -> Self {
        Self {
            level_thresholds: LEVEL_THRESHOLDS.to_vec(),
            badge_rules: BADGE_RULES.to_vec(),
        }
    }
}

impl GamificationRules {
    /// Builds a rule set, rejecting malformed tables.
    ///
    /// Level thresholds must start at 0 and strictly ascend. Badge thresholds must be
    /// positive and strictly ascend per metric, and badge codes must be unique.
    pub fn new(level_thresholds: Vec<u32>, badge_rules: Vec<BadgeRule>) -> Result<Self, AppError> {
        let rules = Self {
            level_thresholds,
            badge_rules,
        };
        rules.validate()?;
        Ok(rules)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        match self.level_thresholds.first() {
            None => {
                return Err(AppError::InvalidInput(
                    "level threshold table is empty".to_string(),
                ))
            }
            Some(&first) if first != 0 => {
                return Err(AppError::InvalidInput(format!(
                    "level threshold table must start at 0, found {first}"
                )))
            }
            Some(_) => {}
        }
        if self.level_thresholds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AppError::InvalidInput(
                "level thresholds must be strictly ascending".to_string(),
            ));
        }

        let mut codes = HashSet::new();
        for badge in &self.badge_rules {
            if badge.threshold == 0 {
                return Err(AppError::InvalidInput(format!(
                    "badge '{}' has a zero threshold",
                    badge.code
                )));
            }
            if !codes.insert(badge.code) {
                return Err(AppError::InvalidInput(format!(
                    "badge code '{}' appears more than once",
                    badge.code
                )));
            }
        }
        for metric in [BadgeMetric::WeightKg, BadgeMetric::Batches, BadgeMetric::StreakDays] {
            let thresholds: Vec<u32> = self.rules_for(metric).map(|b| b.threshold).collect();
            if thresholds.windows(2).any(|w| w[0] >= w[1]) {
                return Err(AppError::InvalidInput(format!(
                    "{metric:?} badge thresholds must be strictly ascending"
                )));
            }
        }
        Ok(())
    }

    pub fn level_thresholds(&self) -> &[u32] {
        &self.level_thresholds
    }

    pub fn badge_rules(&self) -> &[BadgeRule] {
        &self.badge_rules
    }

    /// Badges for one metric, in table order (ascending threshold once validated).
    pub fn rules_for(&self, metric: BadgeMetric) -> impl Iterator<Item = &BadgeRule> {
        self.badge_rules.iter().filter(move |b| b.metric == metric)
    }
}
