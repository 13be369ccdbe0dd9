//! Points, level, badges, next-badge progress and streak for one eco score.
//!
//! `GamificationEngine::apply` is a pure function of the stored score, the freshly
//! aggregated activity and the trigger date. It never touches storage; the pipeline
//! persists its result as a separate step.
//!
//! Order within one run:
//! 1. streak transition for `today`
//! 2. points and level from total weight (recomputed from scratch)
//! 3. badges earned by the new metrics, unioned with the badges already held
//! 4. next-badge progress from the post-union badge set

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::eco::aggregator::ActivityTotals;
use crate::eco::impact::ImpactTotals;
use crate::eco::rules::{BadgeMetric, GamificationRules};
use crate::eco::streak::{advance, StreakState, StreakTransition};
use crate::errors::AppError;
use crate::models::eco::{quantize, EcoScore, DECIMAL_PLACES};

const POINTS_PER_KG: Decimal = Decimal::TEN;

/// Result of one engine run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreUpdate {
    pub score: EcoScore,
    /// Badges held now that were not held before, in code order.
    pub new_badges: Vec<String>,
    pub streak: StreakTransition,
}

#[derive(Debug, Clone, Default)]
pub struct GamificationEngine {
    rules: GamificationRules,
}

impl GamificationEngine {
    pub fn new(rules: GamificationRules) -> Result<Self, AppError> {
        rules.validate()?;
        Ok(Self { rules })
    }

    pub fn apply(
        &self,
        current: &EcoScore,
        activity: &ActivityTotals,
        impact: &ImpactTotals,
        today: NaiveDate,
    ) -> Result<ScoreUpdate, AppError> {
        validate_inputs(activity, impact)?;

        let (streak_state, streak) = advance(
            StreakState {
                streak_days: current.streak_days,
                longest_streak_days: current.longest_streak_days,
                last_activity_date: current.last_activity_date,
            },
            today,
        );

        let total_weight_kg = quantize(activity.total_weight_kg);
        let points = points_for_weight(total_weight_kg)?;
        let level = level_for_points(self.rules.level_thresholds(), points);

        let earned = earned_badges(
            &self.rules,
            total_weight_kg,
            activity.total_batches,
            streak_state.streak_days,
        );
        let new_badges: Vec<String> = earned.difference(&current.badges).cloned().collect();
        let badges: BTreeSet<String> = current.badges.union(&earned).cloned().collect();
        let next_badge_progress = next_badge_progress(&self.rules, total_weight_kg, &badges);

        let score = EcoScore {
            total_batches: activity.total_batches,
            total_weight_kg,
            total_co2_saved_kg: quantize(impact.co2_saved_kg),
            total_water_saved_liters: quantize(impact.water_saved_liters),
            total_energy_saved_kwh: quantize(impact.energy_saved_kwh),
            level,
            points,
            badges,
            next_badge_progress,
            streak_days: streak_state.streak_days,
            longest_streak_days: streak_state.longest_streak_days,
            last_activity_date: streak_state.last_activity_date,
            trees_equivalent: quantize(impact.trees_equivalent),
            ..current.clone()
        };

        Ok(ScoreUpdate {
            score,
            new_badges,
            streak,
        })
    }
}

fn validate_inputs(activity: &ActivityTotals, impact: &ImpactTotals) -> Result<(), AppError> {
    let checks = [
        ("total_weight_kg", activity.total_weight_kg),
        ("co2_saved_kg", impact.co2_saved_kg),
        ("water_saved_liters", impact.water_saved_liters),
        ("energy_saved_kwh", impact.energy_saved_kwh),
        ("trees_equivalent", impact.trees_equivalent),
    ];
    for (name, value) in checks {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(AppError::InvalidInput(format!("{name} is negative ({value})")));
        }
    }
    // Stored weight and points must agree, so weight is never rounded here.
    if activity.total_weight_kg.normalize().scale() > DECIMAL_PLACES {
        return Err(AppError::InvalidInput(format!(
            "total_weight_kg {} has more than {DECIMAL_PLACES} decimal places",
            activity.total_weight_kg
        )));
    }
    Ok(())
}

/// `floor(weight × 10)`.
pub fn points_for_weight(total_weight_kg: Decimal) -> Result<u32, AppError> {
    total_weight_kg
        .checked_mul(POINTS_PER_KG)
        .and_then(|scaled| scaled.floor().to_u32())
        .ok_or_else(|| {
            AppError::InvalidInput(format!("weight {total_weight_kg} kg is out of the points range"))
        })
}

/// Number of thresholds at or below `points`; 1 for any validated table.
pub fn level_for_points(thresholds: &[u32], points: u32) -> u32 {
    let satisfied = thresholds.iter().filter(|&&t| t <= points).count();
    u32::try_from(satisfied).unwrap_or(u32::MAX).max(1)
}

/// Every badge the given metrics qualify for, independent of what is already held.
pub fn earned_badges(
    rules: &GamificationRules,
    total_weight_kg: Decimal,
    total_batches: u32,
    streak_days: u32,
) -> BTreeSet<String> {
    rules
        .badge_rules()
        .iter()
        .filter(|badge| match badge.metric {
            BadgeMetric::WeightKg => total_weight_kg >= Decimal::from(badge.threshold),
            BadgeMetric::Batches => total_batches >= badge.threshold,
            BadgeMetric::StreakDays => streak_days >= badge.threshold,
        })
        .map(|badge| badge.code.to_string())
        .collect()
}

/// Fraction of the way to the lowest weight milestone not in `badges`; 1.0 once all are held.
pub fn next_badge_progress(
    rules: &GamificationRules,
    total_weight_kg: Decimal,
    badges: &BTreeSet<String>,
) -> f64 {
    let weight = total_weight_kg.to_f64().unwrap_or(0.0);
    match rules
        .rules_for(BadgeMetric::WeightKg)
        .find(|milestone| !badges.contains(milestone.code))
    {
        Some(milestone) => (weight / f64::from(milestone.threshold)).clamp(0.0, 1.0),
        None => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eco::rules::LEVEL_THRESHOLDS;
    use chrono::{Duration, Utc};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn fresh() -> EcoScore {
        EcoScore::new(Uuid::new_v4(), Utc::now())
    }

    fn activity(batches: u32, weight: Decimal) -> ActivityTotals {
        ActivityTotals {
            total_batches: batches,
            total_weight_kg: weight,
        }
    }

    fn codes(badges: &[&str]) -> BTreeSet<String> {
        badges.iter().map(|s| s.to_string()).collect()
    }

    fn run(score: &EcoScore, batches: u32, weight: Decimal, today: NaiveDate) -> ScoreUpdate {
        GamificationEngine::default()
            .apply(score, &activity(batches, weight), &ImpactTotals::default(), today)
            .unwrap()
    }

    #[test]
    fn test_zero_activity() {
        let update = run(&fresh(), 0, Decimal::ZERO, d(1));
        assert_eq!(update.score.points, 0);
        assert_eq!(update.score.level, 1);
        assert!(update.score.badges.is_empty());
        assert_eq!(update.score.next_badge_progress, 0.0);
    }

    #[test]
    fn test_first_ten_kilograms() {
        let update = run(&fresh(), 1, dec!(10.00), d(1));
        let score = &update.score;
        assert_eq!(score.points, 100);
        assert_eq!(score.level, 2);
        assert_eq!(score.badges, codes(&["eco_starter", "first_step"]));
        assert!((score.next_badge_progress - 0.2).abs() < 1e-12);
        assert_eq!(score.streak_days, 1);
        assert_eq!(score.longest_streak_days, 1);
        assert_eq!(score.last_activity_date, Some(d(1)));
        assert_eq!(update.new_badges, vec!["eco_starter", "first_step"]);
        assert_eq!(update.streak, StreakTransition::Started);
    }

    #[test]
    fn test_consecutive_day_extends_streak() {
        let mut score = fresh();
        score.streak_days = 5;
        score.longest_streak_days = 5;
        score.last_activity_date = Some(d(10));
        let update = run(&score, 3, dec!(4.00), d(11));
        assert_eq!(update.score.streak_days, 6);
        assert_eq!(update.score.longest_streak_days, 6);
    }

    #[test]
    fn test_gap_resets_streak_keeps_longest() {
        let mut score = fresh();
        score.streak_days = 6;
        score.longest_streak_days = 6;
        score.last_activity_date = Some(d(10));
        let update = run(&score, 3, dec!(4.00), d(15));
        assert_eq!(update.score.streak_days, 1);
        assert_eq!(update.score.longest_streak_days, 6);
        assert_eq!(update.streak, StreakTransition::Broken);
    }

    #[test]
    fn test_streak_badge_uses_updated_streak() {
        let mut score = fresh();
        score.streak_days = 6;
        score.longest_streak_days = 6;
        score.last_activity_date = Some(d(10));
        let update = run(&score, 1, dec!(0.50), d(11));
        assert!(update.score.badges.contains("weekly_streak"));
        assert_eq!(update.new_badges, vec!["weekly_streak"]);
    }

    #[test]
    fn test_batch_count_badges() {
        let update = run(&fresh(), 20, dec!(0.10), d(1));
        assert_eq!(
            update.score.badges,
            codes(&["dedicated_recycler", "regular_recycler"])
        );
    }

    #[test]
    fn test_badges_are_never_revoked() {
        let mut score = fresh();
        score.badges = codes(&["eco_warrior", "centurion"]);
        let update = run(&score, 0, Decimal::ZERO, d(1));
        assert!(update.score.badges.contains("eco_warrior"));
        assert!(update.score.badges.contains("centurion"));
        assert!(update.new_badges.is_empty());
    }

    #[test]
    fn test_progress_skips_held_milestones() {
        let mut score = fresh();
        // Held from an earlier period even though weight is now lower.
        score.badges = codes(&["first_step", "eco_starter", "eco_enthusiast"]);
        let update = run(&score, 2, dec!(20.00), d(1));
        assert!((update.score.next_badge_progress - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_progress_is_one_when_all_weight_badges_held() {
        let update = run(&fresh(), 60, dec!(1000.00), d(1));
        assert!(update.score.badges.contains("eco_legend"));
        assert_eq!(update.score.next_badge_progress, 1.0);
        assert_eq!(update.score.level, 11);
    }

    #[test]
    fn test_level_boundaries() {
        assert_eq!(level_for_points(LEVEL_THRESHOLDS, 0), 1);
        assert_eq!(level_for_points(LEVEL_THRESHOLDS, 99), 1);
        assert_eq!(level_for_points(LEVEL_THRESHOLDS, 100), 2);
        assert_eq!(level_for_points(LEVEL_THRESHOLDS, 250), 2);
        assert_eq!(level_for_points(LEVEL_THRESHOLDS, 5499), 10);
        assert_eq!(level_for_points(LEVEL_THRESHOLDS, 5500), 11);
        assert_eq!(level_for_points(LEVEL_THRESHOLDS, u32::MAX), 11);
    }

    #[test]
    fn test_points_floor() {
        assert_eq!(points_for_weight(dec!(0.09)).unwrap(), 0);
        assert_eq!(points_for_weight(dec!(12.37)).unwrap(), 123);
        assert_eq!(points_for_weight(dec!(99.99)).unwrap(), 999);
    }

    #[test]
    fn test_sub_cent_weight_rejected_not_rounded() {
        let result = GamificationEngine::default().apply(
            &fresh(),
            &activity(1, dec!(9.995)),
            &ImpactTotals::default(),
            d(1),
        );
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert_eq!(run(&fresh(), 1, dec!(9.990), d(1)).score.points, 99);
    }

    #[test]
    fn test_points_overflow_is_invalid_input() {
        assert!(matches!(
            points_for_weight(Decimal::MAX),
            Err(AppError::InvalidInput(_))
        ));
        assert!(points_for_weight(dec!(500000000.00)).is_err());
    }

    #[test]
    fn test_impact_copied_and_quantized() {
        let impact = ImpactTotals {
            co2_saved_kg: dec!(36.0000),
            water_saved_liters: dec!(25000.004),
            energy_saved_kwh: dec!(15.005),
            trees_equivalent: dec!(1.8),
        };
        let update = GamificationEngine::default()
            .apply(&fresh(), &activity(1, dec!(10.00)), &impact, d(1))
            .unwrap();
        assert_eq!(update.score.total_co2_saved_kg, dec!(36.00));
        assert_eq!(update.score.total_water_saved_liters, dec!(25000.00));
        assert_eq!(update.score.total_energy_saved_kwh, dec!(15.01));
        assert_eq!(update.score.trees_equivalent, dec!(1.80));
    }

    #[test]
    fn test_negative_weight_is_invalid_input() {
        let result = GamificationEngine::default().apply(
            &fresh(),
            &activity(1, dec!(-1.00)),
            &ImpactTotals::default(),
            d(1),
        );
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_non_engine_fields_carried_over() {
        let mut score = fresh();
        score.version = 7;
        score.global_rank = Some(3);
        let update = run(&score, 1, dec!(1.00), d(1));
        assert_eq!(update.score.version, 7);
        assert_eq!(update.score.global_rank, Some(3));
        assert_eq!(update.score.user_id, score.user_id);
    }

    #[test]
    fn test_misconfigured_rules_rejected() {
        let rules = GamificationRules::new(vec![0, 100], vec![]).unwrap();
        assert!(GamificationEngine::new(rules).is_ok());
        assert!(GamificationRules::new(vec![5], vec![]).is_err());
    }

    fn weight_strategy() -> impl Strategy<Value = Decimal> {
        (0u64..20_000_000).prop_map(|cents| Decimal::new(cents as i64, 2))
    }

    proptest! {
        #[test]
        fn prop_points_are_floor_of_ten_times_weight(weight in weight_strategy(), batches in 0u32..200) {
            let update = run(&fresh(), batches, weight, d(1));
            let expected = (weight * Decimal::TEN).floor().to_u32().unwrap();
            prop_assert_eq!(update.score.points, expected);
        }

        #[test]
        fn prop_level_is_unique_threshold_index(weight in weight_strategy()) {
            let score = run(&fresh(), 1, weight, d(1)).score;
            let level = score.level as usize;
            prop_assert!(level >= 1 && level <= LEVEL_THRESHOLDS.len());
            prop_assert!(LEVEL_THRESHOLDS[level - 1] <= score.points);
            prop_assert!(level == LEVEL_THRESHOLDS.len() || score.points < LEVEL_THRESHOLDS[level]);
        }

        #[test]
        fn prop_badges_and_longest_streak_monotonic(
            steps in proptest::collection::vec((0u64..5_000, 0u32..3, 0i64..3), 1..40)
        ) {
            let mut score = fresh();
            let mut cents = 0u64;
            let mut batches = 0u32;
            let mut today = d(1);
            for (extra_cents, extra_batches, days) in steps {
                cents += extra_cents;
                batches += extra_batches;
                today += Duration::days(days);
                let next = run(&score, batches, Decimal::new(cents as i64, 2), today).score;
                prop_assert!(next.badges.is_superset(&score.badges));
                prop_assert!(next.longest_streak_days >= next.streak_days);
                prop_assert!(next.longest_streak_days >= score.longest_streak_days);
                prop_assert!(next.points >= score.points);
                prop_assert!(next.level >= score.level);
                prop_assert!((0.0..=1.0).contains(&next.next_badge_progress));
                score = next;
            }
        }

        #[test]
        fn prop_same_day_rerun_is_identical(weight in weight_strategy(), batches in 0u32..100, day in 1u32..28) {
            let engine = GamificationEngine::default();
            let totals = activity(batches, weight);
            let first = engine.apply(&fresh(), &totals, &ImpactTotals::default(), d(day)).unwrap();
            let second = engine.apply(&first.score, &totals, &ImpactTotals::default(), d(day)).unwrap();
            prop_assert_eq!(&second.score, &first.score);
            prop_assert!(second.new_badges.is_empty());
            prop_assert_eq!(second.streak, StreakTransition::SameDay);
        }
    }
}
