use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::achievement::{Achievement, CriteriaType};
use crate::models::eco::EcoScore;
use crate::store::AchievementStore;

/// Whether `score` meets the achievement's threshold.
///
/// Only weight, batch and streak criteria are judged here; material, location and
/// special achievements need data this service never sees and are granted elsewhere.
pub fn qualifies(achievement: &Achievement, score: &EcoScore) -> Result<bool, AppError> {
    let Some(threshold) = achievement.criteria_value else {
        return Ok(false);
    };
    Ok(match achievement.criteria()? {
        CriteriaType::Weight => score.total_weight_kg >= threshold,
        CriteriaType::Batches => Decimal::from(score.total_batches) >= threshold,
        CriteriaType::Streak => Decimal::from(score.streak_days) >= threshold,
        CriteriaType::Material | CriteriaType::Location | CriteriaType::Special => false,
    })
}

/// Awards every active achievement the score now qualifies for.
/// Returns the codes newly earned on this call.
pub async fn award_achievements(
    store: &dyn AchievementStore,
    score: &EcoScore,
    batch_id: Option<Uuid>,
) -> Result<Vec<String>, AppError> {
    let mut awarded = Vec::new();
    for achievement in store.active_achievements().await? {
        match qualifies(&achievement, score) {
            Ok(true) => {
                if store.award(score.user_id, achievement.id, batch_id).await? {
                    info!(
                        user_id = %score.user_id,
                        code = %achievement.code,
                        "Achievement earned"
                    );
                    awarded.push(achievement.code);
                }
            }
            Ok(false) => {}
            Err(e) => warn!(code = %achievement.code, "Skipping misconfigured achievement: {e}"),
        }
    }
    Ok(awarded)
}

/// Built-in achievement definitions seeded at startup; admins may add more.
pub fn default_catalogue(now: DateTime<Utc>) -> Vec<Achievement> {
    let def = |code: &str, name: &str, description: &str, criteria: &str, value: i64, icon: &str, reward: i32| {
        Achievement {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            criteria_type: criteria.to_string(),
            criteria_value: Some(Decimal::from(value)),
            criteria_details: None,
            icon: icon.to_string(),
            color: "#28a745".to_string(),
            points_reward: reward,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    };
    vec![
        def("first_kilogram", "First Kilogram", "Recycle your first kilogram of textiles", "weight", 1, "leaf", 10),
        def("quarter_ton", "Quarter Ton", "Recycle 250 kg of textiles", "weight", 250, "scale", 250),
        def("batch_habit", "Batch Habit", "Complete 10 recycling batches", "batches", 10, "box", 50),
        def("centennial_batches", "Centennial", "Complete 100 recycling batches", "batches", 100, "trophy", 500),
        def("fortnight_streak", "Fortnight", "Recycle 14 days in a row", "streak", 14, "flame", 140),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use rust_decimal_macros::dec;

    fn score_with(weight: Decimal, batches: u32, streak: u32) -> EcoScore {
        let mut score = EcoScore::new(Uuid::new_v4(), Utc::now());
        score.total_weight_kg = weight;
        score.total_batches = batches;
        score.streak_days = streak;
        score.longest_streak_days = streak;
        score
    }

    fn find(catalogue: &[Achievement], code: &str) -> Achievement {
        catalogue.iter().find(|a| a.code == code).unwrap().clone()
    }

    #[test]
    fn test_qualifies_by_criteria_type() {
        let catalogue = default_catalogue(Utc::now());
        let score = score_with(dec!(250.00), 9, 14);
        assert!(qualifies(&find(&catalogue, "quarter_ton"), &score).unwrap());
        assert!(!qualifies(&find(&catalogue, "batch_habit"), &score).unwrap());
        assert!(qualifies(&find(&catalogue, "fortnight_streak"), &score).unwrap());
    }

    #[test]
    fn test_special_criteria_never_auto_awarded() {
        let mut special = find(&default_catalogue(Utc::now()), "first_kilogram");
        special.criteria_type = "special".to_string();
        assert!(!qualifies(&special, &score_with(dec!(1000.00), 100, 100)).unwrap());
    }

    #[test]
    fn test_missing_threshold_never_qualifies() {
        let mut achievement = find(&default_catalogue(Utc::now()), "batch_habit");
        achievement.criteria_value = None;
        assert!(!qualifies(&achievement, &score_with(dec!(1.00), 500, 0)).unwrap());
    }

    #[test]
    fn test_unknown_criteria_is_error() {
        let mut achievement = find(&default_catalogue(Utc::now()), "batch_habit");
        achievement.criteria_type = "karma".to_string();
        assert!(qualifies(&achievement, &score_with(dec!(1.00), 500, 0)).is_err());
    }

    #[tokio::test]
    async fn test_awards_once_and_skips_inactive() {
        let store = MemoryStore::new();
        let mut catalogue = default_catalogue(Utc::now());
        for a in catalogue.iter_mut().filter(|a| a.code == "batch_habit") {
            a.is_active = false;
        }
        store.seed(&catalogue).await.unwrap();

        let score = score_with(dec!(2.00), 12, 1);
        let batch_id = Some(Uuid::new_v4());
        let first = award_achievements(&store, &score, batch_id).await.unwrap();
        assert_eq!(first, vec!["first_kilogram"]);

        let second = award_achievements(&store, &score, batch_id).await.unwrap();
        assert!(second.is_empty());

        let earned = store.user_achievements(score.user_id).await.unwrap();
        assert_eq!(earned.len(), 1);
        assert_eq!(earned[0].batch_id, batch_id);
        assert!(!earned[0].is_viewed);
    }
}
