use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which branch of the streak state machine a run took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakTransition {
    /// No prior activity: the streak starts at 1.
    Started,
    /// Already counted today; nothing changes.
    SameDay,
    /// Activity the day after the last one.
    Extended,
    /// A gap of more than a day, or a date before the last activity.
    Broken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreakState {
    pub streak_days: u32,
    pub longest_streak_days: u32,
    pub last_activity_date: Option<NaiveDate>,
}

pub fn classify(last_activity_date: Option<NaiveDate>, today: NaiveDate) -> StreakTransition {
    match last_activity_date {
        None => StreakTransition::Started,
        Some(last) if last == today => StreakTransition::SameDay,
        Some(last) if (today - last).num_days() == 1 => StreakTransition::Extended,
        Some(_) => StreakTransition::Broken,
    }
}

/// Applies exactly one transition for activity on `today`.
/// `longest_streak_days` is a running maximum and never decreases.
pub fn advance(state: StreakState, today: NaiveDate) -> (StreakState, StreakTransition) {
    let transition = classify(state.last_activity_date, today);
    let next = match transition {
        StreakTransition::SameDay => state,
        StreakTransition::Started | StreakTransition::Broken => StreakState {
            streak_days: 1,
            longest_streak_days: state.longest_streak_days.max(1),
            last_activity_date: Some(today),
        },
        StreakTransition::Extended => {
            let streak_days = state.streak_days.saturating_add(1);
            StreakState {
                streak_days,
                longest_streak_days: state.longest_streak_days.max(streak_days),
                last_activity_date: Some(today),
            }
        }
    };
    (next, transition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn state(streak: u32, longest: u32, last: Option<NaiveDate>) -> StreakState {
        StreakState {
            streak_days: streak,
            longest_streak_days: longest,
            last_activity_date: last,
        }
    }

    #[test]
    fn test_first_activity_starts_streak() {
        let (next, t) = advance(StreakState::default(), d(10));
        assert_eq!(t, StreakTransition::Started);
        assert_eq!(next, state(1, 1, Some(d(10))));
    }

    #[test]
    fn test_same_day_is_noop() {
        let before = state(3, 8, Some(d(10)));
        let (next, t) = advance(before, d(10));
        assert_eq!(t, StreakTransition::SameDay);
        assert_eq!(next, before);
    }

    #[test]
    fn test_consecutive_day_extends_and_raises_longest() {
        let (next, t) = advance(state(5, 5, Some(d(10))), d(11));
        assert_eq!(t, StreakTransition::Extended);
        assert_eq!(next, state(6, 6, Some(d(11))));
    }

    #[test]
    fn test_consecutive_day_below_longest_keeps_longest() {
        let (next, _) = advance(state(2, 9, Some(d(10))), d(11));
        assert_eq!(next, state(3, 9, Some(d(11))));
    }

    #[test]
    fn test_gap_breaks_streak_and_keeps_longest() {
        let (next, t) = advance(state(6, 6, Some(d(10))), d(15));
        assert_eq!(t, StreakTransition::Broken);
        assert_eq!(next, state(1, 6, Some(d(15))));
    }

    #[test]
    fn test_date_before_last_activity_is_broken() {
        let (next, t) = advance(state(4, 4, Some(d(10))), d(9));
        assert_eq!(t, StreakTransition::Broken);
        assert_eq!(next, state(1, 4, Some(d(9))));
    }

    #[test]
    fn test_month_boundary_is_consecutive() {
        let last = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let today = last + Duration::days(1);
        assert_eq!(classify(Some(last), today), StreakTransition::Extended);
    }

    #[test]
    fn test_second_trigger_same_day_advances_once() {
        let (first, _) = advance(state(1, 1, Some(d(1))), d(2));
        let (second, t) = advance(first, d(2));
        assert_eq!(t, StreakTransition::SameDay);
        assert_eq!(second.streak_days, 2);
    }
}
