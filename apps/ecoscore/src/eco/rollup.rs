use std::time::Duration;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::eco::aggregator::{aggregate, batches_between, batches_until};
use crate::eco::impact::calculate_impact;
use crate::errors::AppError;
use crate::models::batch::BatchRecord;
use crate::models::eco::{quantize, EcoHistory, EcoScore, PeriodType};
use crate::state::AppState;
use crate::store::{BatchSource, ScoreStore};

const ALL_PERIODS: [PeriodType; 4] = [
    PeriodType::Daily,
    PeriodType::Weekly,
    PeriodType::Monthly,
    PeriodType::Yearly,
];

/// First and last day (inclusive) of the period containing `date`. Weeks start on Monday.
pub fn period_bounds(period_type: PeriodType, date: NaiveDate) -> Result<(NaiveDate, NaiveDate), AppError> {
    let out_of_range = || AppError::InvalidInput(format!("{period_type} period of {date} is out of range"));
    let start = match period_type {
        PeriodType::Daily => date,
        PeriodType::Weekly => date
            .checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
            .ok_or_else(out_of_range)?,
        PeriodType::Monthly => date.with_day(1).ok_or_else(out_of_range)?,
        PeriodType::Yearly => NaiveDate::from_ymd_opt(date.year(), 1, 1).ok_or_else(out_of_range)?,
    };
    let next_start = match period_type {
        PeriodType::Daily => start.checked_add_days(Days::new(1)),
        PeriodType::Weekly => start.checked_add_days(Days::new(7)),
        PeriodType::Monthly => start.checked_add_months(Months::new(1)),
        PeriodType::Yearly => start.checked_add_months(Months::new(12)),
    }
    .ok_or_else(out_of_range)?;
    let end = next_start.pred_opt().ok_or_else(out_of_range)?;
    Ok((start, end))
}

/// Periods that closed at the end of the day before `today`, keyed by their start date.
pub fn closed_periods(today: NaiveDate) -> Result<Vec<(PeriodType, NaiveDate)>, AppError> {
    let yesterday = today
        .pred_opt()
        .ok_or_else(|| AppError::InvalidInput(format!("no day precedes {today}")))?;
    let mut closed = Vec::new();
    for period_type in ALL_PERIODS {
        let (start, end) = period_bounds(period_type, yesterday)?;
        if end == yesterday {
            closed.push((period_type, start));
        }
    }
    Ok(closed)
}

/// Builds the snapshot for the period starting at `start`.
///
/// Period and cumulative figures come from the batch set; level, points and badge
/// count are taken from the stored score at rollup time.
pub fn build_snapshot(
    score: &EcoScore,
    period_type: PeriodType,
    start: NaiveDate,
    batches: &[BatchRecord],
    now: DateTime<Utc>,
) -> Result<EcoHistory, AppError> {
    let (start, end) = period_bounds(period_type, start)?;

    let in_period = batches_between(batches, start, end);
    let period = aggregate(&in_period)?;
    let period_impact = calculate_impact(&in_period)?;

    let to_date = batches_until(batches, end);
    let cumulative = aggregate(&to_date)?;
    let cumulative_impact = calculate_impact(&to_date)?;

    let badges_count = u32::try_from(score.badges.len()).unwrap_or(u32::MAX);

    Ok(EcoHistory {
        id: Uuid::new_v4(),
        user_id: score.user_id,
        date: start,
        period_type,
        batches_count: period.total_batches,
        weight_kg: quantize(period.total_weight_kg),
        co2_saved_kg: quantize(period_impact.co2_saved_kg),
        water_saved_liters: quantize(period_impact.water_saved_liters),
        energy_saved_kwh: quantize(period_impact.energy_saved_kwh),
        cumulative_batches: cumulative.total_batches,
        cumulative_weight_kg: quantize(cumulative.total_weight_kg),
        cumulative_co2_saved_kg: quantize(cumulative_impact.co2_saved_kg),
        cumulative_water_saved_liters: quantize(cumulative_impact.water_saved_liters),
        cumulative_energy_saved_kwh: quantize(cumulative_impact.energy_saved_kwh),
        level: score.level,
        points: score.points,
        badges_count,
        created_at: now,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollupReport {
    pub date: Option<NaiveDate>,
    pub users: usize,
    pub written: usize,
    pub already_recorded: usize,
    pub failed: usize,
}

/// Writes snapshots for every user and every period closed before `today`.
/// Re-running for the same date only reports the snapshots as already recorded.
pub async fn run_rollup(
    store: &dyn ScoreStore,
    source: &dyn BatchSource,
    today: NaiveDate,
) -> Result<RollupReport, AppError> {
    let periods = closed_periods(today)?;
    let user_ids = store.list_user_ids().await?;
    let mut report = RollupReport {
        date: Some(today),
        users: user_ids.len(),
        ..RollupReport::default()
    };

    for user_id in user_ids {
        match rollup_user(store, source, user_id, &periods).await {
            Ok((written, already_recorded)) => {
                report.written += written;
                report.already_recorded += already_recorded;
            }
            Err(e) => {
                error!(%user_id, "Rollup failed: {e}");
                report.failed += 1;
            }
        }
    }

    info!(
        date = %today,
        users = report.users,
        written = report.written,
        already_recorded = report.already_recorded,
        failed = report.failed,
        "Eco history rollup finished"
    );
    Ok(report)
}

async fn rollup_user(
    store: &dyn ScoreStore,
    source: &dyn BatchSource,
    user_id: Uuid,
    periods: &[(PeriodType, NaiveDate)],
) -> Result<(usize, usize), AppError> {
    let score = store.load(user_id).await?;
    let batches = source.recycled_batches(user_id).await?;
    let mut written = 0;
    let mut already_recorded = 0;
    for &(period_type, start) in periods {
        let snapshot = build_snapshot(&score, period_type, start, &batches, Utc::now())?;
        match store.append_history(&snapshot).await {
            Ok(()) => written += 1,
            Err(AppError::DuplicateSnapshot { .. }) => {
                debug!(%user_id, %period_type, %start, "Snapshot already recorded");
                already_recorded += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok((written, already_recorded))
}

/// Runs the rollup on every tick of `interval`, for the state clock's current day.
pub fn spawn_rollup_task(state: AppState, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let today = state.clock.today();
            if let Err(e) = run_rollup(state.store.as_ref(), state.batches.as_ref(), today).await {
                error!("Eco history rollup aborted: {e}");
            }
        }
    })
}
