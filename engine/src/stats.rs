//! Weekly Aggregator — zero-filled 7-day completion counts
//!
//! Produces exactly one entry per day over [end-6, end] in chronological
//! order; days without activity report 0, never a missing key. The series
//! renders directly as a heatmap.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::error::EngineError;
use crate::store::Store;

pub const WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: i64,
}

/// Completion counts for the user's last 7 calendar days, inclusive of
/// `end`.
pub fn weekly_stats(
    store: &Store,
    user_id: &str,
    end: NaiveDate,
) -> Result<Vec<DailyCount>, EngineError> {
    let start = end - Duration::days(WINDOW_DAYS - 1);
    let counts = store.daily_completion_counts(user_id, start, end)?;

    let series = (0..WINDOW_DAYS)
        .map(|offset| {
            let date = start + Duration::days(offset);
            DailyCount {
                date,
                count: counts.get(&date).copied().unwrap_or(0),
            }
        })
        .collect();
    Ok(series)
}
