//! Streak Calculator — consecutive qualifying days for a system
//!
//! A day qualifies when at least one of the system's micro-actions has a
//! completion, in either variant. The walk anchors at today, or at
//! yesterday when today has no activity yet — the day is still "in
//! progress" from the user's perspective and the streak should not read as
//! broken at midnight.

use chrono::{Duration, NaiveDate};
use std::collections::HashSet;

use crate::error::EngineError;
use crate::store::Store;

/// Current streak for (user, system) as of `today`. Always derived from the
/// completion ledger; nothing is cached on the write path.
pub fn current_streak(
    store: &Store,
    user_id: &str,
    system_id: &str,
    today: NaiveDate,
) -> Result<u32, EngineError> {
    let dates = store.completion_dates_for_system(user_id, system_id)?;
    Ok(streak_from_dates(&dates, today))
}

fn streak_from_dates(dates: &HashSet<NaiveDate>, today: NaiveDate) -> u32 {
    let anchor = if dates.contains(&today) {
        today
    } else if dates.contains(&(today - Duration::days(1))) {
        today - Duration::days(1)
    } else {
        return 0;
    };

    let mut streak = 0;
    let mut day = anchor;
    while dates.contains(&day) {
        streak += 1;
        day = match day.pred_opt() {
            Some(prev) => prev,
            None => break,
        };
    }
    streak
}
