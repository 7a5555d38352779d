//! Completion Recorder — idempotent write path for daily completions
//!
//! Turns "user did action X today" into at most one CompletedAction row per
//! (user, day, action). Safe to replay: a duplicate request resolves to
//! `AlreadyRecorded` via the store's uniqueness invariants, with no locks.

use chrono::NaiveDate;
use tracing::debug;

use crate::error::EngineError;
use crate::store::{ActionVersion, Store};

/// Outcome of a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded { version: ActionVersion },
    AlreadyRecorded { version: ActionVersion },
}

/// Records a completion for (user, action, today).
///
/// The daily log is created lazily on the first completion of the day and
/// captures the mood passed with that first request. The completed variant
/// is decided once, here, from the mood — `bad_day` keeps the chain alive
/// on a hard day and counts toward streaks exactly like `ideal`.
pub fn record_completion(
    store: &Store,
    user_id: &str,
    action_id: &str,
    mood: &str,
    today: NaiveDate,
) -> Result<RecordOutcome, EngineError> {
    let action = store
        .micro_action(action_id)?
        .ok_or(EngineError::NotFound("micro action"))?;

    let log = match store.daily_log(user_id, today)? {
        Some(log) => log,
        None => match store.create_daily_log(user_id, today, mood) {
            Ok(log) => log,
            // Lost the creation race to a concurrent request; the winner's
            // log is the one to use.
            Err(EngineError::Conflict) => store
                .daily_log(user_id, today)?
                .ok_or_else(|| EngineError::Storage("daily log missing after conflict".into()))?,
            Err(e) => return Err(e),
        },
    };

    let version = ActionVersion::from_mood(mood);
    match store.insert_completion(&log.id, &action.id, version) {
        Ok(completed) => {
            debug!(
                "recorded completion: user={user_id} action={action_id} version={}",
                completed.version_completed.as_str()
            );
            Ok(RecordOutcome::Recorded {
                version: completed.version_completed,
            })
        }
        Err(EngineError::Conflict) => {
            let existing = store
                .completion_for(&log.id, &action.id)?
                .ok_or_else(|| EngineError::Storage("completion missing after conflict".into()))?;
            Ok(RecordOutcome::AlreadyRecorded {
                version: existing.version_completed,
            })
        }
        Err(e) => Err(e),
    }
}
