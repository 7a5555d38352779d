//! Engine error taxonomy

use thiserror::Error;

/// Errors produced by the habit engine.
///
/// `Conflict` is always recoverable: it means a uniqueness constraint blocked
/// a duplicate write, and callers treat it as "already recorded" rather than
/// a failure. `CollaboratorUnavailable` is never surfaced to users; the
/// generation gateway resolves it with a deterministic fallback.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("already recorded")]
    Conflict,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("active goal limit reached for the current plan")]
    PlanLimitExceeded,

    #[error("ritual generator unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        if is_unique_violation(&err) {
            EngineError::Conflict
        } else {
            EngineError::Storage(err.to_string())
        }
    }
}

/// Detects UNIQUE / PRIMARY KEY constraint failures. Other constraint
/// classes (foreign key, check) stay storage errors.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}
