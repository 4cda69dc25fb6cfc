//! Per-(identity, class, civil day) check-in/check-out state machine.
//!
//! ```text
//! NoSession --enter--> Entered --exit--> Exited
//! ```
//!
//! `Exited` is terminal for the day: one entry/exit pair per identity,
//! class and civil day.

use crate::types::{AttendanceSession, ScanAction, SessionStatus};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    #[error("already checked in to this class today, check out first")]
    DuplicateEntry,
    #[error("no check-in found for this class today, check in first")]
    NoOpenEntry,
}

/// State of one (identity, class, civil day) key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    Entered { session_id: i64 },
    Exited,
}

impl SessionState {
    /// Derive the state from the sessions recorded for one key.
    ///
    /// If several sessions are open, the most recently created one is the
    /// open session.
    pub fn from_sessions(sessions: &[AttendanceSession]) -> Self {
        let open = sessions
            .iter()
            .filter(|s| s.status == SessionStatus::Entered)
            .max_by_key(|s| s.id);

        match open {
            Some(s) => SessionState::Entered { session_id: s.id },
            None if sessions.is_empty() => SessionState::NoSession,
            None => SessionState::Exited,
        }
    }
}

/// Persisted change implied by a legal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Create a new session in status `Entered`.
    Open,
    /// Stamp the exit time on the open session.
    Close { session_id: i64 },
}

/// Decide whether `action` is legal in `state`.
pub fn plan(state: SessionState, action: ScanAction) -> Result<Transition, TransitionError> {
    match (state, action) {
        (SessionState::NoSession, ScanAction::Enter) => Ok(Transition::Open),
        (SessionState::Entered { .. }, ScanAction::Enter) => Err(TransitionError::DuplicateEntry),
        (SessionState::Exited, ScanAction::Enter) => Err(TransitionError::DuplicateEntry),
        (SessionState::Entered { session_id }, ScanAction::Exit) => {
            Ok(Transition::Close { session_id })
        }
        (SessionState::NoSession | SessionState::Exited, ScanAction::Exit) => {
            Err(TransitionError::NoOpenEntry)
        }
    }
}
