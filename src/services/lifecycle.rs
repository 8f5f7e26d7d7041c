//! Booking status state machine.
//!
//! ```text
//! Pending   -> Confirmed | Completed | Cancelled
//! Confirmed -> Completed | Cancelled
//! ```
//!
//! Completed and Cancelled are terminal. Backward moves are only possible
//! through the separate admin override in [`crate::services::bookings`].

use serde::Deserialize;

use crate::entities::booking::BookingStatus;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Confirm,
    Complete,
    Cancel,
}

/// What a transition request resolves to for a given current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Write the target status
    Apply,
    /// Already in the target status and the transition is idempotent
    Unchanged,
}

impl Transition {
    pub fn target(self) -> BookingStatus {
        match self {
            Transition::Confirm => BookingStatus::Confirmed,
            Transition::Complete => BookingStatus::Completed,
            Transition::Cancel => BookingStatus::Cancelled,
        }
    }

    /// Source statuses from which the transition may be applied.
    pub fn sources(self) -> &'static [BookingStatus] {
        match self {
            Transition::Confirm => &[BookingStatus::Pending],
            // Walk-up trips may skip explicit confirmation
            Transition::Complete => &[BookingStatus::Pending, BookingStatus::Confirmed],
            Transition::Cancel => &[BookingStatus::Pending, BookingStatus::Confirmed],
        }
    }

    pub fn is_idempotent(self) -> bool {
        matches!(self, Transition::Cancel)
    }

    pub fn resolve(self, current: BookingStatus) -> AppResult<Outcome> {
        if self.sources().contains(&current) {
            Ok(Outcome::Apply)
        } else if self.is_idempotent() && current == self.target() {
            Ok(Outcome::Unchanged)
        } else {
            Err(AppError::InvalidTransition {
                from: current,
                to: self.target(),
            })
        }
    }
}

pub fn is_terminal(status: BookingStatus) -> bool {
    matches!(status, BookingStatus::Completed | BookingStatus::Cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [BookingStatus; 4] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    #[test]
    fn confirm_only_from_pending() {
        assert_eq!(Transition::Confirm.resolve(BookingStatus::Pending).unwrap(), Outcome::Apply);
        for status in [BookingStatus::Confirmed, BookingStatus::Completed, BookingStatus::Cancelled] {
            assert!(matches!(
                Transition::Confirm.resolve(status),
                Err(AppError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn complete_from_pending_or_confirmed() {
        assert_eq!(Transition::Complete.resolve(BookingStatus::Pending).unwrap(), Outcome::Apply);
        assert_eq!(Transition::Complete.resolve(BookingStatus::Confirmed).unwrap(), Outcome::Apply);
        assert!(Transition::Complete.resolve(BookingStatus::Completed).is_err());
        assert!(Transition::Complete.resolve(BookingStatus::Cancelled).is_err());
    }

    #[test]
    fn cancel_is_idempotent_but_not_after_completion() {
        assert_eq!(Transition::Cancel.resolve(BookingStatus::Cancelled).unwrap(), Outcome::Unchanged);
        match Transition::Cancel.resolve(BookingStatus::Completed) {
            Err(AppError::InvalidTransition { from, to }) => {
                assert_eq!(from, BookingStatus::Completed);
                assert_eq!(to, BookingStatus::Cancelled);
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
    }

    #[test]
    fn nothing_leaves_a_terminal_state() {
        for transition in [Transition::Confirm, Transition::Complete, Transition::Cancel] {
            for status in ALL.into_iter().filter(|s| is_terminal(*s)) {
                assert_ne!(transition.resolve(status).ok(), Some(Outcome::Apply));
            }
        }
    }

    #[test]
    fn sources_are_always_active_states() {
        for transition in [Transition::Confirm, Transition::Complete, Transition::Cancel] {
            assert!(transition.sources().iter().all(|s| s.is_active()));
        }
    }
}
