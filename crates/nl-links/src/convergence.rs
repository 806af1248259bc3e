//! Trip logic for links that vote on the network solution.
//!
//! A trip acts at most once per crossing. The first minor step that finds
//! the monitored value past its limit, and whose `converged_step` has
//! reached the trip's priority, trips the link and votes to reject the
//! solution. Lower-priority trips delay until higher-priority ones have had
//! their chance. The tripped state stays speculative until the major step
//! finalizes.

use nl_core::Real;
use nl_network::ConvergenceVote;

/// Which side of the limit trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TripComparison {
    GreaterThan,
    LessThan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TripLogic {
    comparison: TripComparison,
    limit: Real,
    priority: usize,
    tripped: bool,
    committed: bool,
}

impl TripLogic {
    /// `priority` is the minimum `converged_step` at which the trip may act.
    pub fn new(comparison: TripComparison, limit: Real, priority: usize) -> Self {
        Self {
            comparison,
            limit,
            priority: priority.max(1),
            tripped: false,
            committed: false,
        }
    }

    pub fn exceeds(&self, value: Real) -> bool {
        match self.comparison {
            TripComparison::GreaterThan => value > self.limit,
            TripComparison::LessThan => value < self.limit,
        }
    }

    /// Check `value` against the limit and vote.
    pub fn check_for_trip(&mut self, value: Real, converged_step: usize) -> ConvergenceVote {
        if self.tripped || !self.exceeds(value) {
            ConvergenceVote::Confirm
        } else if converged_step >= self.priority {
            self.tripped = true;
            ConvergenceVote::Reject
        } else {
            ConvergenceVote::Delay
        }
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    pub fn limit(&self) -> Real {
        self.limit
    }

    pub fn priority(&self) -> usize {
        self.priority
    }

    /// Make the speculative state permanent.
    pub fn commit(&mut self) {
        self.committed = self.tripped;
    }

    /// Return to the last committed state.
    pub fn rollback(&mut self) {
        self.tripped = self.committed;
    }

    pub fn reset(&mut self) {
        self.tripped = false;
        self.committed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConvergenceVote::*;

    #[test]
    fn trip_waits_for_priority() {
        let mut trip = TripLogic::new(TripComparison::GreaterThan, 10.0, 2);
        assert_eq!(trip.check_for_trip(5.0, 1), Confirm);
        assert_eq!(trip.check_for_trip(12.0, 1), Delay);
        assert!(!trip.is_tripped());
        assert_eq!(trip.check_for_trip(12.0, 2), Reject);
        assert!(trip.is_tripped());
        assert_eq!(trip.check_for_trip(12.0, 3), Confirm);
    }

    #[test]
    fn less_than_trip() {
        let mut trip = TripLogic::new(TripComparison::LessThan, -4.0, 1);
        assert_eq!(trip.check_for_trip(-3.0, 1), Confirm);
        assert_eq!(trip.check_for_trip(-5.0, 1), Reject);
    }

    #[test]
    fn rollback_and_commit() {
        let mut trip = TripLogic::new(TripComparison::GreaterThan, 1.0, 1);
        trip.check_for_trip(2.0, 1);
        trip.rollback();
        assert!(!trip.is_tripped());

        trip.check_for_trip(2.0, 1);
        trip.commit();
        trip.rollback();
        assert!(trip.is_tripped());

        trip.reset();
        assert!(!trip.is_tripped());
        trip.rollback();
        assert!(!trip.is_tripped());
    }

    #[test]
    fn zero_priority_is_raised() {
        assert_eq!(TripLogic::new(TripComparison::GreaterThan, 1.0, 0).priority(), 1);
    }

    #[test]
    fn below_limit_never_rejects() {
        let mut trip = TripLogic::new(TripComparison::GreaterThan, 1.0, 1);
        for step in 1..20 {
            assert_eq!(trip.check_for_trip(0.5, step), Confirm);
        }
    }
}
