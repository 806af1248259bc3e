//! Convergence votes and the minor-step context.

/// A link's verdict on a candidate network solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConvergenceVote {
    /// The solution is consistent with the link's contribution.
    Confirm,
    /// The link's contribution must change; the minor step has to be redone.
    Reject,
    /// Plausible, but the link needs another minor step before committing.
    Delay,
}

impl ConvergenceVote {
    /// Network-level outcome of two votes: any reject wins, then any delay.
    pub fn combine(self, other: Self) -> Self {
        match (self, other) {
            (Self::Reject, _) | (_, Self::Reject) => Self::Reject,
            (Self::Delay, _) | (_, Self::Delay) => Self::Delay,
            _ => Self::Confirm,
        }
    }
}

/// Combine many votes; an empty set confirms.
pub fn tally<I>(votes: I) -> ConvergenceVote
where
    I: IntoIterator<Item = ConvergenceVote>,
{
    votes
        .into_iter()
        .fold(ConvergenceVote::Confirm, ConvergenceVote::combine)
}

/// Where the network is within the current major step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepContext {
    /// Minor steps since the potentials last converged; 0 = not converged yet.
    pub converged_step: usize,
    /// Minor step counter within the major step, starting at 1.
    pub absolute_step: usize,
}

impl StepContext {
    pub fn new(converged_step: usize, absolute_step: usize) -> Self {
        Self {
            converged_step,
            absolute_step,
        }
    }

    /// No full trial solution exists yet for this major step.
    pub fn is_first_trial(&self) -> bool {
        self.converged_step == 0
    }
}
