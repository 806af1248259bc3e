//! Per-step diagnostics.

use nl_core::Real;

/// Outcome of one major step.
///
/// A step that runs out of minor steps still finalizes flows from its last
/// solution; `converged` is false and a warning is logged.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StepReport {
    pub converged: bool,
    pub minor_steps: usize,
    /// Matrix decompositions performed this step
    pub decompositions: usize,
    /// Minor steps that ended in a reject vote
    pub rejects: usize,
    /// Largest potential change over the last minor step
    pub max_potential_change: Real,
}
