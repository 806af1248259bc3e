//! Solver configuration.

use nl_core::{Real, Tolerances};

/// Configuration for the network harness.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct SolverConfig {
    /// Minor steps allowed per major step before giving up on convergence
    pub max_minor_steps: usize,
    /// Potential change between minor steps considered converged
    pub tolerances: Tolerances,
    /// Conductance from every node to ground, keeping floating nodes solvable
    pub leak_conductance: Real,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_minor_steps: 50,
            tolerances: Tolerances {
                abs: 1e-9,
                rel: 1e-6,
            },
            leak_conductance: 1e-12,
        }
    }
}
