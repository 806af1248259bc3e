//! Rate-limited valve with square-root flow.
//!
//! Flow follows `q = k * position * sign(dp) * sqrt(|dp|)`, linearized each
//! minor step as a secant conductance through the origin:
//! `g = k * position / sqrt(max(|dp|, dp_min))`. The position moves toward
//! its command at a bounded rate once per major step.

use nl_core::{Real, signed_sqrt};
use nl_network::{ConvergenceVote, NodeList, StepContext};
use tracing::debug;

use crate::common::{check_positive, check_range, limit_conductance};
use crate::error::{LinkError, LinkResult};
use crate::link::{LinkCore, LinkInput};
use crate::traits::Link;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct ValveConfig {
    pub name: String,
    /// Flow coefficient `k` at full open
    pub flow_coefficient: Real,
    /// Maximum position change per unit time
    pub rate_limit: Real,
    /// Smallest |dp| used for linearization
    pub min_linearization_drop: Real,
    /// Relative drift in |dp| that forces re-linearization
    pub linearization_tolerance: Real,
    /// Re-linearization rejects allowed per major step
    pub max_rejects: usize,
}

impl Default for ValveConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            flow_coefficient: 1.0,
            rate_limit: 1.0,
            min_linearization_drop: 1.0e-6,
            linearization_tolerance: 0.01,
            max_rejects: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct ValveInput {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub link: LinkInput,
    /// Initial position, 0 (closed) to 1 (open)
    pub position: Real,
    /// Commanded position
    pub command: Real,
    /// Valve stuck at its current position
    pub malf_stuck: bool,
}

#[derive(Debug, Clone)]
pub struct Valve {
    core: LinkCore,
    config: ValveConfig,
    position: Real,
    command: Real,
    malf_stuck: bool,
    linearized_drop: Real,
    conductance: Real,
    rejects: usize,
}

impl Valve {
    pub const NUM_PORTS: usize = 2;

    pub fn new(
        config: &ValveConfig,
        input: &ValveInput,
        nodes: &NodeList,
        ports: &[usize],
    ) -> LinkResult<Self> {
        let mut link = Self {
            core: LinkCore::new(Self::NUM_PORTS),
            config: config.clone(),
            position: 0.0,
            command: 0.0,
            malf_stuck: false,
            linearized_drop: 0.0,
            conductance: 0.0,
            rejects: 0,
        };
        link.initialize(config, input, nodes, ports)?;
        Ok(link)
    }

    pub fn initialize(
        &mut self,
        config: &ValveConfig,
        input: &ValveInput,
        nodes: &NodeList,
        ports: &[usize],
    ) -> LinkResult<()> {
        self.core.invalidate();
        let name = &config.name;
        check_range(name, config.flow_coefficient, 0.0, Real::MAX, "flow coefficient")?;
        check_positive(name, config.rate_limit, "rate limit")?;
        check_positive(name, config.min_linearization_drop, "minimum linearization drop")?;
        check_positive(name, config.linearization_tolerance, "linearization tolerance")?;
        check_range(name, input.position, 0.0, 1.0, "position")?;
        check_range(name, input.command, 0.0, 1.0, "command")?;
        if config.max_rejects == 0 {
            return Err(LinkError::init(name, "reject budget must be at least 1"));
        }

        self.core
            .initialize(name, &input.link, nodes, ports, |_, _, _| Ok(()))?;
        self.config = config.clone();
        self.position = input.position;
        self.command = input.command;
        self.malf_stuck = input.malf_stuck;
        self.linearized_drop = 0.0;
        self.conductance = 0.0;
        self.rejects = 0;
        Ok(())
    }

    pub fn position(&self) -> Real {
        self.position
    }

    /// Set the commanded position (clamped to 0..1).
    pub fn set_command(&mut self, command: Real) {
        if command.is_finite() {
            self.command = command.clamp(0.0, 1.0);
        }
    }

    pub fn set_malf_stuck(&mut self, flag: bool) {
        self.malf_stuck = flag;
    }

    /// Flow at a given potential drop, from the nonlinear law.
    pub fn flow_at(&self, drop: Real) -> Real {
        self.config.flow_coefficient
            * self.position
            * self.core.blockage_factor()
            * signed_sqrt(drop)
    }

    fn linearize(&mut self, drop: Real) {
        let magnitude = drop.abs().max(self.config.min_linearization_drop);
        self.linearized_drop = drop;
        self.conductance = limit_conductance(
            self.config.flow_coefficient * self.position * self.core.blockage_factor()
                / magnitude.sqrt(),
        );
        self.core.set_two_port_conductance(self.conductance);
    }

    fn drift(&self, drop: Real) -> Real {
        let floor = self.config.min_linearization_drop;
        let lin = self.linearized_drop.abs().max(floor);
        (drop.abs().max(floor) - lin).abs() / lin
    }
}

impl Link for Valve {
    fn core(&self) -> &LinkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LinkCore {
        &mut self.core
    }

    fn is_non_linear(&self) -> bool {
        true
    }

    fn update_state(&mut self, _nodes: &NodeList, dt: Real) -> LinkResult<()> {
        self.rejects = 0;
        if self.malf_stuck || !dt.is_finite() || dt <= 0.0 {
            return Ok(());
        }
        let max_move = self.config.rate_limit * dt;
        let delta = (self.command - self.position).clamp(-max_move, max_move);
        self.position = (self.position + delta).clamp(0.0, 1.0);
        Ok(())
    }

    fn contribute(&mut self, nodes: &NodeList, _dt: Real) -> LinkResult<()> {
        let drop = self.core.two_port_drop(nodes);
        self.linearize(drop);
        Ok(())
    }

    fn confirm_solution(&mut self, nodes: &NodeList, _ctx: StepContext) -> ConvergenceVote {
        if self.conductance == 0.0 {
            return ConvergenceVote::Confirm;
        }
        let drop = self.core.two_port_drop(nodes);
        let drift = self.drift(drop);
        if drift > self.config.linearization_tolerance && self.rejects < self.config.max_rejects {
            self.rejects += 1;
            debug!(link = self.core.name(), drift, rejects = self.rejects, "valve re-linearized");
            self.linearize(drop);
            ConvergenceVote::Reject
        } else {
            ConvergenceVote::Confirm
        }
    }

    fn compute_flows(&mut self, nodes: &mut NodeList, _dt: Real) -> LinkResult<()> {
        self.core.ensure_initialized()?;
        let drop = self.core.two_port_drop(nodes);
        let flux = self.conductance * drop;
        self.core.record_flows(drop, flux, flux * drop);
        self.core.transport_two_port_flux(nodes, flux);
        Ok(())
    }
}
