//! The contract between links and the network solver.

use nl_core::Real;
use nl_network::{ConvergenceVote, NodeList, StepContext};
use tracing::{debug, warn};

use crate::error::{LinkResult, PortRuleError};
use crate::link::LinkCore;
use crate::topology::{PortTarget, UserPortCommand};

/// A network element that contributes admittance and source terms.
///
/// Implementors embed a [`LinkCore`] and supply the physics: `contribute`
/// fills the admittance matrix and source vector, `compute_flows` pushes the
/// converged flux into the nodes. The provided methods handle port
/// management, user commands, and the first-trial rule of the convergence
/// protocol, and are not meant to be overridden.
///
/// Per major step the solver calls [`Link::step`] once, then for each
/// minor step [`Link::minor_step`] and [`Link::confirm`], and once every
/// link confirms, [`Link::compute_flows`].
pub trait Link: std::fmt::Debug {
    fn core(&self) -> &LinkCore;

    fn core_mut(&mut self) -> &mut LinkCore;

    fn name(&self) -> &str {
        self.core().name()
    }

    /// True if the contribution depends on the trial potentials, so the
    /// link must be re-linearized every minor step.
    fn is_non_linear(&self) -> bool {
        false
    }

    /// Update link state that moves once per major step (positions,
    /// environment, plugs). Called before `contribute`.
    fn update_state(&mut self, _nodes: &NodeList, _dt: Real) -> LinkResult<()> {
        Ok(())
    }

    /// Fill the admittance matrix and source vector from the current state
    /// and the potentials in `nodes`.
    fn contribute(&mut self, nodes: &NodeList, dt: Real) -> LinkResult<()>;

    /// Finalize the step: compute drop, flux, and power, push flux into
    /// the node accumulators, and commit speculative state.
    fn compute_flows(&mut self, nodes: &mut NodeList, dt: Real) -> LinkResult<()>;

    /// Link-specific vote once the potentials have converged at least once.
    fn confirm_solution(&mut self, _nodes: &NodeList, _ctx: StepContext) -> ConvergenceVote {
        ConvergenceVote::Confirm
    }

    /// Roll back speculative state from an abandoned minor step. Returns
    /// false if the link cannot undo it.
    fn reset_last_minor_step(&mut self, _ctx: StepContext) -> bool {
        true
    }

    /// Rules beyond the generic ones, checked for `(port, node, ground)`.
    fn check_specific_port_rules(
        &self,
        _port: usize,
        _node: usize,
        _ground: usize,
    ) -> Result<(), PortRuleError> {
        Ok(())
    }

    /// Major-step contribution.
    fn step(&mut self, nodes: &NodeList, dt: Real) -> LinkResult<()> {
        self.core().ensure_initialized()?;
        // Rejections are already logged by set_port.
        let _ = self.process_user_port_command();
        self.update_state(nodes, dt)?;
        self.core_mut().begin_contribution();
        self.contribute(nodes, dt)
    }

    /// Minor-step re-contribution; a no-op for linear links.
    fn minor_step(&mut self, nodes: &NodeList, dt: Real, _ctx: StepContext) -> LinkResult<()> {
        self.core().ensure_initialized()?;
        if !self.is_non_linear() {
            return Ok(());
        }
        self.core_mut().begin_contribution();
        self.contribute(nodes, dt)
    }

    /// Vote on the latest solution. Delays until the potentials have
    /// converged at least once this major step.
    fn confirm(&mut self, nodes: &NodeList, ctx: StepContext) -> ConvergenceVote {
        if ctx.is_first_trial() {
            return ConvergenceVote::Delay;
        }
        let vote = self.confirm_solution(nodes, ctx);
        if vote != ConvergenceVote::Confirm {
            debug!(link = self.name(), ?vote, step = ctx.absolute_step, "link vote");
        }
        vote
    }

    /// Move `port` to `node`. On a rule violation the mapping is unchanged.
    fn set_port(&mut self, port: usize, node: usize) -> Result<(), PortRuleError> {
        let core = self.core();
        let result = core
            .check_port_rules(port, node)
            .and_then(|()| self.check_specific_port_rules(port, node, core.ground()));
        match result {
            Ok(()) => {
                self.core_mut().apply_port(port, node);
                Ok(())
            }
            Err(err) => {
                warn!(link = self.name(), port, node, %err, "port assignment rejected");
                Err(err)
            }
        }
    }

    /// Apply a persisted port map in full. Either every entry is applied or
    /// none is.
    fn restore_port_map(&mut self, map: &[usize]) -> Result<(), PortRuleError> {
        let core = self.core();
        let result = if !core.is_initialized() {
            Err(PortRuleError::NotInitialized)
        } else if map.len() != core.num_ports() {
            Err(PortRuleError::MapLength {
                given: map.len(),
                num_ports: core.num_ports(),
            })
        } else {
            LinkCore::check_port_map(
                map,
                core.ground(),
                core.shared_nodes_allowed(),
                &|port, node, ground| self.check_specific_port_rules(port, node, ground),
            )
        };
        match result {
            Ok(()) => {
                self.core_mut().apply_port_map(map);
                Ok(())
            }
            Err(err) => {
                warn!(link = self.name(), ?map, %err, "port map restore rejected");
                Err(err)
            }
        }
    }

    /// Queue a user port command for the next major step.
    fn set_user_port_command(&mut self, command: UserPortCommand) {
        self.core_mut().set_user_command(command);
    }

    /// Execute the pending user port command, if any. The command is
    /// cleared whether or not it succeeds.
    fn process_user_port_command(&mut self) -> Option<Result<(), PortRuleError>> {
        let command = self.core_mut().take_user_command()?;
        let (Some(port), Some(target)) = (command.port, command.target) else {
            warn!(link = self.name(), ?command, "incomplete port command discarded");
            return Some(Err(PortRuleError::IncompleteCommand));
        };
        let node = match target {
            PortTarget::Node(node) => node,
            PortTarget::Ground => self.core().ground(),
            PortTarget::Default => match self.core().default_node_map().get(port) {
                Some(&node) => node,
                None => {
                    let err = PortRuleError::InvalidPort {
                        port,
                        num_ports: self.core().num_ports(),
                    };
                    warn!(link = self.name(), port, %err, "port command rejected");
                    return Some(Err(err));
                }
            },
        };
        Some(self.set_port(port, node))
    }
}
