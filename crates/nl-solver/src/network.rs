//! The network harness: owns nodes and links and runs major steps.
//!
//! One major step:
//! 1. every link contributes from the previous potentials (`step`);
//! 2. minor steps: re-factor if any admittance changed, solve, then poll
//!    every link's vote. Any reject re-runs every link's contribution
//!    before the next minor step; all confirms end the loop;
//! 3. every link finalizes its flows into the node accumulators.
//!
//! Running out of minor steps is not an error: flows are finalized from the
//! last solution and the report says the step did not converge.

use nl_core::{LinkId, Real, nearly_equal};
use nl_links::Link;
use nl_network::{ConvergenceVote, NodeList, StepContext, tally};
use tracing::{debug, warn};

use crate::assembly::{SystemMatrix, held_nodes};
use crate::config::SolverConfig;
use crate::error::{SolverError, SolverResult};
use crate::report::StepReport;

#[derive(Debug)]
pub struct Network {
    nodes: NodeList,
    links: Vec<Box<dyn Link>>,
    config: SolverConfig,
    system: SystemMatrix,
    decompositions: usize,
}

impl Network {
    pub fn new(nodes: NodeList, config: SolverConfig) -> Self {
        let system = SystemMatrix::new(nodes.num_nodes());
        Self {
            nodes,
            links: Vec::new(),
            config,
            system,
            decompositions: 0,
        }
    }

    /// Register an initialized link bound to this network's nodes.
    pub fn add_link(&mut self, link: Box<dyn Link>) -> SolverResult<LinkId> {
        let core = link.core();
        core.ensure_initialized()?;
        if core.ground() != self.nodes.ground() {
            return Err(SolverError::Setup {
                what: format!("link '{}' is bound to a different node list", core.name()),
            });
        }
        if self.find_link(core.name()).is_some() {
            return Err(SolverError::Setup {
                what: format!("duplicate link name '{}'", core.name()),
            });
        }
        let id = LinkId::from_index(self.links.len() as u32);
        self.links.push(link);
        self.system.invalidate();
        Ok(id)
    }

    pub fn link(&self, id: LinkId) -> Option<&dyn Link> {
        self.links.get(id.index() as usize).map(|l| l.as_ref())
    }

    pub fn link_mut(&mut self, id: LinkId) -> Option<&mut Box<dyn Link>> {
        self.links.get_mut(id.index() as usize)
    }

    pub fn find_link(&self, name: &str) -> Option<LinkId> {
        self.links
            .iter()
            .position(|l| l.name() == name)
            .map(|i| LinkId::from_index(i as u32))
    }

    pub fn links(&self) -> impl Iterator<Item = (LinkId, &dyn Link)> {
        self.links
            .iter()
            .enumerate()
            .map(|(i, l)| (LinkId::from_index(i as u32), l.as_ref()))
    }

    pub fn nodes(&self) -> &NodeList {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut NodeList {
        &mut self.nodes
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Total decompositions since the network was built.
    pub fn decompositions(&self) -> usize {
        self.decompositions
    }

    /// Run one major step of length `dt`.
    pub fn step(&mut self, dt: Real) -> SolverResult<StepReport> {
        let mut report = StepReport::default();

        for link in &mut self.links {
            link.step(&self.nodes, dt)?;
        }
        let mut dirty = self.take_admittance_updates();

        let mut converged_step = 0;
        let mut last_vote = ConvergenceVote::Delay;
        for minor in 1..=self.config.max_minor_steps {
            let ctx = StepContext::new(converged_step, minor);
            if minor > 1 {
                if last_vote == ConvergenceVote::Reject {
                    self.refresh_all(dt)?;
                } else {
                    for link in &mut self.links {
                        link.minor_step(&self.nodes, dt, ctx)?;
                    }
                }
                dirty |= self.take_admittance_updates();
            }

            let potentials = match self.solve_minor(dirty, &mut report) {
                Ok(potentials) => potentials,
                Err(err) => {
                    for link in &mut self.links {
                        link.reset_last_minor_step(ctx);
                    }
                    return Err(err);
                }
            };
            dirty = false;

            let settled = self.settled(&potentials);
            let change = self.apply_potentials(&potentials);
            report.minor_steps = minor;
            report.max_potential_change = change;
            converged_step = if settled { converged_step + 1 } else { 0 };

            let ctx = StepContext::new(converged_step, minor);
            let nodes = &self.nodes;
            let votes: Vec<ConvergenceVote> = self
                .links
                .iter_mut()
                .map(|link| link.confirm(nodes, ctx))
                .collect();
            last_vote = tally(votes);
            dirty |= self.take_admittance_updates();
            debug!(minor, converged_step, change, vote = ?last_vote, "minor step");

            match last_vote {
                ConvergenceVote::Confirm => {
                    report.converged = true;
                    break;
                }
                ConvergenceVote::Reject => {
                    report.rejects += 1;
                    converged_step = 0;
                }
                ConvergenceVote::Delay => {}
            }
        }

        if !report.converged {
            warn!(
                minor_steps = report.minor_steps,
                change = report.max_potential_change,
                "network did not converge, finalizing last solution"
            );
        }

        self.nodes.reset_flows();
        for link in &mut self.links {
            link.compute_flows(&mut self.nodes, dt)?;
        }
        self.nodes.integrate_flows();
        Ok(report)
    }

    /// Collect and clear every link's admittance flag.
    fn take_admittance_updates(&mut self) -> bool {
        let mut any = false;
        for link in &mut self.links {
            any |= link.core().admittance_update();
            link.core_mut().clear_admittance_update();
        }
        any
    }

    /// Re-run every link's contribution at the present potentials.
    fn refresh_all(&mut self, dt: Real) -> SolverResult<()> {
        for link in &mut self.links {
            link.core_mut().begin_contribution();
            link.contribute(&self.nodes, dt)?;
        }
        Ok(())
    }

    fn solve_minor(&mut self, dirty: bool, report: &mut StepReport) -> SolverResult<Vec<Real>> {
        if self.system.dim() == 0 {
            return Ok(Vec::new());
        }
        let held = held_nodes(&self.links, self.system.dim());
        if dirty || self.system.needs_decomposition(&held) {
            self.system
                .decompose(&self.links, held, self.config.leak_conductance)?;
            self.decompositions += 1;
            report.decompositions += 1;
            debug!(dim = self.system.dim(), "admittance matrix decomposed");
        }
        self.system.solve(&self.links, &self.nodes)
    }

    /// Write new potentials; returns the largest change.
    fn apply_potentials(&mut self, potentials: &[Real]) -> Real {
        let change = self
            .nodes
            .potentials()
            .iter()
            .zip(potentials)
            .map(|(old, new)| (new - old).abs())
            .fold(0.0, Real::max);
        self.nodes.set_potentials(potentials);
        change
    }

    /// True if every potential matches its previous value within tolerance.
    fn settled(&self, potentials: &[Real]) -> bool {
        let previous = self.nodes.potentials();
        previous.len() == potentials.len()
            && previous
                .iter()
                .zip(potentials)
                .all(|(&a, &b)| nearly_equal(a, b, self.config.tolerances))
    }
}
