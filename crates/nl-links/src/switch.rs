//! Commanded switch with over- and under-current trips.
//!
//! The switch is a two-port resistance when closed and open otherwise.
//! Current is measured from port 0 to port 1. A trip opens the switch
//! mid-step through the convergence vote; it stays open until a close
//! command or [`Switch::reset_trips`] re-arms it.

use nl_core::Real;
use nl_network::{ConvergenceVote, NodeList, StepContext};
use tracing::info;

use crate::common::{check_finite, check_positive, limit_conductance};
use crate::convergence::{TripComparison, TripLogic};
use crate::error::{LinkError, LinkResult};
use crate::link::{LinkCore, LinkInput};
use crate::traits::Link;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct SwitchConfig {
    pub name: String,
    /// Resistance when closed
    pub closed_resistance: Real,
    /// Conductance when open, normally zero
    pub open_conductance: Real,
    /// Trip when current exceeds this (positive)
    pub positive_trip_limit: Option<Real>,
    /// Trip when current falls below this (negative)
    pub negative_trip_limit: Option<Real>,
    /// Minimum converged minor steps before a trip may act
    pub trip_priority: usize,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            closed_resistance: 1.0e-3,
            open_conductance: 0.0,
            positive_trip_limit: None,
            negative_trip_limit: None,
            trip_priority: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct SwitchInput {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub link: LinkInput,
    /// Commanded position
    pub closed: bool,
    /// Switch stuck closed, ignoring commands and trips
    pub malf_fail_closed: bool,
    /// Switch stuck open
    pub malf_fail_open: bool,
}

#[derive(Debug, Clone)]
pub struct Switch {
    core: LinkCore,
    closed_conductance: Real,
    open_conductance: Real,
    commanded_closed: bool,
    positive_trip: Option<TripLogic>,
    negative_trip: Option<TripLogic>,
    malf_fail_closed: bool,
    malf_fail_open: bool,
    conductance: Real,
}

impl Switch {
    pub const NUM_PORTS: usize = 2;

    pub fn new(
        config: &SwitchConfig,
        input: &SwitchInput,
        nodes: &NodeList,
        ports: &[usize],
    ) -> LinkResult<Self> {
        let mut link = Self {
            core: LinkCore::new(Self::NUM_PORTS),
            closed_conductance: 0.0,
            open_conductance: 0.0,
            commanded_closed: false,
            positive_trip: None,
            negative_trip: None,
            malf_fail_closed: false,
            malf_fail_open: false,
            conductance: 0.0,
        };
        link.initialize(config, input, nodes, ports)?;
        Ok(link)
    }

    pub fn initialize(
        &mut self,
        config: &SwitchConfig,
        input: &SwitchInput,
        nodes: &NodeList,
        ports: &[usize],
    ) -> LinkResult<()> {
        self.core.invalidate();
        let name = &config.name;
        check_positive(name, config.closed_resistance, "closed resistance")?;
        check_finite(name, config.open_conductance, "open conductance")?;
        if config.open_conductance < 0.0 {
            return Err(LinkError::init(name, "open conductance must not be negative"));
        }
        if 1.0 / config.closed_resistance <= config.open_conductance {
            return Err(LinkError::init(
                name,
                "closed conductance must exceed open conductance",
            ));
        }
        if let Some(limit) = config.positive_trip_limit {
            check_positive(name, limit, "positive trip limit")?;
        }
        if let Some(limit) = config.negative_trip_limit {
            check_finite(name, limit, "negative trip limit")?;
            if limit >= 0.0 {
                return Err(LinkError::init(name, "negative trip limit must be negative"));
            }
        }
        if config.trip_priority == 0 {
            return Err(LinkError::init(name, "trip priority must be at least 1"));
        }
        if input.malf_fail_closed && input.malf_fail_open {
            return Err(LinkError::init(name, "switch cannot fail both open and closed"));
        }

        self.core
            .initialize(name, &input.link, nodes, ports, |_, _, _| Ok(()))?;
        self.closed_conductance = 1.0 / config.closed_resistance;
        self.open_conductance = config.open_conductance;
        self.commanded_closed = input.closed;
        self.positive_trip = config.positive_trip_limit.map(|limit| {
            TripLogic::new(TripComparison::GreaterThan, limit, config.trip_priority)
        });
        self.negative_trip = config.negative_trip_limit.map(|limit| {
            TripLogic::new(TripComparison::LessThan, limit, config.trip_priority)
        });
        self.malf_fail_closed = input.malf_fail_closed;
        self.malf_fail_open = input.malf_fail_open;
        self.conductance = 0.0;
        Ok(())
    }

    /// Command the switch. Closing an open switch re-arms its trips.
    pub fn command(&mut self, closed: bool) {
        if closed && !self.commanded_closed {
            self.reset_trips();
        }
        self.commanded_closed = closed;
    }

    pub fn reset_trips(&mut self) {
        self.trips_mut().for_each(TripLogic::reset);
    }

    pub fn set_malf_fail_closed(&mut self, flag: bool) {
        self.malf_fail_closed = flag;
    }

    pub fn set_malf_fail_open(&mut self, flag: bool) {
        self.malf_fail_open = flag;
    }

    pub fn is_tripped(&self) -> bool {
        self.trips().any(TripLogic::is_tripped)
    }

    /// Actual position after commands, trips, and malfunctions.
    pub fn is_closed(&self) -> bool {
        if self.malf_fail_closed {
            true
        } else if self.malf_fail_open {
            false
        } else {
            self.commanded_closed && !self.is_tripped()
        }
    }

    /// Current from port 0 to port 1 at the given potentials.
    pub fn current(&self, nodes: &NodeList) -> Real {
        self.conductance * self.core.two_port_drop(nodes)
    }

    fn trips(&self) -> impl Iterator<Item = &TripLogic> {
        self.positive_trip.iter().chain(self.negative_trip.iter())
    }

    fn trips_mut(&mut self) -> impl Iterator<Item = &mut TripLogic> {
        self.positive_trip
            .iter_mut()
            .chain(self.negative_trip.iter_mut())
    }

    fn build_conductance(&mut self) {
        let g = if self.is_closed() {
            self.closed_conductance
        } else {
            self.open_conductance
        };
        self.conductance = limit_conductance(g * self.core.blockage_factor());
        self.core.set_two_port_conductance(self.conductance);
    }
}

impl Link for Switch {
    fn core(&self) -> &LinkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LinkCore {
        &mut self.core
    }

    fn is_non_linear(&self) -> bool {
        true
    }

    fn contribute(&mut self, _nodes: &NodeList, _dt: Real) -> LinkResult<()> {
        self.build_conductance();
        Ok(())
    }

    fn confirm_solution(&mut self, nodes: &NodeList, ctx: StepContext) -> ConvergenceVote {
        if self.malf_fail_closed || !self.is_closed() {
            return ConvergenceVote::Confirm;
        }
        let current = self.current(nodes);
        let vote = self
            .trips_mut()
            .map(|trip| trip.check_for_trip(current, ctx.converged_step))
            .fold(ConvergenceVote::Confirm, ConvergenceVote::combine);
        if vote == ConvergenceVote::Reject {
            info!(link = self.core.name(), current, "switch tripped open");
            self.build_conductance();
        }
        vote
    }

    fn reset_last_minor_step(&mut self, _ctx: StepContext) -> bool {
        self.trips_mut().for_each(TripLogic::rollback);
        self.build_conductance();
        true
    }

    fn compute_flows(&mut self, nodes: &mut NodeList, _dt: Real) -> LinkResult<()> {
        self.core.ensure_initialized()?;
        self.trips_mut().for_each(TripLogic::commit);
        let drop = self.core.two_port_drop(nodes);
        let flux = self.conductance * drop;
        self.core.record_flows(drop, flux, flux * drop);
        self.core.transport_two_port_flux(nodes, flux);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SwitchConfig {
        SwitchConfig {
            name: "sw".into(),
            closed_resistance: 0.1,
            positive_trip_limit: Some(50.0),
            negative_trip_limit: Some(-50.0),
            trip_priority: 2,
            ..Default::default()
        }
    }

    fn closed() -> SwitchInput {
        SwitchInput {
            closed: true,
            ..Default::default()
        }
    }

    #[test]
    fn switch_closed_and_open() {
        let nodes = NodeList::new(["a", "b"]);
        let mut sw = Switch::new(&config(), &closed(), &nodes, &[0, 1]).unwrap();
        sw.step(&nodes, 0.1).unwrap();
        assert_eq!(sw.core().admittance()[0], 10.0);

        sw.command(false);
        sw.step(&nodes, 0.1).unwrap();
        assert_eq!(sw.core().admittance()[0], 0.0);
        assert!(sw.core().admittance_update());
    }

    #[test]
    fn switch_trips_on_overcurrent() {
        let mut nodes = NodeList::new(["a", "b"]);
        let mut sw = Switch::new(&config(), &closed(), &nodes, &[0, 1]).unwrap();
        sw.step(&nodes, 0.1).unwrap();
        nodes.set_potentials(&[10.0, 0.0]); // 100 A

        assert_eq!(sw.confirm(&nodes, StepContext::new(0, 1)), ConvergenceVote::Delay);
        assert_eq!(sw.confirm(&nodes, StepContext::new(1, 2)), ConvergenceVote::Delay);
        assert_eq!(sw.confirm(&nodes, StepContext::new(2, 3)), ConvergenceVote::Reject);
        assert!(sw.is_tripped());
        assert!(!sw.is_closed());
        // Admittance was rebuilt as part of the rejection.
        assert_eq!(sw.core().admittance()[0], 0.0);

        assert_eq!(sw.confirm(&nodes, StepContext::new(1, 4)), ConvergenceVote::Confirm);
        sw.compute_flows(&mut nodes, 0.1).unwrap();
        assert_eq!(sw.core().flux(), 0.0);

        // Stays open next step until re-armed by a close command.
        sw.step(&nodes, 0.1).unwrap();
        assert!(!sw.is_closed());
        sw.command(false);
        sw.command(true);
        assert!(sw.is_closed());
    }

    #[test]
    fn switch_negative_trip() {
        let mut nodes = NodeList::new(["a", "b"]);
        let mut sw = Switch::new(&config(), &closed(), &nodes, &[0, 1]).unwrap();
        sw.step(&nodes, 0.1).unwrap();
        nodes.set_potentials(&[0.0, 10.0]);
        assert_eq!(sw.confirm(&nodes, StepContext::new(2, 3)), ConvergenceVote::Reject);
    }

    #[test]
    fn switch_rollback_restores_closed() {
        let mut nodes = NodeList::new(["a", "b"]);
        let mut sw = Switch::new(&config(), &closed(), &nodes, &[0, 1]).unwrap();
        sw.step(&nodes, 0.1).unwrap();
        nodes.set_potentials(&[10.0, 0.0]);
        sw.confirm(&nodes, StepContext::new(2, 3));
        assert!(sw.reset_last_minor_step(StepContext::new(2, 3)));
        assert!(sw.is_closed());
        assert_eq!(sw.core().admittance()[0], 10.0);
    }

    #[test]
    fn switch_fail_closed_ignores_trip() {
        let mut nodes = NodeList::new(["a", "b"]);
        let mut sw = Switch::new(&config(), &closed(), &nodes, &[0, 1]).unwrap();
        sw.set_malf_fail_closed(true);
        sw.command(false);
        sw.step(&nodes, 0.1).unwrap();
        nodes.set_potentials(&[10.0, 0.0]);
        assert_eq!(sw.confirm(&nodes, StepContext::new(3, 3)), ConvergenceVote::Confirm);
        assert!(sw.is_closed());
    }

    #[test]
    fn switch_config_validation() {
        let nodes = NodeList::new(["a", "b"]);
        let bad = SwitchConfig {
            negative_trip_limit: Some(5.0),
            ..config()
        };
        assert!(Switch::new(&bad, &closed(), &nodes, &[0, 1]).is_err());
        let bad = SwitchConfig {
            closed_resistance: 0.0,
            ..config()
        };
        assert!(Switch::new(&bad, &closed(), &nodes, &[0, 1]).is_err());
    }
}
