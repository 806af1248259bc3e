//! A series string of identical PV cells as a two-port link.
//!
//! Port 0 is the string's return and port 1 its output; current flows out
//! of port 1. The string presents `num_cells` copies of one cell's Norton
//! equivalent in series: voltages add, current is shared.

use nl_core::Real;
use nl_network::{ConvergenceVote, NodeList, StepContext};
use tracing::debug;

use crate::common::check_range;
use crate::error::{LinkError, LinkResult, PortRuleError};
use crate::link::{LinkCore, LinkInput};
use crate::pv::cell::{PvCell, PvCellConfig, PvEnvironment, PvRegion};
use crate::traits::Link;

/// Output port; must not be ground.
const OUTPUT_PORT: usize = 1;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct PvStringConfig {
    pub name: String,
    pub cell: PvCellConfig,
    /// Cells in series
    pub num_cells: usize,
    /// Region-switch rejects allowed per major step
    pub max_region_rejects: usize,
}

impl Default for PvStringConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            cell: PvCellConfig::default(),
            num_cells: 1,
            max_region_rejects: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct PvStringInput {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub link: LinkInput,
    pub environment: PvEnvironment,
    /// String failed: no output at all
    pub malf_failed: bool,
    /// Illumination forced to this value when set
    pub malf_illumination_override: Option<Real>,
}

#[derive(Debug, Clone)]
pub struct PvString {
    core: LinkCore,
    cell: PvCell,
    num_cells: usize,
    max_region_rejects: usize,
    environment: PvEnvironment,
    malf_illumination_override: Option<Real>,
    conductance: Real,
    source: Real,
    region: PvRegion,
    rejects: usize,
}

impl PvString {
    pub const NUM_PORTS: usize = 2;

    pub fn new(
        config: &PvStringConfig,
        input: &PvStringInput,
        nodes: &NodeList,
        ports: &[usize],
    ) -> LinkResult<Self> {
        let mut link = Self {
            core: LinkCore::new(Self::NUM_PORTS),
            cell: PvCell::new(config.cell.clone()),
            num_cells: 1,
            max_region_rejects: 0,
            environment: PvEnvironment::default(),
            malf_illumination_override: None,
            conductance: 0.0,
            source: 0.0,
            region: PvRegion::CurrentSource,
            rejects: 0,
        };
        link.initialize(config, input, nodes, ports)?;
        Ok(link)
    }

    pub fn initialize(
        &mut self,
        config: &PvStringConfig,
        input: &PvStringInput,
        nodes: &NodeList,
        ports: &[usize],
    ) -> LinkResult<()> {
        self.core.invalidate();
        let name = &config.name;
        config
            .cell
            .validate()
            .map_err(|what| LinkError::init(name, what))?;
        if config.num_cells == 0 {
            return Err(LinkError::init(name, "string needs at least one cell"));
        }
        let env = &input.environment;
        check_range(name, env.illumination, 0.0, Real::MAX, "illumination")?;
        check_range(name, env.temperature, Real::MIN_POSITIVE, Real::MAX, "temperature")?;
        check_range(name, env.degradation, 0.0, 1.0, "degradation")?;
        if let Some(value) = input.malf_illumination_override {
            check_range(name, value, 0.0, Real::MAX, "illumination override")?;
        }

        self.core
            .initialize(name, &input.link, nodes, ports, Self::output_rule)?;
        self.cell = PvCell::new(config.cell.clone());
        self.cell.set_failed(input.malf_failed);
        self.num_cells = config.num_cells;
        self.max_region_rejects = config.max_region_rejects;
        self.environment = input.environment;
        self.malf_illumination_override = input.malf_illumination_override;
        self.conductance = 0.0;
        self.source = 0.0;
        self.region = PvRegion::CurrentSource;
        self.rejects = 0;
        Ok(())
    }

    fn output_rule(port: usize, node: usize, ground: usize) -> Result<(), PortRuleError> {
        if port == OUTPUT_PORT && node == ground {
            Err(PortRuleError::Specific {
                port,
                node,
                rule: "PV string output cannot be ground",
            })
        } else {
            Ok(())
        }
    }

    pub fn set_environment(&mut self, environment: PvEnvironment) {
        self.environment = environment;
    }

    pub fn set_malf_failed(&mut self, failed: bool) {
        self.cell.set_failed(failed);
    }

    pub fn set_malf_illumination_override(&mut self, value: Option<Real>) {
        self.malf_illumination_override = value.filter(|v| v.is_finite() && *v >= 0.0);
    }

    pub fn cell(&self) -> &PvCell {
        &self.cell
    }

    /// Output potential above the return.
    pub fn terminal_voltage(&self, nodes: &NodeList) -> Real {
        -self.core.two_port_drop(nodes)
    }

    /// Output current at the given potentials, from the present Norton pair.
    pub fn terminal_current(&self, nodes: &NodeList) -> Real {
        self.source - self.conductance * self.terminal_voltage(nodes)
    }

    /// String max-power point `(voltage, current)`.
    pub fn max_power_point(&self) -> (Real, Real) {
        (self.cell.vmp() * self.num_cells as Real, self.cell.imp())
    }

    fn linearize(&mut self, nodes: &NodeList) {
        let n = self.num_cells as Real;
        let v_string = self.terminal_voltage(nodes);
        let i_trial = self.terminal_current(nodes);
        self.cell.linearize(v_string / n, i_trial);
        self.region = self.cell.region(v_string / n);

        let factor = self.core.blockage_factor();
        self.conductance = self.cell.conductance() / n * factor;
        self.source = self.cell.source() * factor;
        self.core.set_two_port_conductance(self.conductance);
        self.core.set_two_port_source(self.source);
    }
}

impl Link for PvString {
    fn core(&self) -> &LinkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LinkCore {
        &mut self.core
    }

    fn is_non_linear(&self) -> bool {
        true
    }

    fn check_specific_port_rules(
        &self,
        port: usize,
        node: usize,
        ground: usize,
    ) -> Result<(), PortRuleError> {
        Self::output_rule(port, node, ground)
    }

    fn update_state(&mut self, _nodes: &NodeList, _dt: Real) -> LinkResult<()> {
        let mut env = self.environment;
        if let Some(illumination) = self.malf_illumination_override {
            env.illumination = illumination;
        }
        self.cell.update_parameters(&env);
        self.rejects = 0;
        Ok(())
    }

    fn contribute(&mut self, nodes: &NodeList, _dt: Real) -> LinkResult<()> {
        self.linearize(nodes);
        Ok(())
    }

    fn confirm_solution(&mut self, nodes: &NodeList, _ctx: StepContext) -> ConvergenceVote {
        if self.cell.is_failed() || self.cell.voc() <= 0.0 {
            return ConvergenceVote::Confirm;
        }
        let v_cell = self.terminal_voltage(nodes) / self.num_cells as Real;
        let beyond_voc = v_cell > self.cell.voc() && self.cell.voltage() < self.cell.voc();
        if beyond_voc && self.rejects < self.max_region_rejects {
            self.rejects += 1;
            debug!(link = self.core.name(), v_cell, "PV string above open circuit");
            self.linearize(nodes);
            return ConvergenceVote::Reject;
        }
        let region = self.cell.region(v_cell);
        if region != self.region && self.rejects < self.max_region_rejects {
            self.rejects += 1;
            debug!(link = self.core.name(), ?region, "PV string changed region");
            self.linearize(nodes);
            ConvergenceVote::Reject
        } else {
            ConvergenceVote::Confirm
        }
    }

    fn compute_flows(&mut self, nodes: &mut NodeList, _dt: Real) -> LinkResult<()> {
        self.core.ensure_initialized()?;
        let drop = self.core.two_port_drop(nodes);
        let flux = self.terminal_current(nodes);
        self.core.record_flows(drop, flux, flux * drop);
        self.cell.commit();
        self.core.transport_two_port_flux(nodes, flux);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(num_cells: usize) -> PvStringConfig {
        PvStringConfig {
            name: "pv".into(),
            num_cells,
            ..Default::default()
        }
    }

    #[test]
    fn string_open_circuit_clamp() {
        let mut nodes = NodeList::new(["bus"]);
        nodes.set_potentials(&[0.65 * 10.0]);
        let mut pv = PvString::new(&config(10), &Default::default(), &nodes, &[1, 0]).unwrap();
        pv.step(&nodes, 0.1).unwrap();
        assert_eq!(pv.cell().voltage(), 0.6);
        assert_eq!(pv.cell().current(), 0.0);

        // At the clamp voltage the string delivers nothing.
        let mut at_voc = NodeList::new(["bus"]);
        at_voc.set_potentials(&[6.0]);
        assert!(pv.terminal_current(&at_voc).abs() < 1e-9);
    }

    #[test]
    fn string_short_circuit_current() {
        let mut nodes = NodeList::new(["bus"]);
        let mut pv = PvString::new(&config(4), &Default::default(), &nodes, &[1, 0]).unwrap();
        pv.step(&nodes, 0.1).unwrap();
        pv.compute_flows(&mut nodes, 0.1).unwrap();
        assert!((pv.core().flux() - 3.0).abs() < 1e-9);
        assert!((nodes.node(0).unwrap().influx_rate() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn output_cannot_be_ground() {
        let nodes = NodeList::new(["bus"]);
        let err = PvString::new(&config(1), &Default::default(), &nodes, &[0, 1]).unwrap_err();
        assert!(matches!(err, LinkError::Initialization { .. }));

        let mut pv = PvString::new(&config(1), &Default::default(), &nodes, &[1, 0]).unwrap();
        assert!(matches!(
            pv.set_port(1, 1),
            Err(PortRuleError::Specific { .. })
        ));
        assert_eq!(pv.core().node_map(), &[1, 0]);
    }

    #[test]
    fn failed_string_is_dark() {
        let nodes = NodeList::new(["bus"]);
        let input = PvStringInput {
            malf_failed: true,
            ..Default::default()
        };
        let mut pv = PvString::new(&config(2), &input, &nodes, &[1, 0]).unwrap();
        pv.step(&nodes, 0.1).unwrap();
        assert_eq!(pv.core().admittance(), &[0.0; 4]);
        assert_eq!(pv.core().source(), &[0.0; 2]);
    }

    #[test]
    fn region_switch_rejects_once() {
        let mut nodes = NodeList::new(["bus"]);
        let mut pv = PvString::new(&config(1), &Default::default(), &nodes, &[1, 0]).unwrap();
        pv.step(&nodes, 0.1).unwrap();
        assert_eq!(pv.region, PvRegion::CurrentSource);

        nodes.set_potentials(&[0.59]);
        assert_eq!(pv.confirm(&nodes, StepContext::new(1, 2)), ConvergenceVote::Reject);
        assert_eq!(pv.region, PvRegion::VoltageSource);
        assert_eq!(pv.confirm(&nodes, StepContext::new(1, 3)), ConvergenceVote::Confirm);
    }

    #[test]
    fn minor_step_past_voc_lands_on_open_circuit() {
        let mut nodes = NodeList::new(["bus"]);
        nodes.set_potentials(&[0.5]);
        let mut pv = PvString::new(&config(1), &Default::default(), &nodes, &[1, 0]).unwrap();
        pv.step(&nodes, 0.1).unwrap();
        assert!(pv.cell().voltage() < 0.6);

        // The Norton pair from 0.5 V still carries current at 0.65 V.
        nodes.set_potentials(&[0.65]);
        assert!(pv.terminal_current(&nodes) > 0.0);
        pv.minor_step(&nodes, 0.1, StepContext::new(0, 2)).unwrap();
        assert_eq!((pv.cell().voltage(), pv.cell().current()), (0.6, 0.0));
    }

    #[test]
    fn solution_above_voc_rejects_and_relinearizes() {
        let mut nodes = NodeList::new(["bus"]);
        nodes.set_potentials(&[0.3]);
        let mut pv = PvString::new(&config(2), &Default::default(), &nodes, &[1, 0]).unwrap();
        pv.step(&nodes, 0.1).unwrap();

        pv.core_mut().clear_admittance_update();
        nodes.set_potentials(&[1.5]);
        assert_eq!(pv.confirm(&nodes, StepContext::new(1, 2)), ConvergenceVote::Reject);
        assert_eq!(pv.cell().voltage(), 0.6);
        assert!(pv.core().admittance_update());

        // Already linearized at open circuit: nothing left to correct.
        assert_eq!(pv.confirm(&nodes, StepContext::new(1, 3)), ConvergenceVote::Confirm);
    }

    #[test]
    fn illumination_override() {
        let nodes = NodeList::new(["bus"]);
        let mut pv = PvString::new(&config(1), &Default::default(), &nodes, &[1, 0]).unwrap();
        pv.set_malf_illumination_override(Some(0.5));
        pv.step(&nodes, 0.1).unwrap();
        assert!((pv.cell().isc() - 1.5).abs() < 1e-12);
        assert_eq!(pv.max_power_point().1, pv.cell().imp());
    }
}
