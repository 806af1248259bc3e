//! Linear two-port conductor.

use nl_core::Real;
use nl_network::NodeList;

use crate::common::{check_range, limit_conductance};
use crate::error::LinkResult;
use crate::link::{LinkCore, LinkInput};
use crate::traits::Link;

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ConductorConfig {
    pub name: String,
    /// Conductance between the ports (flux per unit potential)
    pub conductance: Real,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct ConductorInput {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub link: LinkInput,
}

/// Flux = conductance × (p0 − p1), reduced by the blockage malfunction.
#[derive(Debug, Clone)]
pub struct Conductor {
    core: LinkCore,
    conductance: Real,
    effective_conductance: Real,
}

impl Conductor {
    pub const NUM_PORTS: usize = 2;

    pub fn new(
        config: &ConductorConfig,
        input: &ConductorInput,
        nodes: &NodeList,
        ports: &[usize],
    ) -> LinkResult<Self> {
        let mut link = Self {
            core: LinkCore::new(Self::NUM_PORTS),
            conductance: 0.0,
            effective_conductance: 0.0,
        };
        link.initialize(config, input, nodes, ports)?;
        Ok(link)
    }

    pub fn initialize(
        &mut self,
        config: &ConductorConfig,
        input: &ConductorInput,
        nodes: &NodeList,
        ports: &[usize],
    ) -> LinkResult<()> {
        self.core.invalidate();
        check_range(&config.name, config.conductance, 0.0, Real::MAX, "conductance")?;
        self.core
            .initialize(&config.name, &input.link, nodes, ports, |_, _, _| Ok(()))?;
        self.conductance = config.conductance;
        self.effective_conductance = 0.0;
        Ok(())
    }

    pub fn conductance(&self) -> Real {
        self.conductance
    }

    /// Set the conductance; negative or non-finite values are ignored.
    pub fn set_conductance(&mut self, conductance: Real) {
        if conductance.is_finite() && conductance >= 0.0 {
            self.conductance = conductance;
        }
    }

    /// Conductance after blockage, as last contributed.
    pub fn effective_conductance(&self) -> Real {
        self.effective_conductance
    }
}

impl Link for Conductor {
    fn core(&self) -> &LinkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LinkCore {
        &mut self.core
    }

    fn contribute(&mut self, _nodes: &NodeList, _dt: Real) -> LinkResult<()> {
        self.effective_conductance = limit_conductance(self.conductance * self.core.blockage_factor());
        self.core.set_two_port_conductance(self.effective_conductance);
        Ok(())
    }

    fn compute_flows(&mut self, nodes: &mut NodeList, _dt: Real) -> LinkResult<()> {
        self.core.ensure_initialized()?;
        let drop = self.core.two_port_drop(nodes);
        let flux = self.effective_conductance * drop;
        self.core.record_flows(drop, flux, flux * drop);
        self.core.transport_two_port_flux(nodes, flux);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(g: Real) -> ConductorConfig {
        ConductorConfig {
            name: "r1".into(),
            conductance: g,
        }
    }

    #[test]
    fn conductor_stamp_and_flow() {
        let mut nodes = NodeList::new(["a", "b"]);
        let mut link = Conductor::new(&config(0.5), &Default::default(), &nodes, &[0, 1]).unwrap();

        link.step(&nodes, 0.1).unwrap();
        assert_eq!(link.core().admittance(), &[0.5, -0.5, -0.5, 0.5]);
        assert_eq!(link.core().source(), &[0.0, 0.0]);

        nodes.set_potentials(&[10.0, 4.0]);
        link.compute_flows(&mut nodes, 0.1).unwrap();
        assert_eq!(link.core().flux(), 3.0);
        assert_eq!(link.core().power(), 18.0);
        assert_eq!(nodes.node(0).unwrap().outflux_rate(), 3.0);
        assert_eq!(nodes.node(1).unwrap().influx_rate(), 3.0);
    }

    #[test]
    fn conductor_blockage() {
        let nodes = NodeList::new(["a"]);
        let input = ConductorInput {
            link: LinkInput {
                malf_blockage_flag: true,
                malf_blockage_value: 0.75,
            },
        };
        let mut link = Conductor::new(&config(2.0), &input, &nodes, &[0, 1]).unwrap();
        link.step(&nodes, 0.1).unwrap();
        assert_eq!(link.effective_conductance(), 0.5);
    }

    #[test]
    fn conductor_rejects_negative_conductance() {
        let nodes = NodeList::new(["a"]);
        assert!(Conductor::new(&config(-1.0), &Default::default(), &nodes, &[0, 1]).is_err());
    }

    #[test]
    fn conductor_dirty_flag_only_on_change() {
        let nodes = NodeList::new(["a", "b"]);
        let mut link = Conductor::new(&config(1.0), &Default::default(), &nodes, &[0, 1]).unwrap();
        link.step(&nodes, 0.1).unwrap();
        assert!(link.core().admittance_update());
        link.step(&nodes, 0.1).unwrap();
        assert!(!link.core().admittance_update());
        link.set_conductance(3.0);
        link.step(&nodes, 0.1).unwrap();
        assert!(link.core().admittance_update());
    }
}
