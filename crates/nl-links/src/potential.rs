//! Potential source: a conductance in series with a fixed potential rise.
//!
//! Drives flux from port 0 to port 1 as if port 1 sat `potential_rise`
//! above port 0 behind the source conductance. Tying port 0 to ground
//! makes it a boundary condition on the node at port 1.

use nl_core::Real;
use nl_network::NodeList;

use crate::common::{check_finite, check_positive, limit_conductance};
use crate::error::LinkResult;
use crate::link::{LinkCore, LinkInput};
use crate::traits::Link;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PotentialSourceConfig {
    pub name: String,
    /// Source conductance; larger holds the potential stiffer
    pub conductance: Real,
}

impl Default for PotentialSourceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            conductance: 1.0e6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct PotentialSourceInput {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub link: LinkInput,
    /// Potential of port 1 above port 0 at zero flux
    pub potential_rise: Real,
}

#[derive(Debug, Clone)]
pub struct PotentialSource {
    core: LinkCore,
    conductance: Real,
    effective_conductance: Real,
    potential_rise: Real,
}

impl PotentialSource {
    pub const NUM_PORTS: usize = 2;

    pub fn new(
        config: &PotentialSourceConfig,
        input: &PotentialSourceInput,
        nodes: &NodeList,
        ports: &[usize],
    ) -> LinkResult<Self> {
        let mut link = Self {
            core: LinkCore::new(Self::NUM_PORTS),
            conductance: 0.0,
            effective_conductance: 0.0,
            potential_rise: 0.0,
        };
        link.initialize(config, input, nodes, ports)?;
        Ok(link)
    }

    pub fn initialize(
        &mut self,
        config: &PotentialSourceConfig,
        input: &PotentialSourceInput,
        nodes: &NodeList,
        ports: &[usize],
    ) -> LinkResult<()> {
        self.core.invalidate();
        check_positive(&config.name, config.conductance, "source conductance")?;
        check_finite(&config.name, input.potential_rise, "potential rise")?;
        self.core
            .initialize(&config.name, &input.link, nodes, ports, |_, _, _| Ok(()))?;
        self.conductance = config.conductance;
        self.potential_rise = input.potential_rise;
        self.effective_conductance = 0.0;
        Ok(())
    }

    pub fn potential_rise(&self) -> Real {
        self.potential_rise
    }

    /// Set the potential rise; non-finite values are ignored.
    pub fn set_potential_rise(&mut self, rise: Real) {
        if rise.is_finite() {
            self.potential_rise = rise;
        }
    }
}

impl Link for PotentialSource {
    fn core(&self) -> &LinkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LinkCore {
        &mut self.core
    }

    fn contribute(&mut self, _nodes: &NodeList, _dt: Real) -> LinkResult<()> {
        let g = limit_conductance(self.conductance * self.core.blockage_factor());
        self.effective_conductance = g;
        self.core.set_two_port_conductance(g);
        self.core.set_two_port_source(g * self.potential_rise);
        Ok(())
    }

    fn compute_flows(&mut self, nodes: &mut NodeList, _dt: Real) -> LinkResult<()> {
        self.core.ensure_initialized()?;
        let drop = self.core.two_port_drop(nodes);
        let flux = self.effective_conductance * (drop + self.potential_rise);
        self.core.record_flows(drop, flux, flux * drop);
        self.core.transport_two_port_flux(nodes, flux);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_stamp() {
        let nodes = NodeList::new(["bus"]);
        let config = PotentialSourceConfig {
            name: "v1".into(),
            conductance: 100.0,
        };
        let input = PotentialSourceInput {
            potential_rise: 28.0,
            ..Default::default()
        };
        let mut link = PotentialSource::new(&config, &input, &nodes, &[1, 0]).unwrap();
        link.step(&nodes, 0.1).unwrap();
        assert_eq!(link.core().admittance(), &[100.0, -100.0, -100.0, 100.0]);
        assert_eq!(link.core().source(), &[-2800.0, 2800.0]);
    }

    #[test]
    fn source_flux_at_held_potential() {
        let mut nodes = NodeList::new(["bus"]);
        let config = PotentialSourceConfig {
            name: "v1".into(),
            conductance: 10.0,
        };
        let input = PotentialSourceInput {
            potential_rise: 5.0,
            ..Default::default()
        };
        let mut link = PotentialSource::new(&config, &input, &nodes, &[1, 0]).unwrap();
        link.step(&nodes, 0.1).unwrap();

        nodes.set_potentials(&[4.0]);
        link.compute_flows(&mut nodes, 0.1).unwrap();
        // drop = 0 - 4, flux = 10 * (-4 + 5)
        assert!((link.core().flux() - 10.0).abs() < 1e-12);
        assert_eq!(nodes.node(0).unwrap().influx_rate(), 10.0);
    }

    #[test]
    fn source_requires_positive_conductance() {
        let nodes = NodeList::new(["bus"]);
        let config = PotentialSourceConfig {
            name: "v1".into(),
            conductance: 0.0,
        };
        assert!(PotentialSource::new(&config, &Default::default(), &nodes, &[1, 0]).is_err());
    }
}
