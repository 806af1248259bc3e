//! Jumper: a conductor whose ends can be re-plugged at run time.
//!
//! Each port may carry a [`Plug`]. Once per major step the jumper services
//! the plugs and moves its ports to their active sockets, or to ground
//! when a plug is disconnected. A disconnected plug configured as
//! self-sealing seals the jumper: it contributes nothing until
//! reconnected.

use nl_core::Real;
use nl_network::NodeList;
use tracing::info;

use crate::common::{check_range, limit_conductance};
use crate::error::LinkResult;
use crate::link::{LinkCore, LinkInput};
use crate::topology::Plug;
use crate::traits::Link;

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct JumperConfig {
    pub name: String,
    pub conductance: Real,
    /// Per port: seal the jumper while that port's plug is disconnected
    pub self_sealing: [bool; 2],
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct JumperInput {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub link: LinkInput,
}

#[derive(Debug)]
pub struct Jumper {
    core: LinkCore,
    conductance: Real,
    effective_conductance: Real,
    self_sealing: [bool; 2],
    plugs: [Option<Box<dyn Plug>>; 2],
    sealed: bool,
}

impl Jumper {
    pub const NUM_PORTS: usize = 2;

    pub fn new(
        config: &JumperConfig,
        input: &JumperInput,
        nodes: &NodeList,
        ports: &[usize],
        plugs: [Option<Box<dyn Plug>>; 2],
    ) -> LinkResult<Self> {
        let mut link = Self {
            core: LinkCore::new(Self::NUM_PORTS),
            conductance: 0.0,
            effective_conductance: 0.0,
            self_sealing: [false; 2],
            plugs,
            sealed: false,
        };
        link.initialize(config, input, nodes, ports)?;
        Ok(link)
    }

    pub fn initialize(
        &mut self,
        config: &JumperConfig,
        input: &JumperInput,
        nodes: &NodeList,
        ports: &[usize],
    ) -> LinkResult<()> {
        self.core.invalidate();
        check_range(&config.name, config.conductance, 0.0, Real::MAX, "conductance")?;
        self.core.set_shared_nodes_allowed(false);
        self.core
            .initialize(&config.name, &input.link, nodes, ports, |_, _, _| Ok(()))?;
        self.conductance = config.conductance;
        self.effective_conductance = 0.0;
        self.self_sealing = config.self_sealing;
        self.sealed = false;
        Ok(())
    }

    /// Replace the plug on `port`. Returns the previous plug.
    pub fn attach_plug(&mut self, port: usize, plug: Option<Box<dyn Plug>>) -> Option<Box<dyn Plug>> {
        let slot = self.plugs.get_mut(port)?;
        std::mem::replace(slot, plug)
    }

    pub fn plug_mut(&mut self, port: usize) -> Option<&mut Box<dyn Plug>> {
        self.plugs.get_mut(port)?.as_mut()
    }

    pub fn plug(&self, port: usize) -> Option<&dyn Plug> {
        self.plugs.get(port)?.as_deref()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn effective_conductance(&self) -> Real {
        self.effective_conductance
    }
}

impl Link for Jumper {
    fn core(&self) -> &LinkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LinkCore {
        &mut self.core
    }

    fn update_state(&mut self, _nodes: &NodeList, _dt: Real) -> LinkResult<()> {
        let mut targets: [Option<Option<usize>>; 2] = [None; 2];
        for (target, plug) in targets.iter_mut().zip(self.plugs.iter_mut()) {
            *target = plug.as_mut().map(|plug| plug.update());
        }

        let sealed = targets
            .iter()
            .zip(self.self_sealing)
            .any(|(target, sealing)| sealing && *target == Some(None));
        if sealed != self.sealed {
            info!(link = self.core.name(), sealed, "jumper seal changed");
        }
        self.sealed = sealed;
        // Both ends may share a node while sealed.
        self.core.set_shared_nodes_allowed(sealed);

        let ground = self.core.ground();
        for (port, target) in targets.into_iter().enumerate() {
            let Some(target) = target else { continue };
            let node = target.unwrap_or(ground);
            if self.core.node_map()[port] != node {
                // A rejected move is logged and the port stays put.
                let _ = self.set_port(port, node);
            }
        }
        Ok(())
    }

    fn contribute(&mut self, _nodes: &NodeList, _dt: Real) -> LinkResult<()> {
        if self.sealed {
            self.effective_conductance = 0.0;
            self.core.clear_contribution();
            return Ok(());
        }
        self.effective_conductance =
            limit_conductance(self.conductance * self.core.blockage_factor());
        self.core.set_two_port_conductance(self.effective_conductance);
        self.core.set_two_port_source(0.0);
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
