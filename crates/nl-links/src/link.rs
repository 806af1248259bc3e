//! Shared state every link carries.
//!
//! [`LinkCore`] owns the port→node map, the dense admittance matrix and
//! source vector a link contributes, the admittance map into the global
//! system, and the `admittance_update` dirty flag the solver reads to decide
//! whether to re-decompose. Concrete links embed one and expose it through
//! [`crate::Link::core`].

use nl_core::Real;
use nl_network::{AdmittanceMap, NodeList};

use crate::common::{DEFAULT_ADMITTANCE_TOLERANCE, check_range};
use crate::error::{LinkError, LinkResult, PortRuleError};
use crate::topology::UserPortCommand;

/// Initial state and malfunctions common to all links.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct LinkInput {
    /// Blockage malfunction active
    pub malf_blockage_flag: bool,
    /// Fraction of the link's conductance blocked, in `[0, 1]`
    pub malf_blockage_value: Real,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkCore {
    name: String,
    num_ports: usize,
    ground: usize,
    node_map: Vec<usize>,
    default_node_map: Vec<usize>,
    admittance_map: AdmittanceMap,
    admittance: Vec<Real>,
    source: Vec<Real>,
    overrides: Vec<bool>,
    admittance_update: bool,
    topology_changed: bool,
    admittance_tolerance: Real,
    shared_nodes_allowed: bool,
    malf_blockage_flag: bool,
    malf_blockage_value: Real,
    potential_drop: Real,
    flux: Real,
    power: Real,
    user_command: UserPortCommand,
    initialized: bool,
}

impl LinkCore {
    /// An unbound core with room for `num_ports` ports.
    pub fn new(num_ports: usize) -> Self {
        Self {
            name: String::new(),
            num_ports,
            ground: 0,
            node_map: Vec::new(),
            default_node_map: Vec::new(),
            admittance_map: AdmittanceMap::default(),
            admittance: vec![0.0; num_ports * num_ports],
            source: vec![0.0; num_ports],
            overrides: vec![false; num_ports],
            admittance_update: false,
            topology_changed: false,
            admittance_tolerance: DEFAULT_ADMITTANCE_TOLERANCE,
            shared_nodes_allowed: false,
            malf_blockage_flag: false,
            malf_blockage_value: 0.0,
            potential_drop: 0.0,
            flux: 0.0,
            power: 0.0,
            user_command: UserPortCommand::default(),
            initialized: false,
        }
    }

    /// Validate and bind the link to `nodes` through `ports`.
    ///
    /// `rule` is the link-specific port rule, called with
    /// `(port, node, ground)`. Nothing is bound unless every check passes;
    /// on failure the core stays uninitialized.
    pub fn initialize<F>(
        &mut self,
        name: &str,
        input: &LinkInput,
        nodes: &NodeList,
        ports: &[usize],
        rule: F,
    ) -> LinkResult<()>
    where
        F: Fn(usize, usize, usize) -> Result<(), PortRuleError>,
    {
        self.initialized = false;
        self.name = name.to_string();

        if name.is_empty() {
            return Err(LinkError::init(name, "link name must not be empty"));
        }
        if self.num_ports == 0 {
            return Err(LinkError::init(name, "link must have at least one port"));
        }
        if ports.len() != self.num_ports {
            return Err(LinkError::init(
                name,
                format!(
                    "port list has {} entries, link has {} ports",
                    ports.len(),
                    self.num_ports
                ),
            ));
        }
        let ground = nodes.ground();
        Self::check_port_map(ports, ground, self.shared_nodes_allowed, &rule)
            .map_err(|e| LinkError::init(name, e.to_string()))?;
        check_range(name, input.malf_blockage_value, 0.0, 1.0, "blockage value")?;

        self.ground = ground;
        self.node_map = ports.to_vec();
        self.default_node_map = ports.to_vec();
        self.admittance_map = AdmittanceMap::build(&self.node_map, ground);
        self.admittance.iter_mut().for_each(|a| *a = 0.0);
        self.source.iter_mut().for_each(|s| *s = 0.0);
        self.overrides.iter_mut().for_each(|o| *o = false);
        self.malf_blockage_flag = input.malf_blockage_flag;
        self.malf_blockage_value = input.malf_blockage_value;
        self.potential_drop = 0.0;
        self.flux = 0.0;
        self.power = 0.0;
        self.user_command = UserPortCommand::default();
        self.topology_changed = true;
        self.admittance_update = true;
        self.initialized = true;
        Ok(())
    }

    /// Check a complete port map against the generic rules plus `rule`.
    pub fn check_port_map<F>(
        map: &[usize],
        ground: usize,
        shared_nodes_allowed: bool,
        rule: &F,
    ) -> Result<(), PortRuleError>
    where
        F: Fn(usize, usize, usize) -> Result<(), PortRuleError>,
    {
        for (port, &node) in map.iter().enumerate() {
            if node > ground {
                return Err(PortRuleError::InvalidNode { node, ground });
            }
            if !shared_nodes_allowed && node != ground {
                if let Some(other_port) = map[..port].iter().position(|&n| n == node) {
                    return Err(PortRuleError::DuplicateNode {
                        port,
                        node,
                        other_port,
                    });
                }
            }
            rule(port, node, ground)?;
        }
        Ok(())
    }

    /// Generic rules for moving one port: valid port, valid node, and no
    /// duplicate non-ground node among the other ports.
    pub fn check_port_rules(&self, port: usize, node: usize) -> Result<(), PortRuleError> {
        if !self.initialized {
            return Err(PortRuleError::NotInitialized);
        }
        if port >= self.num_ports {
            return Err(PortRuleError::InvalidPort {
                port,
                num_ports: self.num_ports,
            });
        }
        if node > self.ground {
            return Err(PortRuleError::InvalidNode {
                node,
                ground: self.ground,
            });
        }
        if !self.shared_nodes_allowed && node != self.ground {
            let clash = self
                .node_map
                .iter()
                .enumerate()
                .find(|&(p, &n)| p != port && n == node);
            if let Some((other_port, _)) = clash {
                return Err(PortRuleError::DuplicateNode {
                    port,
                    node,
                    other_port,
                });
            }
        }
        Ok(())
    }

    /// Move `port` to `node`. Callers check the rules first.
    pub(crate) fn apply_port(&mut self, port: usize, node: usize) {
        self.node_map[port] = node;
        self.rebuild_admittance_map();
    }

    /// Replace the whole port map. Callers check the rules first.
    pub(crate) fn apply_port_map(&mut self, map: &[usize]) {
        self.node_map.copy_from_slice(map);
        self.rebuild_admittance_map();
    }

    fn rebuild_admittance_map(&mut self) {
        self.admittance_map = AdmittanceMap::build(&self.node_map, self.ground);
        self.topology_changed = true;
        self.admittance_update = true;
    }

    pub fn ensure_initialized(&self) -> LinkResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(LinkError::NotInitialized {
                link: self.name.clone(),
            })
        }
    }

    /// Mark uninitialized ahead of link-specific validation.
    pub fn invalidate(&mut self) {
        self.initialized = false;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Start a fresh contribution. The dirty flag restarts from whether the
    /// port map changed since the last contribution.
    pub fn begin_contribution(&mut self) {
        self.admittance_update = std::mem::take(&mut self.topology_changed);
    }

    /// Write one admittance cell, flagging a change beyond tolerance.
    pub fn set_admittance(&mut self, index: usize, value: Real) {
        if let Some(cell) = self.admittance.get_mut(index) {
            if (*cell - value).abs() > self.admittance_tolerance {
                self.admittance_update = true;
            }
            *cell = value;
        }
    }

    /// Fill a two-port conductance stamp `[g, -g; -g, g]`.
    pub fn set_two_port_conductance(&mut self, g: Real) {
        self.set_admittance(0, g);
        self.set_admittance(1, -g);
        self.set_admittance(2, -g);
        self.set_admittance(3, g);
    }

    pub fn set_source(&mut self, port: usize, value: Real) {
        if let Some(s) = self.source.get_mut(port) {
            *s = value;
        }
    }

    /// Source vector for a flow driven from port 0 to port 1.
    pub fn set_two_port_source(&mut self, flow: Real) {
        self.set_source(0, -flow);
        self.set_source(1, flow);
    }

    /// Zero the whole contribution.
    pub fn clear_contribution(&mut self) {
        for index in 0..self.admittance.len() {
            self.set_admittance(index, 0.0);
        }
        self.source.iter_mut().for_each(|s| *s = 0.0);
    }

    /// Potential at the node `port` maps to.
    pub fn port_potential(&self, nodes: &NodeList, port: usize) -> Real {
        self.node_map.get(port).map_or(0.0, |&n| nodes.potential(n))
    }

    /// Potential of port 0 minus potential of port 1.
    pub fn two_port_drop(&self, nodes: &NodeList) -> Real {
        self.port_potential(nodes, 0) - self.port_potential(nodes, 1)
    }

    /// Push a flux flowing from port 0 to port 1 into the node accumulators.
    pub fn transport_two_port_flux(&self, nodes: &mut NodeList, flux: Real) {
        let (from, to, rate) = if flux >= 0.0 {
            (self.node_map[0], self.node_map[1], flux)
        } else {
            (self.node_map[1], self.node_map[0], -flux)
        };
        if let Some(node) = nodes.node_mut(from) {
            node.collect_outflux(rate);
        }
        if let Some(node) = nodes.node_mut(to) {
            node.collect_influx(rate);
        }
    }

    pub(crate) fn record_flows(&mut self, potential_drop: Real, flux: Real, power: Real) {
        self.potential_drop = potential_drop;
        self.flux = flux;
        self.power = power;
    }

    /// Multiplier on conductance from the blockage malfunction.
    pub fn blockage_factor(&self) -> Real {
        if self.malf_blockage_flag {
            1.0 - self.malf_blockage_value.clamp(0.0, 1.0)
        } else {
            1.0
        }
    }

    pub fn set_malf_blockage(&mut self, flag: bool, value: Real) {
        self.malf_blockage_flag = flag;
        if value.is_finite() {
            self.malf_blockage_value = value.clamp(0.0, 1.0);
        }
    }

    pub fn set_user_command(&mut self, command: UserPortCommand) {
        self.user_command = command;
    }

    pub fn user_command(&self) -> UserPortCommand {
        self.user_command
    }

    /// Take the pending command if it is marked for execution.
    pub(crate) fn take_user_command(&mut self) -> Option<UserPortCommand> {
        if self.user_command.execute {
            Some(std::mem::take(&mut self.user_command))
        } else {
            None
        }
    }

    pub fn set_override(&mut self, port: usize, flag: bool) -> Result<(), PortRuleError> {
        let num_ports = self.num_ports;
        let slot = self
            .overrides
            .get_mut(port)
            .ok_or(PortRuleError::InvalidPort { port, num_ports })?;
        *slot = flag;
        Ok(())
    }

    pub fn overrides(&self) -> &[bool] {
        &self.overrides
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_ports(&self) -> usize {
        self.num_ports
    }

    /// Ground node index of the bound node list.
    pub fn ground(&self) -> usize {
        self.ground
    }

    pub fn node_map(&self) -> &[usize] {
        &self.node_map
    }

    pub fn default_node_map(&self) -> &[usize] {
        &self.default_node_map
    }

    pub fn admittance_map(&self) -> &AdmittanceMap {
        &self.admittance_map
    }

    /// Row-major `num_ports x num_ports` admittance matrix.
    pub fn admittance(&self) -> &[Real] {
        &self.admittance
    }

    pub fn source(&self) -> &[Real] {
        &self.source
    }

    pub fn admittance_update(&self) -> bool {
        self.admittance_update
    }

    /// Called by the solver once it has consumed the flag.
    pub fn clear_admittance_update(&mut self) {
        self.admittance_update = false;
    }

    pub fn admittance_tolerance(&self) -> Real {
        self.admittance_tolerance
    }

    pub fn set_admittance_tolerance(&mut self, tolerance: Real) {
        if tolerance.is_finite() && tolerance >= 0.0 {
            self.admittance_tolerance = tolerance;
        }
    }

    pub fn shared_nodes_allowed(&self) -> bool {
        self.shared_nodes_allowed
    }

    pub(crate) fn set_shared_nodes_allowed(&mut self, allowed: bool) {
        self.shared_nodes_allowed = allowed;
    }

    pub fn potential_drop(&self) -> Real {
        self.potential_drop
    }

    pub fn flux(&self) -> Real {
        self.flux
    }

    pub fn power(&self) -> Real {
        self.power
    }
}
