//! Nodes and the node list.

use nl_core::Real;

use crate::error::{NetworkError, NetworkResult};

/// Name given to the reserved ground node.
pub const GROUND_NAME: &str = "GROUND";

/// A point in the network: one potential plus flux accumulators.
///
/// Links never own nodes. They refer to them by index and may only
/// accumulate into the flux counters, and only when flows are finalized.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Node {
    name: String,
    potential: Real,
    influx_rate: Real,
    outflux_rate: Real,
    net_flux: Real,
    flux_through: Real,
    is_ground: bool,
}

impl Node {
    fn new(name: String, is_ground: bool) -> Self {
        Self {
            name,
            potential: 0.0,
            influx_rate: 0.0,
            outflux_rate: 0.0,
            net_flux: 0.0,
            flux_through: 0.0,
            is_ground,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn potential(&self) -> Real {
        self.potential
    }

    /// Ground stays at zero potential regardless of what is written.
    pub fn set_potential(&mut self, potential: Real) {
        if !self.is_ground {
            self.potential = potential;
        }
    }

    pub fn is_ground(&self) -> bool {
        self.is_ground
    }

    /// Flux entering the node this step.
    pub fn influx_rate(&self) -> Real {
        self.influx_rate
    }

    /// Flux leaving the node this step.
    pub fn outflux_rate(&self) -> Real {
        self.outflux_rate
    }

    /// `influx - outflux`, valid after [`NodeList::integrate_flows`].
    pub fn net_flux(&self) -> Real {
        self.net_flux
    }

    /// Flux passing through the node, valid after [`NodeList::integrate_flows`].
    pub fn flux_through(&self) -> Real {
        self.flux_through
    }

    pub fn collect_influx(&mut self, flux: Real) {
        self.influx_rate += flux;
    }

    pub fn collect_outflux(&mut self, flux: Real) {
        self.outflux_rate += flux;
    }

    fn reset_flows(&mut self) {
        self.influx_rate = 0.0;
        self.outflux_rate = 0.0;
        self.net_flux = 0.0;
        self.flux_through = 0.0;
    }

    fn integrate_flows(&mut self) {
        self.net_flux = self.influx_rate - self.outflux_rate;
        self.flux_through = self.influx_rate.min(self.outflux_rate);
    }
}

/// All nodes of a network plus the reserved ground node.
///
/// Regular nodes occupy `[0, num_nodes)`; ground is always at index
/// `num_nodes`, so a valid node index lies in `[0, num_nodes]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NodeList {
    nodes: Vec<Node>,
}

impl NodeList {
    /// Build a node list from regular node names; ground is appended.
    ///
    /// Names are not validated here; use [`crate::NodeListBuilder`] for that.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut nodes: Vec<Node> = names
            .into_iter()
            .map(|name| Node::new(name.into(), false))
            .collect();
        nodes.push(Node::new(GROUND_NAME.to_string(), true));
        Self { nodes }
    }

    /// Number of regular (non-ground) nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Index of the ground node.
    pub fn ground(&self) -> usize {
        self.num_nodes()
    }

    pub fn is_ground(&self, index: usize) -> bool {
        index == self.ground()
    }

    /// True for any index in `[0, num_nodes]`.
    pub fn contains(&self, index: usize) -> bool {
        index < self.nodes.len()
    }

    pub fn check_index(&self, index: usize) -> NetworkResult<()> {
        if self.contains(index) {
            Ok(())
        } else {
            Err(NetworkError::InvalidNode {
                index,
                ground: self.ground(),
            })
        }
    }

    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn node_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.nodes.get_mut(index)
    }

    /// Potential at `index`; zero for ground or an unknown index.
    pub fn potential(&self, index: usize) -> Real {
        self.nodes.get(index).map_or(0.0, Node::potential)
    }

    /// Write the solved potentials of the regular nodes, in index order.
    pub fn set_potentials(&mut self, potentials: &[Real]) {
        for (node, &p) in self.nodes.iter_mut().zip(potentials) {
            node.set_potential(p);
        }
    }

    /// Potentials of the regular nodes, in index order.
    pub fn potentials(&self) -> Vec<Real> {
        self.nodes[..self.num_nodes()]
            .iter()
            .map(Node::potential)
            .collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Clear every node's flux accumulators before links finalize flows.
    pub fn reset_flows(&mut self) {
        self.nodes.iter_mut().for_each(Node::reset_flows);
    }

    /// Derive net and through flux once every link has finalized.
    pub fn integrate_flows(&mut self) {
        self.nodes.iter_mut().for_each(Node::integrate_flows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_is_last_and_pinned() {
        let mut nodes = NodeList::new(["A", "B"]);
        assert_eq!(nodes.num_nodes(), 2);
        assert_eq!(nodes.ground(), 2);
        assert!(nodes.contains(2));
        assert!(!nodes.contains(3));

        nodes.set_potentials(&[5.0, 3.0, 99.0]);
        assert_eq!(nodes.potential(0), 5.0);
        assert_eq!(nodes.potential(1), 3.0);
        assert_eq!(nodes.potential(2), 0.0);
        assert_eq!(nodes.potential(17), 0.0);
        assert_eq!(nodes.potentials(), vec![5.0, 3.0]);
    }

    #[test]
    fn flux_accumulates_and_integrates() {
        let mut nodes = NodeList::new(["A"]);
        let a = nodes.node_mut(0).unwrap();
        a.collect_influx(2.0);
        a.collect_influx(1.0);
        a.collect_outflux(0.5);
        nodes.integrate_flows();

        let a = nodes.node(0).unwrap();
        assert_eq!(a.influx_rate(), 3.0);
        assert_eq!(a.net_flux(), 2.5);
        assert_eq!(a.flux_through(), 0.5);

        nodes.reset_flows();
        assert_eq!(nodes.node(0).unwrap().influx_rate(), 0.0);
    }

    #[test]
    fn check_index_reports_ground() {
        let nodes = NodeList::new(["A"]);
        assert!(nodes.check_index(1).is_ok());
        assert_eq!(
            nodes.check_index(2),
            Err(NetworkError::InvalidNode {
                index: 2,
                ground: 1
            })
        );
    }
}
