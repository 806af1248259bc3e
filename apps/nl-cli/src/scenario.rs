//! YAML scenario schema and network construction.
//!
//! Nodes are declared by name; link ports, plug sockets and port events refer
//! to those names. `GROUND` (any case) names the ground node.

use std::collections::BTreeMap;

use nl_core::Real;
use nl_links::*;
use nl_network::{GROUND_NAME, NodeList, NodeListBuilder};
use nl_solver::{Network, SolverConfig};
use serde::Deserialize;

use crate::error::{CliError, CliResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub nodes: Vec<String>,
    /// Starting potentials by node name; unlisted nodes start at zero.
    #[serde(default)]
    pub initial_potentials: BTreeMap<String, Real>,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub run: RunSettings,
    pub links: Vec<LinkSpec>,
    #[serde(default)]
    pub events: Vec<PortEvent>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSettings {
    pub steps: usize,
    pub dt: Real,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self { steps: 1, dt: 0.1 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum LinkSpec {
    Conductor {
        ports: Vec<String>,
        config: ConductorConfig,
        #[serde(default)]
        input: ConductorInput,
    },
    PotentialSource {
        ports: Vec<String>,
        config: PotentialSourceConfig,
        #[serde(default)]
        input: PotentialSourceInput,
    },
    Switch {
        ports: Vec<String>,
        config: SwitchConfig,
        #[serde(default)]
        input: SwitchInput,
    },
    Valve {
        ports: Vec<String>,
        config: ValveConfig,
        #[serde(default)]
        input: ValveInput,
    },
    PvString {
        ports: Vec<String>,
        config: PvStringConfig,
        #[serde(default)]
        input: PvStringInput,
    },
    CurvePump {
        ports: Vec<String>,
        config: CurvePumpConfig,
        #[serde(default)]
        input: CurvePumpInput,
    },
    Jumper {
        ports: Vec<String>,
        config: JumperConfig,
        #[serde(default)]
        input: JumperInput,
        #[serde(default)]
        plugs: [Option<PlugSpec>; 2],
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlugSpec {
    pub sockets: Vec<String>,
    #[serde(default)]
    pub initial: Option<usize>,
}

/// A user port command issued before a given major step (zero-based).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortEvent {
    pub step: usize,
    pub link: String,
    pub port: usize,
    /// Node name, `GROUND`, or `default` for the link's initial node
    pub target: String,
}

impl Scenario {
    pub fn from_yaml(text: &str) -> CliResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn node_list(&self) -> CliResult<NodeList> {
        let mut builder = NodeListBuilder::new();
        for name in &self.nodes {
            builder.add_node(name.clone());
        }
        let mut nodes = builder.build()?;
        for (name, &potential) in &self.initial_potentials {
            let index = resolve_node(&nodes, name)?;
            if let Some(node) = nodes.node_mut(index) {
                node.set_potential(potential);
            }
        }
        Ok(nodes)
    }

    /// Build and initialize every link, then hand them to a new network.
    pub fn build(&self) -> CliResult<Network> {
        let nodes = self.node_list()?;
        let links = self
            .links
            .iter()
            .map(|spec| spec.build(&nodes))
            .collect::<CliResult<Vec<_>>>()?;

        let mut network = Network::new(nodes, self.solver);
        for link in links {
            network.add_link(link)?;
        }
        for event in &self.events {
            if network.find_link(&event.link).is_none() {
                return Err(CliError::scenario(format!(
                    "event at step {} names unknown link '{}'",
                    event.step, event.link
                )));
            }
        }
        Ok(network)
    }
}

impl LinkSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Conductor { config, .. } => &config.name,
            Self::PotentialSource { config, .. } => &config.name,
            Self::Switch { config, .. } => &config.name,
            Self::Valve { config, .. } => &config.name,
            Self::PvString { config, .. } => &config.name,
            Self::CurvePump { config, .. } => &config.name,
            Self::Jumper { config, .. } => &config.name,
        }
    }

    fn build(&self, nodes: &NodeList) -> CliResult<Box<dyn Link>> {
        let link: Box<dyn Link> = match self {
            Self::Conductor {
                ports,
                config,
                input,
            } => Box::new(Conductor::new(config, input, nodes, &resolve_ports(nodes, ports)?)?),
            Self::PotentialSource {
                ports,
                config,
                input,
            } => Box::new(PotentialSource::new(
                config,
                input,
                nodes,
                &resolve_ports(nodes, ports)?,
            )?),
            Self::Switch {
                ports,
                config,
                input,
            } => Box::new(Switch::new(config, input, nodes, &resolve_ports(nodes, ports)?)?),
            Self::Valve {
                ports,
                config,
                input,
            } => Box::new(Valve::new(config, input, nodes, &resolve_ports(nodes, ports)?)?),
            Self::PvString {
                ports,
                config,
                input,
            } => Box::new(PvString::new(config, input, nodes, &resolve_ports(nodes, ports)?)?),
            Self::CurvePump {
                ports,
                config,
                input,
            } => Box::new(CurvePump::new(config, input, nodes, &resolve_ports(nodes, ports)?)?),
            Self::Jumper {
                ports,
                config,
                input,
                plugs,
            } => {
                let [first, second] = plugs;
                let plugs = [
                    build_plug(nodes, &config.name, 0, first.as_ref())?,
                    build_plug(nodes, &config.name, 1, second.as_ref())?,
                ];
                Box::new(Jumper::new(
                    config,
                    input,
                    nodes,
                    &resolve_ports(nodes, ports)?,
                    plugs,
                )?)
            }
        };
        Ok(link)
    }
}

impl PortEvent {
    pub fn command(&self, nodes: &NodeList) -> CliResult<UserPortCommand> {
        let target = if self.target.eq_ignore_ascii_case("default") {
            PortTarget::Default
        } else if is_ground_name(&self.target) {
            PortTarget::Ground
        } else {
            PortTarget::Node(resolve_node(nodes, &self.target)?)
        };
        Ok(UserPortCommand::new(self.port, target))
    }
}

fn is_ground_name(name: &str) -> bool {
    name.eq_ignore_ascii_case(GROUND_NAME)
}

pub fn resolve_node(nodes: &NodeList, name: &str) -> CliResult<usize> {
    if is_ground_name(name) {
        return Ok(nodes.ground());
    }
    nodes
        .index_of(name)
        .ok_or_else(|| CliError::scenario(format!("unknown node '{name}'")))
}

fn resolve_ports(nodes: &NodeList, ports: &[String]) -> CliResult<Vec<usize>> {
    ports.iter().map(|name| resolve_node(nodes, name)).collect()
}

fn build_plug(
    nodes: &NodeList,
    jumper: &str,
    port: usize,
    spec: Option<&PlugSpec>,
) -> CliResult<Option<Box<dyn Plug>>> {
    let Some(spec) = spec else { return Ok(None) };
    let sockets = resolve_ports(nodes, &spec.sockets)?;
    let plug = SocketPlug::new(format!("{jumper}.plug{port}"), sockets, spec.initial);
    Ok(Some(Box::new(plug)))
}
