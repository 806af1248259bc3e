//! nl-links: network links for the node-link solver.
//!
//! Provides:
//! - The [`Link`] trait and its shared [`LinkCore`] state
//! - Port management with user port commands and jumper plugs
//! - Trip logic for links that vote on the network solution
//! - Concrete links: conductor, potential source, jumper, switch, valve,
//!   photovoltaic string, and curve-driven pump
//!
//! Links contribute a dense admittance matrix and source vector over their
//! ports; the solver assembles them through each link's admittance map.
//!
//! # Example
//!
//! ```
//! use nl_links::{Conductor, ConductorConfig, Link};
//! use nl_network::NodeList;
//!
//! let nodes = NodeList::new(["bus", "load"]);
//! let config = ConductorConfig { name: "r1".into(), conductance: 0.5 };
//! let mut r1 = Conductor::new(&config, &Default::default(), &nodes, &[0, 1]).unwrap();
//!
//! r1.step(&nodes, 0.1).unwrap();
//! assert_eq!(r1.core().admittance(), &[0.5, -0.5, -0.5, 0.5]);
//! assert!(r1.core().admittance_update());
//! ```

pub mod common;
pub mod conductor;
pub mod convergence;
pub mod error;
pub mod jumper;
pub mod link;
pub mod potential;
pub mod pump;
pub mod pv;
pub mod switch;
pub mod topology;
pub mod traits;
pub mod valve;

// Re-exports
pub use conductor::{Conductor, ConductorConfig, ConductorInput};
pub use convergence::{TripComparison, TripLogic};
pub use error::{LinkError, LinkResult, PortRuleError};
pub use jumper::{Jumper, JumperConfig, JumperInput};
pub use link::{LinkCore, LinkInput};
pub use potential::{PotentialSource, PotentialSourceConfig, PotentialSourceInput};
pub use pump::{CurvePump, CurvePumpConfig, CurvePumpInput};
pub use pv::{PvCell, PvCellConfig, PvEnvironment, PvRegion, PvString, PvStringConfig, PvStringInput};
pub use switch::{Switch, SwitchConfig, SwitchInput};
pub use topology::{Plug, PortTarget, SocketPlug, UserPortCommand};
pub use traits::Link;
pub use valve::{Valve, ValveConfig, ValveInput};
