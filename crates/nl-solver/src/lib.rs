//! nl-solver: reference harness for node-link networks.
//!
//! Assembles the admittance contributions of every link into a dense system,
//! factors it with `nalgebra`'s LU only when some admittance changed, and
//! drives the major/minor step cycle with the links' convergence votes.
//!
//! # Example
//!
//! ```
//! use nl_links::{Conductor, ConductorConfig, PotentialSource, PotentialSourceConfig, PotentialSourceInput};
//! use nl_network::NodeList;
//! use nl_solver::{Network, SolverConfig};
//!
//! let nodes = NodeList::new(["bus"]);
//! let ground = nodes.ground();
//! let source = PotentialSource::new(
//!     &PotentialSourceConfig { name: "v1".into(), conductance: 1.0e6 },
//!     &PotentialSourceInput { potential_rise: 10.0, ..Default::default() },
//!     &nodes,
//!     &[ground, 0],
//! ).unwrap();
//! let load = Conductor::new(
//!     &ConductorConfig { name: "load".into(), conductance: 1.0 },
//!     &Default::default(),
//!     &nodes,
//!     &[0, ground],
//! ).unwrap();
//!
//! let mut network = Network::new(nodes, SolverConfig::default());
//! network.add_link(Box::new(source)).unwrap();
//! network.add_link(Box::new(load)).unwrap();
//!
//! let report = network.step(0.1).unwrap();
//! assert!(report.converged);
//! assert!((network.nodes().potential(0) - 10.0).abs() < 1e-3);
//! ```

pub mod assembly;
pub mod config;
pub mod error;
pub mod network;
pub mod report;

pub use config::SolverConfig;
pub use error::{SolverError, SolverResult};
pub use network::Network;
pub use report::StepReport;
