//! nl-network: the node side of the link/network contract.
//!
//! Provides:
//! - Nodes with a scalar potential and flux accumulators
//! - The node list, with its reserved ground node
//! - Admittance maps translating a link's local cells to global matrix slots
//! - Convergence votes and the per-minor-step context handed to links
//!
//! # Example
//!
//! ```
//! use nl_network::NodeListBuilder;
//!
//! let mut builder = NodeListBuilder::new();
//! let bus = builder.add_node("Bus");
//! let load = builder.add_node("Load");
//! let nodes = builder.build().unwrap();
//!
//! assert_eq!(nodes.num_nodes(), 2);
//! assert_eq!(nodes.ground(), 2);
//! assert!(nodes.is_ground(nodes.ground()));
//! assert_eq!((bus, load), (0, 1));
//! ```

pub mod admittance;
pub mod builder;
pub mod error;
pub mod node;
pub(crate) mod validate;
pub mod vote;

// Re-exports for ergonomics
pub use admittance::AdmittanceMap;
pub use builder::NodeListBuilder;
pub use error::{NetworkError, NetworkResult};
pub use node::{GROUND_NAME, Node, NodeList};
pub use vote::{ConvergenceVote, StepContext, tally};
