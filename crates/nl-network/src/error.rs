//! Network-specific error types.

use nl_core::NlError;
use thiserror::Error;

/// Node list construction errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// A node was given an empty name.
    #[error("Node {index} has an empty name")]
    EmptyName { index: usize },

    /// Two nodes share a name.
    #[error("Duplicate node name '{name}'")]
    DuplicateName { name: String },

    /// A regular node tried to claim the ground node's name.
    #[error("Node {index} uses the reserved ground name")]
    ReservedName { index: usize },

    /// A node index is outside `[0, num_nodes]`.
    #[error("Node index {index} out of range (ground is {ground})")]
    InvalidNode { index: usize, ground: usize },
}

pub type NetworkResult<T> = Result<T, NetworkError>;

impl From<NetworkError> for NlError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::InvalidNode { index, ground } => NlError::IndexOob {
                what: "node",
                index,
                len: ground + 1,
            },
            _ => NlError::InvalidArg {
                what: "node list",
            },
        }
    }
}
