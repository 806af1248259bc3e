//! Error types for solver operations.

use nl_core::NlError;
use nl_links::LinkError;
use nl_network::NetworkError;
use thiserror::Error;

/// Errors that can occur while building or stepping a network.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Network setup error: {what}")]
    Setup { what: String },

    #[error("Singular system: {what}")]
    Singular { what: String },

    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
}

pub type SolverResult<T> = Result<T, SolverError>;

impl From<SolverError> for NlError {
    fn from(e: SolverError) -> Self {
        match e {
            SolverError::Setup { what } => NlError::Configuration { what },
            SolverError::Singular { what } => NlError::Numerical { what },
            SolverError::Link(e) => e.into(),
            SolverError::Network(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_keeps_context() {
        let err: NlError = SolverError::Setup {
            what: "duplicate link name 'r1'".into(),
        }
        .into();
        assert_eq!(
            err,
            NlError::Configuration {
                what: "duplicate link name 'r1'".into()
            }
        );

        let err: NlError = SolverError::Link(LinkError::init("sw", "trip priority must be 0 or 1")).into();
        assert!(err.to_string().contains("sw: trip priority"));
    }
}
