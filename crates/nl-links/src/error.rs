//! Error types for link operations.
//!
//! Two families are kept apart. [`LinkError`] covers configuration defects
//! found at initialization, stepping a link that never initialized, and
//! numerical failures with no sane fallback. [`PortRuleError`] covers run-time
//! port remapping requests; those never escalate and leave the existing
//! mapping in place.

use nl_core::NlError;
use thiserror::Error;

/// Errors that can occur while initializing or stepping a link.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    #[error("Link '{link}' failed to initialize: {what}")]
    Initialization { link: String, what: String },

    #[error("Link '{link}' is not initialized")]
    NotInitialized { link: String },

    #[error("Link '{link}' numerical failure: {what}")]
    Numerical { link: String, what: String },
}

pub type LinkResult<T> = Result<T, LinkError>;

impl LinkError {
    pub fn init(link: &str, what: impl Into<String>) -> Self {
        LinkError::Initialization {
            link: link.to_string(),
            what: what.into(),
        }
    }

    pub fn numerical(link: &str, what: impl Into<String>) -> Self {
        LinkError::Numerical {
            link: link.to_string(),
            what: what.into(),
        }
    }
}

impl From<LinkError> for NlError {
    fn from(e: LinkError) -> Self {
        match e {
            LinkError::Initialization { link, what } => NlError::Configuration {
                what: format!("{link}: {what}"),
            },
            LinkError::NotInitialized { .. } => NlError::Invariant {
                what: "link not initialized",
            },
            LinkError::Numerical { link, what } => NlError::Numerical {
                what: format!("{link}: {what}"),
            },
        }
    }
}

/// A rejected port assignment. The link keeps its previous mapping.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortRuleError {
    #[error("port {port} out of range (link has {num_ports} ports)")]
    InvalidPort { port: usize, num_ports: usize },

    #[error("node {node} out of range (ground is {ground})")]
    InvalidNode { node: usize, ground: usize },

    #[error("node {node} already used by port {other_port}, cannot assign to port {port}")]
    DuplicateNode {
        port: usize,
        node: usize,
        other_port: usize,
    },

    #[error("port {port} cannot map to node {node}: {rule}")]
    Specific {
        port: usize,
        node: usize,
        rule: &'static str,
    },

    #[error("port map has {given} entries, link has {num_ports} ports")]
    MapLength { given: usize, num_ports: usize },

    #[error("port command is missing a port or target")]
    IncompleteCommand,

    #[error("link is not initialized")]
    NotInitialized,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = LinkError::init("sw1", "resistance must be positive");
        assert!(err.to_string().contains("sw1"));
        assert!(err.to_string().contains("resistance"));

        let err = PortRuleError::DuplicateNode {
            port: 1,
            node: 3,
            other_port: 0,
        };
        assert!(err.to_string().contains("node 3"));
    }

    #[test]
    fn error_conversion() {
        let link_err = LinkError::numerical("pump", "no root");
        let nl_err: NlError = link_err.into();
        assert!(matches!(nl_err, NlError::Numerical { .. }));

        let nl_err: NlError = LinkError::init("valve1", "rate limit must be positive").into();
        assert_eq!(
            nl_err,
            NlError::Configuration {
                what: "valve1: rate limit must be positive".into()
            }
        );
    }
}
