//! Incremental node list builder.

use crate::error::NetworkResult;
use crate::node::NodeList;
use crate::validate;

/// Builder for constructing a node list incrementally.
///
/// Use `add_node` to declare regular nodes, then call `build()` to validate
/// names and freeze them into a [`NodeList`] with ground appended.
#[derive(Debug, Default)]
pub struct NodeListBuilder {
    names: Vec<String>,
}

impl NodeListBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its index.
    pub fn add_node(&mut self, name: impl Into<String>) -> usize {
        self.names.push(name.into());
        self.names.len() - 1
    }

    /// Index ground will have once built.
    pub fn ground(&self) -> usize {
        self.names.len()
    }

    /// Validate and build the node list.
    pub fn build(self) -> NetworkResult<NodeList> {
        validate::validate_names(&self.names)?;
        Ok(NodeList::new(self.names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NetworkError;

    #[test]
    fn builder_basic() {
        let mut builder = NodeListBuilder::new();
        let n1 = builder.add_node("Node1");
        let n2 = builder.add_node("Node2");
        assert_eq!((n1, n2), (0, 1));
        assert_eq!(builder.ground(), 2);

        let nodes = builder.build().unwrap();
        assert_eq!(nodes.num_nodes(), 2);
        assert_eq!(nodes.index_of("Node2"), Some(1));
        assert_eq!(nodes.index_of(crate::GROUND_NAME), Some(2));
    }

    #[test]
    fn builder_rejects_duplicates() {
        let mut builder = NodeListBuilder::new();
        builder.add_node("A");
        builder.add_node("A");
        assert_eq!(
            builder.build(),
            Err(NetworkError::DuplicateName { name: "A".into() })
        );
    }
}
