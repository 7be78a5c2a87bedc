//! Tree nodes: a value or nested map, paired with a version counter.

use indexmap::IndexMap;

use warden_core::{Value, Version};

/// The shape of one tree location: a leaf value or a nested mapping.
#[derive(Clone, Debug, PartialEq)]
pub enum StateNode {
    /// A scalar value or buffer handle.
    Leaf(Value),
    /// A nested mapping of key to child node.
    Map(IndexMap<String, VersionedNode>),
}

impl StateNode {
    /// An empty map node.
    pub fn empty_map() -> Self {
        Self::Map(IndexMap::new())
    }

    /// The children, if this node is a map.
    pub fn as_map(&self) -> Option<&IndexMap<String, VersionedNode>> {
        match self {
            Self::Map(children) => Some(children),
            Self::Leaf(_) => None,
        }
    }

    /// The value, if this node is a leaf.
    pub fn as_leaf(&self) -> Option<&Value> {
        match self {
            Self::Leaf(value) => Some(value),
            Self::Map(_) => None,
        }
    }
}

/// A [`StateNode`] plus its version counter.
///
/// The version is incremented on every committed write that touches the
/// node (its own value changing, or for maps, any descendant changing).
/// A node that has never been committed has version 0.
#[derive(Clone, Debug, PartialEq)]
pub struct VersionedNode {
    /// The node's current shape and content.
    pub node: StateNode,
    /// Commit counter; the optimistic-concurrency token.
    pub version: Version,
}

impl VersionedNode {
    /// A fresh leaf at its first committed version.
    pub fn leaf(value: Value) -> Self {
        Self {
            node: StateNode::Leaf(value),
            version: Version::ZERO.bumped(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_starts_at_version_one() {
        let n = VersionedNode::leaf(Value::Int(3));
        assert_eq!(n.version, Version(1));
        assert_eq!(n.node.as_leaf(), Some(&Value::Int(3)));
        assert!(n.node.as_map().is_none());
    }

    #[test]
    fn empty_map_has_no_leaf() {
        let n = StateNode::empty_map();
        assert!(n.as_leaf().is_none());
        assert_eq!(n.as_map().unwrap().len(), 0);
    }
}
