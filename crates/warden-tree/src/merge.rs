//! Merge patches and pending-merge proposals.

use indexmap::IndexMap;

use warden_core::{Path, Value, Version};

/// A proposed nested update: the subtree to merge onto a target path.
///
/// Keys present in the patch but absent at the target are added; keys
/// present in both are overwritten (subject to the proposal's base
/// version); keys absent from the patch are left untouched. A map patch
/// merging onto an existing leaf replaces the leaf.
#[derive(Clone, Debug, PartialEq)]
pub enum MergePatch {
    /// Set the target location to this value.
    Leaf(Value),
    /// Merge these children into the target map.
    Map(IndexMap<String, MergePatch>),
}

impl MergePatch {
    /// Build a map patch from `(key, patch)` pairs.
    pub fn map<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, MergePatch)>,
        S: Into<String>,
    {
        Self::Map(entries.into_iter().map(|(k, p)| (k.into(), p)).collect())
    }

    /// A leaf patch setting a single value.
    pub fn leaf(value: Value) -> Self {
        Self::Leaf(value)
    }

    /// Number of leaves in the patch.
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Map(children) => children.values().map(MergePatch::leaf_count).sum(),
        }
    }
}

/// A proposal awaiting commit: target path, patch, and the base version
/// the proposer last observed at the target.
///
/// The base version is the optimistic-concurrency token — the merge
/// engine rejects the proposal if the target's version has moved since.
/// Dropping a `PendingMerge` before proposing abandons it with no
/// state-tree effect.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingMerge {
    /// Where the patch applies.
    pub path: Path,
    /// The proposed subtree.
    pub patch: MergePatch,
    /// Version observed at `path` when the update was computed.
    pub base_version: Version,
}

impl PendingMerge {
    /// Create a proposal.
    pub fn new(path: Path, patch: MergePatch, base_version: Version) -> Self {
        Self {
            path,
            patch,
            base_version,
        }
    }
}
