//! The [`StateTree`]: versioned, path-addressable in-memory state.
//!
//! The tree itself is a plain data structure with no interior locking;
//! [`MergeEngine`](crate::engine::MergeEngine) owns the synchronization
//! and calls [`StateTree::apply`] inside its commit critical section.

use indexmap::IndexMap;

use warden_buffer::BufferPool;
use warden_core::{BufferError, MergeError, Path, Value, Version};

use crate::merge::MergePatch;
use crate::node::{StateNode, VersionedNode};
use crate::plain::PlainValue;

/// How [`StateTree::apply`] treats keys that already hold a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyMode {
    /// Add absent keys, overwrite present ones.
    Merge,
    /// Add absent keys; overwriting an existing value fails with
    /// [`MergeError::AppendOverwrite`].
    AppendOnly,
}

/// Outcome of a successful [`StateTree::apply`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub struct ApplyOutcome {
    /// Number of nodes whose value actually changed. Zero means the
    /// patch was a no-op and nothing was touched.
    pub changed: usize,
    /// The target path's version after the apply (unchanged for a
    /// no-op).
    pub version: Version,
}

/// Hierarchical mapping from keys to scalar values or buffer handles,
/// with a per-node version counter.
///
/// The root is an anonymous map; the empty path addresses it. A node's
/// runtime shape matches its zone's declared type at all times — the
/// guard chain enforces this at every successful write, so reads never
/// re-validate.
#[derive(Clone, Debug, Default)]
pub struct StateTree {
    root: IndexMap<String, VersionedNode>,
    root_version: Version,
}

impl StateTree {
    /// An empty tree at version 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// The node at `path`, or `None` if absent (or if `path` is the
    /// root, which is not itself a node).
    pub fn node(&self, path: &Path) -> Option<&VersionedNode> {
        let mut map = &self.root;
        let segments = path.segments();
        let (last, intermediate) = segments.split_last()?;
        for segment in intermediate {
            map = map.get(segment)?.node.as_map()?;
        }
        map.get(last)
    }

    /// Copy out the leaf value at `path`, if any.
    ///
    /// Scalars are copied; buffer values are handle copies — the bytes
    /// stay in the pool.
    pub fn get(&self, path: &Path) -> Option<Value> {
        self.node(path)?.node.as_leaf().cloned()
    }

    /// Whether any node (leaf or map) exists at `path`.
    pub fn contains(&self, path: &Path) -> bool {
        path.is_root() || self.node(path).is_some()
    }

    /// The version counter at `path`.
    ///
    /// The root path reports the tree-wide version; a missing path
    /// reports version 0, which is what lets a first write propose
    /// against an absent node.
    pub fn version_at(&self, path: &Path) -> Version {
        if path.is_root() {
            return self.root_version;
        }
        self.node(path).map(|n| n.version).unwrap_or(Version::ZERO)
    }

    /// Merge `patch` onto `path`, committing all-or-nothing.
    ///
    /// The base-version check belongs to the caller (the merge engine);
    /// `apply` enforces structure only: descent through an existing leaf
    /// fails with [`MergeError::PathObstructed`], and under
    /// [`ApplyMode::AppendOnly`] any overwrite of an existing value
    /// fails with [`MergeError::AppendOverwrite`]. On failure the tree
    /// is untouched.
    ///
    /// On success, every changed node and all its ancestors up to the
    /// root get their version bumped, so a base version taken at any
    /// enclosing path conflicts correctly with deeper concurrent writes.
    pub fn apply(
        &mut self,
        path: &Path,
        patch: &MergePatch,
        mode: ApplyMode,
    ) -> Result<ApplyOutcome, MergeError> {
        self.check_descent(path)?;

        // Root target: the root is a map, so only a map patch fits.
        if path.is_root() {
            let MergePatch::Map(_) = patch else {
                return Err(MergeError::PathObstructed { path: path.clone() });
            };
            let existing = VersionedNode {
                node: StateNode::Map(self.root.clone()),
                version: self.root_version,
            };
            let merged = merged_node(Some(&existing), patch, path, mode)?;
            if merged.changed == 0 {
                return Ok(ApplyOutcome {
                    changed: 0,
                    version: self.root_version,
                });
            }
            let StateNode::Map(children) = merged.node.node else {
                unreachable!("map patch always merges to a map node");
            };
            self.root = children;
            self.root_version = merged.node.version;
            return Ok(ApplyOutcome {
                changed: merged.changed,
                version: self.root_version,
            });
        }

        let merged = merged_node(self.node(path), patch, path, mode)?;
        if merged.changed == 0 {
            return Ok(ApplyOutcome {
                changed: 0,
                version: self.version_at(path),
            });
        }
        let target_version = merged.node.version;

        // Commit: walk down, bumping every ancestor on the way.
        let segments = path.segments();
        let (last, intermediate) = segments
            .split_last()
            .expect("root target handled above");
        let mut map = &mut self.root;
        for segment in intermediate {
            let entry = map.entry(segment.clone()).or_insert_with(|| VersionedNode {
                node: StateNode::empty_map(),
                version: Version::ZERO,
            });
            entry.version = entry.version.bumped();
            map = match &mut entry.node {
                StateNode::Map(children) => children,
                StateNode::Leaf(_) => unreachable!("descent validated leaf-free"),
            };
        }
        map.insert(last.clone(), merged.node);
        self.root_version = self.root_version.bumped();

        Ok(ApplyOutcome {
            changed: merged.changed,
            version: target_version,
        })
    }

    /// Extract the plain exchange representation of the subtree at
    /// `path`, resolving buffer handles to raw bytes through `pool`.
    ///
    /// Read-only: mutates neither version counters nor reference
    /// counts. Returns `Ok(None)` if nothing exists at `path`.
    pub fn snapshot(
        &self,
        path: &Path,
        pool: &BufferPool,
    ) -> Result<Option<PlainValue>, BufferError> {
        if path.is_root() {
            return plain_map(&self.root, pool).map(Some);
        }
        match self.node(path) {
            None => Ok(None),
            Some(node) => plain_node(node, pool).map(Some),
        }
    }

    /// Fail if any segment of `path` other than the last descends
    /// through an existing leaf.
    fn check_descent(&self, path: &Path) -> Result<(), MergeError> {
        let mut map = &self.root;
        let segments = path.segments();
        for (i, segment) in segments.iter().enumerate() {
            let Some(node) = map.get(segment) else {
                return Ok(()); // remainder will be created
            };
            match &node.node {
                StateNode::Map(children) => map = children,
                StateNode::Leaf(_) if i + 1 == segments.len() => return Ok(()),
                StateNode::Leaf(_) => {
                    return Err(MergeError::PathObstructed {
                        path: Path::from_segments(segments[..=i].iter().cloned()),
                    });
                }
            }
        }
        Ok(())
    }
}

struct Merged {
    node: VersionedNode,
    changed: usize,
}

/// Pure merge of `patch` onto `existing`, with change counting.
///
/// Versions are computed here: a changed node gets `existing.bumped()`
/// (or 1 when freshly created); an unchanged node keeps its version.
fn merged_node(
    existing: Option<&VersionedNode>,
    patch: &MergePatch,
    at: &Path,
    mode: ApplyMode,
) -> Result<Merged, MergeError> {
    match patch {
        MergePatch::Leaf(value) => match existing {
            Some(n) if n.node.as_leaf() == Some(value) => Ok(Merged {
                node: n.clone(),
                changed: 0,
            }),
            Some(n) => {
                if mode == ApplyMode::AppendOnly {
                    return Err(MergeError::AppendOverwrite { path: at.clone() });
                }
                Ok(Merged {
                    node: VersionedNode {
                        node: StateNode::Leaf(value.clone()),
                        version: n.version.bumped(),
                    },
                    changed: 1,
                })
            }
            None => Ok(Merged {
                node: VersionedNode::leaf(value.clone()),
                changed: 1,
            }),
        },
        MergePatch::Map(patch_children) => {
            let (mut children, base_version, mut changed) = match existing {
                Some(VersionedNode {
                    node: StateNode::Map(em),
                    version,
                }) => (em.clone(), *version, 0),
                // A map patch replacing an existing leaf is itself an
                // overwrite.
                Some(VersionedNode { version, .. }) => {
                    if mode == ApplyMode::AppendOnly {
                        return Err(MergeError::AppendOverwrite { path: at.clone() });
                    }
                    (IndexMap::new(), *version, 1)
                }
                None => (IndexMap::new(), Version::ZERO, 0),
            };
            for (key, sub) in patch_children {
                let merged = merged_node(children.get(key), sub, &at.child(key), mode)?;
                if merged.changed > 0 {
                    children.insert(key.clone(), merged.node);
                    changed += merged.changed;
                }
            }
            let version = if changed > 0 {
                base_version.bumped()
            } else {
                base_version
            };
            Ok(Merged {
                node: VersionedNode {
                    node: StateNode::Map(children),
                    version,
                },
                changed,
            })
        }
    }
}

fn plain_node(node: &VersionedNode, pool: &BufferPool) -> Result<PlainValue, BufferError> {
    match &node.node {
        StateNode::Leaf(Value::Int(v)) => Ok(PlainValue::Int(*v)),
        StateNode::Leaf(Value::Float(v)) => Ok(PlainValue::Float(*v)),
        StateNode::Leaf(Value::Bool(v)) => Ok(PlainValue::Bool(*v)),
        StateNode::Leaf(Value::Text(v)) => Ok(PlainValue::Text(v.clone())),
        StateNode::Leaf(Value::Buffer(handle)) => {
            Ok(PlainValue::Bytes(pool.resolve_bytes(handle)?))
        }
        StateNode::Map(children) => plain_map(children, pool),
    }
}

fn plain_map(
    children: &IndexMap<String, VersionedNode>,
    pool: &BufferPool,
) -> Result<PlainValue, BufferError> {
    let mut out = IndexMap::with_capacity(children.len());
    for (key, child) in children {
        out.insert(key.clone(), plain_node(child, pool)?);
    }
    Ok(PlainValue::Map(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    fn leaf_patch(v: i64) -> MergePatch {
        MergePatch::leaf(Value::Int(v))
    }

    #[test]
    fn first_apply_creates_and_versions() {
        let mut tree = StateTree::new();
        let patch = MergePatch::map([("b", leaf_patch(1))]);
        let outcome = tree.apply(&path("a"), &patch, ApplyMode::Merge).unwrap();
        assert_eq!(outcome.changed, 1);
        assert_eq!(outcome.version, Version(1));
        assert_eq!(tree.get(&path("a.b")), Some(Value::Int(1)));
        assert_eq!(tree.version_at(&path("a")), Version(1));
        assert_eq!(tree.version_at(&path("a.b")), Version(1));
    }

    #[test]
    fn root_merge_raises_child_version() {
        let mut tree = StateTree::new();
        let patch = MergePatch::map([("a", MergePatch::map([("b", leaf_patch(1))]))]);
        let outcome = tree.apply(&Path::root(), &patch, ApplyMode::Merge).unwrap();
        assert_eq!(outcome.changed, 1);
        assert_eq!(tree.version_at(&path("a")), Version(1));
        assert_eq!(tree.version_at(&Path::root()), Version(1));
    }

    #[test]
    fn ancestors_bump_on_deep_change() {
        let mut tree = StateTree::new();
        tree.apply(&path("a.b"), &leaf_patch(1), ApplyMode::Merge)
            .unwrap();
        let root_v = tree.version_at(&Path::root());
        let a_v = tree.version_at(&path("a"));

        tree.apply(&path("a.b"), &leaf_patch(2), ApplyMode::Merge)
            .unwrap();
        assert!(tree.version_at(&Path::root()) > root_v);
        assert!(tree.version_at(&path("a")) > a_v);
        assert_eq!(tree.get(&path("a.b")), Some(Value::Int(2)));
    }

    #[test]
    fn identical_patch_is_noop() {
        let mut tree = StateTree::new();
        let patch = MergePatch::map([("x", leaf_patch(5))]);
        let first = tree.apply(&path("a"), &patch, ApplyMode::Merge).unwrap();
        let second = tree.apply(&path("a"), &patch, ApplyMode::Merge).unwrap();
        assert_eq!(second.changed, 0);
        assert_eq!(second.version, first.version);
        assert_eq!(tree.version_at(&path("a")), first.version);
    }

    #[test]
    fn untouched_siblings_keep_versions() {
        let mut tree = StateTree::new();
        tree.apply(
            &path("a"),
            &MergePatch::map([("x", leaf_patch(1)), ("y", leaf_patch(2))]),
            ApplyMode::Merge,
        )
        .unwrap();
        let y_v = tree.version_at(&path("a.y"));

        tree.apply(
            &path("a"),
            &MergePatch::map([("x", leaf_patch(9))]),
            ApplyMode::Merge,
        )
        .unwrap();
        assert_eq!(tree.version_at(&path("a.y")), y_v);
        assert_eq!(tree.get(&path("a.y")), Some(Value::Int(2)));
    }

    #[test]
    fn descent_through_leaf_obstructed() {
        let mut tree = StateTree::new();
        tree.apply(&path("a"), &leaf_patch(1), ApplyMode::Merge)
            .unwrap();
        let err = tree
            .apply(&path("a.b.c"), &leaf_patch(2), ApplyMode::Merge)
            .unwrap_err();
        assert_eq!(
            err,
            MergeError::PathObstructed { path: path("a") }
        );
        // Failure left nothing behind.
        assert_eq!(tree.get(&path("a")), Some(Value::Int(1)));
    }

    #[test]
    fn append_only_adds_but_never_overwrites() {
        let mut tree = StateTree::new();
        tree.apply(
            &path("log"),
            &MergePatch::map([("e1", leaf_patch(1))]),
            ApplyMode::AppendOnly,
        )
        .unwrap();
        tree.apply(
            &path("log"),
            &MergePatch::map([("e2", leaf_patch(2))]),
            ApplyMode::AppendOnly,
        )
        .unwrap();

        let err = tree
            .apply(
                &path("log"),
                &MergePatch::map([("e1", leaf_patch(9))]),
                ApplyMode::AppendOnly,
            )
            .unwrap_err();
        assert_eq!(
            err,
            MergeError::AppendOverwrite {
                path: path("log.e1")
            }
        );
        assert_eq!(tree.get(&path("log.e1")), Some(Value::Int(1)));
    }

    #[test]
    fn append_only_identical_value_is_noop() {
        let mut tree = StateTree::new();
        tree.apply(
            &path("log"),
            &MergePatch::map([("e1", leaf_patch(1))]),
            ApplyMode::AppendOnly,
        )
        .unwrap();
        let outcome = tree
            .apply(
                &path("log"),
                &MergePatch::map([("e1", leaf_patch(1))]),
                ApplyMode::AppendOnly,
            )
            .unwrap();
        assert_eq!(outcome.changed, 0);
    }

    #[test]
    fn leaf_overwrites_map() {
        let mut tree = StateTree::new();
        tree.apply(&path("a.b"), &leaf_patch(1), ApplyMode::Merge)
            .unwrap();
        tree.apply(&path("a"), &leaf_patch(7), ApplyMode::Merge)
            .unwrap();
        assert_eq!(tree.get(&path("a")), Some(Value::Int(7)));
        assert_eq!(tree.get(&path("a.b")), None);
    }
}
