//! The [`MergeEngine`]: synchronized proposals against the state tree.
//!
//! The engine owns the tree behind a `RwLock`. Reads take the read lock
//! and copy out; a proposal's version check, structural merge, and
//! commit all happen inside one write-locked critical section, which is
//! what linearizes writers per path — of two concurrent proposals
//! carrying the same base version, the second to enter observes the
//! first's bump and fails with a stale-write conflict.

use std::sync::RwLock;

use crossbeam_channel::{Receiver, Sender};

use warden_buffer::BufferPool;
use warden_core::{BufferError, CommitEvent, MergeError, Path, Value, Version};

use crate::merge::PendingMerge;
use crate::plain::PlainValue;
use crate::tree::{ApplyMode, StateTree};

/// Acknowledgment of a committed (or no-op) proposal.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct CommitReceipt {
    /// The proposal's target path.
    pub path: Path,
    /// The target's version after the proposal.
    pub version: Version,
    /// Number of nodes the commit changed; zero for an idempotent
    /// no-op, which emits no event and bumps nothing.
    pub changed: usize,
}

/// Applies structured partial updates to the state tree with
/// optimistic-concurrency conflict detection.
///
/// Commit events are emitted over a bounded crossbeam channel, at most
/// once per committed write, synchronously before `propose` returns.
/// Emission never blocks the commit path: a full or disconnected
/// channel drops the event. The engine never holds subscriber state.
pub struct MergeEngine {
    tree: RwLock<StateTree>,
    events: Option<Sender<CommitEvent>>,
}

// Compile-time assertion: the engine is shared across units.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<MergeEngine>();
};

impl MergeEngine {
    /// Create an engine over an empty tree, with no event channel.
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(StateTree::new()),
            events: None,
        }
    }

    /// Create an engine that emits commit events over a channel holding
    /// at most `bound` undelivered events, returning the receiving end.
    pub fn with_events(bound: usize) -> (Self, Receiver<CommitEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(bound);
        (
            Self {
                tree: RwLock::new(StateTree::new()),
                events: Some(tx),
            },
            rx,
        )
    }

    /// Propose a merge under the freely-mutable policy.
    pub fn propose(&self, merge: &PendingMerge) -> Result<CommitReceipt, MergeError> {
        self.propose_with_mode(merge, ApplyMode::Merge)
    }

    /// Propose a merge under an explicit apply mode.
    ///
    /// The guard chain selects [`ApplyMode::AppendOnly`] for
    /// append-only zones so the policy check commits atomically with
    /// the merge.
    pub fn propose_with_mode(
        &self,
        merge: &PendingMerge,
        mode: ApplyMode,
    ) -> Result<CommitReceipt, MergeError> {
        let receipt = {
            let mut tree = self.tree.write().unwrap();
            let current = tree.version_at(&merge.path);
            if current != merge.base_version {
                return Err(MergeError::StaleWriteConflict {
                    path: merge.path.clone(),
                    expected: merge.base_version,
                    found: current,
                });
            }
            let outcome = tree.apply(&merge.path, &merge.patch, mode)?;
            CommitReceipt {
                path: merge.path.clone(),
                version: outcome.version,
                changed: outcome.changed,
            }
        };

        // Emitted after the commit is visible, before propose returns.
        // A full or disconnected channel drops the event rather than
        // stalling the writer.
        if receipt.changed > 0 {
            if let Some(events) = &self.events {
                let _ = events.try_send(CommitEvent {
                    path: receipt.path.clone(),
                    version: receipt.version,
                });
            }
        }
        Ok(receipt)
    }

    /// Copy out the leaf value at `path`.
    pub fn read(&self, path: &Path) -> Option<Value> {
        self.tree.read().unwrap().get(path)
    }

    /// Whether any node exists at `path`.
    pub fn contains(&self, path: &Path) -> bool {
        self.tree.read().unwrap().contains(path)
    }

    /// The version counter at `path` (0 for a missing path).
    pub fn version_at(&self, path: &Path) -> Version {
        self.tree.read().unwrap().version_at(path)
    }

    /// Plain-structure snapshot of the subtree at `path`.
    ///
    /// Read-only: no version counter or reference count moves.
    pub fn snapshot(
        &self,
        path: &Path,
        pool: &BufferPool,
    ) -> Result<Option<PlainValue>, BufferError> {
        self.tree.read().unwrap().snapshot(path, pool)
    }
}

impl Default for MergeEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::MergePatch;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    fn path(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    fn patch(key: &str, v: i64) -> MergePatch {
        MergePatch::map([(key, MergePatch::leaf(Value::Int(v)))])
    }

    #[test]
    fn commit_bumps_and_emits() {
        let (engine, events) = MergeEngine::with_events(8);
        let merge = PendingMerge::new(path("a"), patch("b", 1), Version::ZERO);
        let receipt = engine.propose(&merge).unwrap();
        assert_eq!(receipt.version, Version(1));
        assert_eq!(receipt.changed, 1);

        let event = events.try_recv().unwrap();
        assert_eq!(event.path, path("a"));
        assert_eq!(event.version, Version(1));
    }

    #[test]
    fn stale_base_rejected() {
        let engine = MergeEngine::new();
        engine
            .propose(&PendingMerge::new(path("a"), patch("b", 1), Version::ZERO))
            .unwrap();

        // A second proposal still carrying base version 0.
        let err = engine
            .propose(&PendingMerge::new(path("a"), patch("b", 2), Version::ZERO))
            .unwrap_err();
        assert_eq!(
            err,
            MergeError::StaleWriteConflict {
                path: path("a"),
                expected: Version::ZERO,
                found: Version(1),
            }
        );
        assert_eq!(engine.read(&path("a.b")), Some(Value::Int(1)));
    }

    #[test]
    fn refreshed_base_retries_successfully() {
        let engine = MergeEngine::new();
        engine
            .propose(&PendingMerge::new(path("a"), patch("b", 1), Version::ZERO))
            .unwrap();
        let base = engine.version_at(&path("a"));
        let receipt = engine
            .propose(&PendingMerge::new(path("a"), patch("b", 2), base))
            .unwrap();
        assert_eq!(receipt.version, Version(2));
        assert_eq!(engine.read(&path("a.b")), Some(Value::Int(2)));
    }

    #[test]
    fn idempotent_repropose_is_noop_without_event() {
        let (engine, events) = MergeEngine::with_events(8);
        let receipt = engine
            .propose(&PendingMerge::new(path("a"), patch("b", 1), Version::ZERO))
            .unwrap();
        let _ = events.try_recv().unwrap();

        let again = engine
            .propose(&PendingMerge::new(path("a"), patch("b", 1), receipt.version))
            .unwrap();
        assert_eq!(again.changed, 0);
        assert_eq!(again.version, receipt.version);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn same_content_different_shape_is_new_merge() {
        let engine = MergeEngine::new();
        let receipt = engine
            .propose(&PendingMerge::new(path("a"), patch("b", 1), Version::ZERO))
            .unwrap();
        let changed = engine
            .propose(&PendingMerge::new(path("a"), patch("b", 7), receipt.version))
            .unwrap();
        assert!(changed.changed > 0);
        assert!(changed.version > receipt.version);
    }

    #[test]
    fn concurrent_same_base_has_one_winner() {
        let engine = Arc::new(MergeEngine::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                engine
                    .propose(&PendingMerge::new(
                        path("contested"),
                        patch("value", i),
                        Version::ZERO,
                    ))
                    .is_ok()
            }));
        }
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(engine.version_at(&path("contested")), Version(1));
    }

    #[test]
    fn disjoint_paths_do_not_conflict() {
        let engine = MergeEngine::new();
        engine
            .propose(&PendingMerge::new(path("a"), patch("x", 1), Version::ZERO))
            .unwrap();
        engine
            .propose(&PendingMerge::new(path("b"), patch("y", 2), Version::ZERO))
            .unwrap();
        assert_eq!(engine.read(&path("a.x")), Some(Value::Int(1)));
        assert_eq!(engine.read(&path("b.y")), Some(Value::Int(2)));
    }

    #[test]
    fn dropped_receiver_does_not_block_commits() {
        let (engine, events) = MergeEngine::with_events(8);
        drop(events);
        engine
            .propose(&PendingMerge::new(path("a"), patch("b", 1), Version::ZERO))
            .unwrap();
    }

    #[test]
    fn full_event_channel_drops_instead_of_blocking() {
        let (engine, events) = MergeEngine::with_events(1);
        engine
            .propose(&PendingMerge::new(path("a"), patch("x", 1), Version::ZERO))
            .unwrap();
        // The single slot is occupied, so this commit's event is shed.
        let receipt = engine
            .propose(&PendingMerge::new(path("a"), patch("y", 2), Version(1)))
            .unwrap();
        assert_eq!(receipt.version, Version(2));
        let event = events.try_recv().unwrap();
        assert_eq!(event.version, Version(1));
        assert!(events.try_recv().is_err());
    }

    proptest! {
        #[test]
        fn reapplying_an_identical_patch_changes_nothing(
            keys in prop::collection::hash_set("[a-z]{1,6}", 1..5usize),
            v in any::<i64>(),
        ) {
            let engine = MergeEngine::new();
            let entries: Vec<_> = keys
                .iter()
                .map(|k| (k.as_str(), MergePatch::leaf(Value::Int(v))))
                .collect();
            let patch = MergePatch::map(entries);
            let first = engine
                .propose(&PendingMerge::new(path("zone"), patch.clone(), Version::ZERO))
                .unwrap();
            prop_assert_eq!(first.changed, keys.len());
            let again = engine
                .propose(&PendingMerge::new(path("zone"), patch, first.version))
                .unwrap();
            prop_assert_eq!(again.changed, 0);
            prop_assert_eq!(again.version, first.version);
        }

        #[test]
        fn versions_never_move_backwards(
            writes in prop::collection::vec(("[a-z]{1,4}", any::<i64>()), 1..12),
        ) {
            let engine = MergeEngine::new();
            let mut last = Version::ZERO;
            for (key, v) in writes {
                let merge = PendingMerge::new(
                    path("zone"),
                    MergePatch::map([(key.as_str(), MergePatch::leaf(Value::Int(v)))]),
                    last,
                );
                let receipt = engine.propose(&merge).unwrap();
                if receipt.changed > 0 {
                    prop_assert_eq!(receipt.version, last.bumped());
                } else {
                    prop_assert_eq!(receipt.version, last);
                }
                last = receipt.version;
            }
        }
    }
}
