//! Access requests and outcomes: the uniform interface the guard chain
//! operates over.

use warden_buffer::Attachment;
use warden_core::{AccessOp, Path, UnitId, Value, Version};
use warden_tree::{CommitReceipt, MergePatch, PlainValue};

/// What an access request asks for.
#[derive(Clone, Debug, PartialEq)]
pub enum AccessKind {
    /// Copy-on-read fetch of the value at the path.
    Read,
    /// Structured partial update proposed against a base version.
    Write {
        /// The proposed subtree.
        patch: MergePatch,
        /// Version observed at the target when the update was computed.
        base_version: Version,
    },
    /// Zero-copy attachment to the buffer handle stored at the path.
    Attach,
    /// Plain-structure extraction of the subtree at the path.
    Snapshot,
}

impl AccessKind {
    /// The operation category, for role and policy checks.
    pub fn op(&self) -> AccessOp {
        match self {
            Self::Read => AccessOp::Read,
            Self::Write { .. } => AccessOp::Write,
            Self::Attach => AccessOp::Attach,
            Self::Snapshot => AccessOp::Snapshot,
        }
    }
}

/// One access by one execution unit against one path.
#[derive(Clone, Debug, PartialEq)]
pub struct AccessRequest {
    /// The requesting unit.
    pub unit: UnitId,
    /// The target path.
    pub path: Path,
    /// What is being asked for.
    pub kind: AccessKind,
}

impl AccessRequest {
    /// Build a read request.
    pub fn read(unit: UnitId, path: Path) -> Self {
        Self {
            unit,
            path,
            kind: AccessKind::Read,
        }
    }

    /// Build a write request.
    pub fn write(unit: UnitId, path: Path, patch: MergePatch, base_version: Version) -> Self {
        Self {
            unit,
            path,
            kind: AccessKind::Write {
                patch,
                base_version,
            },
        }
    }

    /// Build an attach request.
    pub fn attach(unit: UnitId, path: Path) -> Self {
        Self {
            unit,
            path,
            kind: AccessKind::Attach,
        }
    }

    /// Build a snapshot request.
    pub fn snapshot(unit: UnitId, path: Path) -> Self {
        Self {
            unit,
            path,
            kind: AccessKind::Snapshot,
        }
    }

    /// The operation category.
    pub fn op(&self) -> AccessOp {
        self.kind.op()
    }
}

/// The successful result of an access.
///
/// The lifetime ties an [`Attachment`] to the pool that issued it; the
/// other arms are owned data.
#[must_use]
#[derive(Debug)]
pub enum AccessOutcome<'p> {
    /// A read's copied-out value.
    Value(Value),
    /// A write's commit acknowledgment.
    Committed(CommitReceipt),
    /// An attach's scoped zero-copy view.
    Attached(Attachment<'p>),
    /// A snapshot's plain structure.
    Snapshot(PlainValue),
}

impl<'p> AccessOutcome<'p> {
    /// The value, for a read outcome.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The receipt, for a write outcome.
    pub fn into_receipt(self) -> Option<CommitReceipt> {
        match self {
            Self::Committed(r) => Some(r),
            _ => None,
        }
    }

    /// The attachment, for an attach outcome.
    pub fn into_attachment(self) -> Option<Attachment<'p>> {
        match self {
            Self::Attached(a) => Some(a),
            _ => None,
        }
    }

    /// The plain structure, for a snapshot outcome.
    pub fn into_snapshot(self) -> Option<PlainValue> {
        match self {
            Self::Snapshot(s) => Some(s),
            _ => None,
        }
    }
}
