//! Commit events emitted toward the external notification channel.

use crate::id::Version;
use crate::path::Path;

/// Outbound notification of one committed write.
///
/// Emitted exactly once per committed merge, synchronously after commit
/// and before `propose` returns. Delivery to subscribers is the external
/// channel's responsibility; this core never holds subscriber state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitEvent {
    /// The proposal's target path.
    pub path: Path,
    /// The target node's version after the commit.
    pub version: Version,
}
