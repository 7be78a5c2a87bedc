//! Per-access guard context: what the outer layers established about a
//! request before the field guard executes it.

use warden_core::{Mutability, Path, UnitId};
use warden_zone::ResolvedZone;

/// State the context guard establishes for one access: the requesting
/// unit and the zone governing the target path.
#[derive(Clone, Debug)]
pub struct GuardContext {
    /// The requesting unit.
    pub unit: UnitId,
    /// The resolved zone: prefix, contract, generation.
    pub zone: ResolvedZone,
}

impl GuardContext {
    /// Build a context for a resolved access.
    pub fn new(unit: UnitId, zone: ResolvedZone) -> Self {
        Self { unit, zone }
    }

    /// Whether the governing contract rejects undeclared keys.
    pub fn strict(&self) -> bool {
        self.zone.contract.strict
    }

    /// The governing zone's mutability policy.
    pub fn mutability(&self) -> Mutability {
        self.zone.contract.mutability
    }

    /// The target path's segments below the zone prefix.
    pub fn remainder(&self, path: &Path) -> Path {
        self.zone.remainder(path)
    }
}
