//! The [`UnitRegistry`]: execution-unit identities and their roles.

use std::sync::RwLock;

use indexmap::IndexMap;

use warden_core::{AccessOp, GuardError, UnitId};

/// What a registered execution unit is allowed to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Read, attach, and snapshot only.
    Observer,
    /// Everything an observer can do, plus writes and allocation.
    Worker,
    /// Everything a worker can do, plus zone registration.
    Supervisor,
}

impl Role {
    /// Whether the role permits an access operation.
    pub fn permits(&self, op: AccessOp) -> bool {
        match op {
            AccessOp::Read | AccessOp::Attach | AccessOp::Snapshot => true,
            AccessOp::Write => matches!(self, Self::Worker | Self::Supervisor),
        }
    }
}

/// Registered execution units, keyed by [`UnitId`].
///
/// Units register and deregister at runtime while other units are mid
/// access, so the map lives behind a `RwLock`. Role lookups take the
/// read lock only.
#[derive(Debug, Default)]
pub struct UnitRegistry {
    units: RwLock<IndexMap<UnitId, Role>>,
}

impl UnitRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh unit under `role` and return its ID.
    pub fn register(&self, role: Role) -> UnitId {
        let unit = UnitId::next();
        self.units.write().unwrap().insert(unit, role);
        unit
    }

    /// Register (or re-role) a specific unit ID.
    pub fn register_as(&self, unit: UnitId, role: Role) {
        self.units.write().unwrap().insert(unit, role);
    }

    /// Remove a unit. Outstanding buffer attachments are unaffected;
    /// the pool tracks those independently.
    pub fn deregister(&self, unit: UnitId) -> bool {
        self.units.write().unwrap().shift_remove(&unit).is_some()
    }

    /// The unit's role, if registered.
    pub fn role_of(&self, unit: UnitId) -> Option<Role> {
        self.units.read().unwrap().get(&unit).copied()
    }

    /// Check that `unit` is registered and its role permits `op`.
    pub fn authorize(&self, unit: UnitId, op: AccessOp) -> Result<Role, GuardError> {
        let role = self
            .role_of(unit)
            .ok_or(GuardError::UnknownUnit { unit })?;
        if !role.permits(op) {
            return Err(GuardError::OperationDenied { unit, op });
        }
        Ok(role)
    }

    /// Number of registered units.
    pub fn len(&self) -> usize {
        self.units.read().unwrap().len()
    }

    /// Whether no units are registered.
    pub fn is_empty(&self) -> bool {
        self.units.read().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observer_cannot_write() {
        let units = UnitRegistry::new();
        let unit = units.register(Role::Observer);
        assert!(units.authorize(unit, AccessOp::Read).is_ok());
        assert!(units.authorize(unit, AccessOp::Attach).is_ok());
        assert_eq!(
            units.authorize(unit, AccessOp::Write),
            Err(GuardError::OperationDenied {
                unit,
                op: AccessOp::Write
            })
        );
    }

    #[test]
    fn unknown_unit_rejected() {
        let units = UnitRegistry::new();
        let ghost = UnitId::next();
        assert_eq!(
            units.authorize(ghost, AccessOp::Read),
            Err(GuardError::UnknownUnit { unit: ghost })
        );
    }

    #[test]
    fn deregistered_unit_loses_access() {
        let units = UnitRegistry::new();
        let unit = units.register(Role::Worker);
        assert!(units.authorize(unit, AccessOp::Write).is_ok());
        assert!(units.deregister(unit));
        assert!(!units.deregister(unit));
        assert_eq!(
            units.authorize(unit, AccessOp::Write),
            Err(GuardError::UnknownUnit { unit })
        );
    }

    #[test]
    fn reregistering_changes_role() {
        let units = UnitRegistry::new();
        let unit = units.register(Role::Observer);
        units.register_as(unit, Role::Worker);
        assert_eq!(units.role_of(unit), Some(Role::Worker));
        assert!(units.authorize(unit, AccessOp::Write).is_ok());
    }
}
