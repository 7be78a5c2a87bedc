//! The [`ZoneRegistry`]: prefix-keyed zone contracts with longest-prefix
//! resolution.
//!
//! Every path falls under exactly one zone. Resolution walks the path
//! root-to-leaf, one segment at a time, keeping the deepest registered
//! prefix — cost is proportional to path depth, the acknowledged
//! overhead relative to direct single-key access.

use std::sync::Arc;

use indexmap::IndexMap;

use warden_core::{Path, RegistryError, ZoneContract, ZoneGeneration, ZoneSpec};

/// One registered zone: its contract plus the generation it was
/// registered under.
#[derive(Clone, Debug)]
struct RegisteredZone {
    contract: Arc<ZoneContract>,
    generation: ZoneGeneration,
}

/// The outcome of resolving a path to its governing zone.
#[derive(Clone, Debug)]
pub struct ResolvedZone {
    /// The matched zone's prefix. For a synthetic fallback this is the
    /// root path.
    pub prefix: Path,
    /// The governing contract.
    pub contract: Arc<ZoneContract>,
    /// Generation of the registration the contract belongs to.
    pub generation: ZoneGeneration,
    /// Whether this is the synthetic open contract for an unregistered
    /// path under a lenient registry.
    pub synthetic: bool,
}

impl ResolvedZone {
    /// The path's segments below the zone prefix.
    ///
    /// The leading remainder segment is the key the contract's
    /// declarations apply to.
    pub fn remainder(&self, path: &Path) -> Path {
        path.strip_prefix(&self.prefix).unwrap_or_else(Path::root)
    }
}

/// Registry of zone contracts, keyed by path prefix.
///
/// Contracts are immutable once registered; [`reregister`] replaces a
/// contract under a fresh [`ZoneGeneration`]. Buffer handles issued
/// under the old generation remain valid until their attachments drain.
///
/// [`reregister`]: ZoneRegistry::reregister
pub struct ZoneRegistry {
    zones: IndexMap<Path, RegisteredZone>,
    default_strict: bool,
}

impl ZoneRegistry {
    /// Create an empty registry.
    ///
    /// `default_strict` controls what happens when a path matches no
    /// registered zone: lenient registries synthesize an open contract,
    /// strict registries fail resolution with
    /// [`RegistryError::UnguardedPath`].
    pub fn new(default_strict: bool) -> Self {
        Self {
            zones: IndexMap::new(),
            default_strict,
        }
    }

    /// Build a registry from configuration data.
    pub fn from_specs(specs: &[ZoneSpec], default_strict: bool) -> Result<Self, RegistryError> {
        let mut registry = Self::new(default_strict);
        for spec in specs {
            registry.register(spec.prefix.clone(), spec.contract.clone())?;
        }
        Ok(registry)
    }

    /// Whether unmatched paths fail resolution.
    pub fn default_strict(&self) -> bool {
        self.default_strict
    }

    /// Register a zone.
    ///
    /// Registering an identical contract at an existing prefix is
    /// idempotent and returns the existing generation; any other
    /// contract at an existing prefix fails with
    /// [`RegistryError::ContractConflict`] (replacement goes through
    /// [`reregister`](ZoneRegistry::reregister)). A nested prefix whose
    /// contract is incompatible with the enclosing zone's also fails
    /// with `ContractConflict`.
    pub fn register(
        &mut self,
        prefix: Path,
        contract: ZoneContract,
    ) -> Result<ZoneGeneration, RegistryError> {
        if let Some(existing) = self.zones.get(&prefix) {
            if *existing.contract == contract {
                return Ok(existing.generation);
            }
            return Err(RegistryError::ContractConflict {
                prefix: prefix.clone(),
                existing: prefix,
            });
        }
        for (existing_prefix, existing) in &self.zones {
            let overlaps =
                prefix.starts_with(existing_prefix) || existing_prefix.starts_with(&prefix);
            if overlaps && !contract.is_compatible_with(&existing.contract) {
                return Err(RegistryError::ContractConflict {
                    prefix,
                    existing: existing_prefix.clone(),
                });
            }
        }
        let generation = ZoneGeneration::default();
        self.zones.insert(
            prefix,
            RegisteredZone {
                contract: Arc::new(contract),
                generation,
            },
        );
        Ok(generation)
    }

    /// Replace the contract at an already-registered prefix under a
    /// fresh generation.
    ///
    /// The replacement contract must still be compatible with every
    /// *other* overlapping zone. Fails with
    /// [`RegistryError::UnguardedPath`] if the prefix was never
    /// registered.
    pub fn reregister(
        &mut self,
        prefix: &Path,
        contract: ZoneContract,
    ) -> Result<ZoneGeneration, RegistryError> {
        if !self.zones.contains_key(prefix) {
            return Err(RegistryError::UnguardedPath {
                path: prefix.clone(),
            });
        }
        for (existing_prefix, existing) in &self.zones {
            if existing_prefix == prefix {
                continue;
            }
            let overlaps =
                prefix.starts_with(existing_prefix) || existing_prefix.starts_with(prefix);
            if overlaps && !contract.is_compatible_with(&existing.contract) {
                return Err(RegistryError::ContractConflict {
                    prefix: prefix.clone(),
                    existing: existing_prefix.clone(),
                });
            }
        }
        let zone = self
            .zones
            .get_mut(prefix)
            .expect("presence checked above");
        zone.generation = zone.generation.bumped();
        zone.contract = Arc::new(contract);
        Ok(zone.generation)
    }

    /// Resolve the zone governing a path (longest-prefix match).
    ///
    /// Walks the path root-to-leaf, keeping the deepest registered
    /// prefix. A miss yields a synthetic open contract under a lenient
    /// registry, or [`RegistryError::UnguardedPath`] under a strict one.
    pub fn resolve(&self, path: &Path) -> Result<ResolvedZone, RegistryError> {
        let mut best: Option<(Path, &RegisteredZone)> = self
            .zones
            .get(&Path::root())
            .map(|z| (Path::root(), z));

        let mut prefix = Path::root();
        for segment in path.segments() {
            prefix = prefix.child(segment);
            if let Some(zone) = self.zones.get(&prefix) {
                best = Some((prefix.clone(), zone));
            }
        }

        match best {
            Some((matched, zone)) => Ok(ResolvedZone {
                prefix: matched,
                contract: Arc::clone(&zone.contract),
                generation: zone.generation,
                synthetic: false,
            }),
            None if !self.default_strict => Ok(ResolvedZone {
                prefix: Path::root(),
                contract: Arc::new(ZoneContract::open()),
                generation: ZoneGeneration::default(),
                synthetic: true,
            }),
            None => Err(RegistryError::UnguardedPath { path: path.clone() }),
        }
    }

    /// Iterate registered zones as `(prefix, contract, generation)`.
    pub fn zones(&self) -> impl Iterator<Item = (&Path, &ZoneContract, ZoneGeneration)> {
        self.zones
            .iter()
            .map(|(p, z)| (p, z.contract.as_ref(), z.generation))
    }

    /// Number of registered zones.
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// Whether no zones are registered.
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use proptest::prelude::*;
    use warden_core::{DeclaredKeys, Mutability, ValueType};

    fn path(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    fn declared(keys: &[(&str, ValueType)], mutability: Mutability, strict: bool) -> ZoneContract {
        let map: IndexMap<String, ValueType> = keys
            .iter()
            .map(|(k, t)| (k.to_string(), t.clone()))
            .collect();
        ZoneContract {
            keys: DeclaredKeys::Declared(map),
            mutability,
            strict,
        }
    }

    #[test]
    fn incompatible_overlap_conflicts() {
        let mut reg = ZoneRegistry::new(false);
        reg.register(path("sim"), ZoneContract::open()).unwrap();
        // An open parent overlaps incompatibly with any declared child zone.
        let err = reg
            .register(
                path("sim.metrics"),
                declared(&[("count", ValueType::Int)], Mutability::ReadOnly, true),
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::ContractConflict { .. }));
    }

    #[test]
    fn disjoint_prefixes_register_freely() {
        let mut reg = ZoneRegistry::new(false);
        reg.register(
            path("metrics"),
            declared(&[("count", ValueType::Int)], Mutability::ReadOnly, true),
        )
        .unwrap();
        reg.register(
            path("scratch"),
            declared(&[("note", ValueType::Text)], Mutability::Mutable, false),
        )
        .unwrap();
        assert_eq!(reg.len(), 2);

        let resolved = reg.resolve(&path("metrics.count")).unwrap();
        assert_eq!(resolved.prefix, path("metrics"));
        assert!(!resolved.synthetic);
    }

    #[test]
    fn nested_compatible_zones_resolve_deepest() {
        let mut reg = ZoneRegistry::new(false);
        reg.register(
            path("sim"),
            declared(&[("meta", ValueType::Text)], Mutability::Mutable, true),
        )
        .unwrap();
        reg.register(
            path("sim.grid"),
            declared(
                &[("cells", ValueType::Map)],
                Mutability::Mutable,
                true,
            ),
        )
        .unwrap();

        let resolved = reg.resolve(&path("sim.grid.cells")).unwrap();
        assert_eq!(resolved.prefix, path("sim.grid"));
        assert_eq!(resolved.remainder(&path("sim.grid.cells")), path("cells"));
    }

    #[test]
    fn lenient_miss_synthesizes_open_contract() {
        let reg = ZoneRegistry::new(false);
        let resolved = reg.resolve(&path("anything.goes")).unwrap();
        assert!(resolved.synthetic);
        assert_eq!(*resolved.contract, ZoneContract::open());
    }

    #[test]
    fn strict_miss_fails_unguarded() {
        let reg = ZoneRegistry::new(true);
        let err = reg.resolve(&path("anything.goes")).unwrap_err();
        assert!(matches!(err, RegistryError::UnguardedPath { .. }));
    }

    #[test]
    fn identical_reregistration_is_idempotent() {
        let mut reg = ZoneRegistry::new(false);
        let contract = declared(&[("count", ValueType::Int)], Mutability::ReadOnly, true);
        let g1 = reg.register(path("metrics"), contract.clone()).unwrap();
        let g2 = reg.register(path("metrics"), contract).unwrap();
        assert_eq!(g1, g2);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn same_prefix_different_contract_conflicts() {
        let mut reg = ZoneRegistry::new(false);
        reg.register(
            path("cfg"),
            declared(&[("x", ValueType::Float)], Mutability::Mutable, true),
        )
        .unwrap();
        // A different contract at the same prefix is never silently
        // discarded; replacement goes through reregister.
        let err = reg
            .register(
                path("cfg"),
                declared(&[("y", ValueType::Int)], Mutability::Mutable, true),
            )
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::ContractConflict {
                prefix: path("cfg"),
                existing: path("cfg"),
            }
        );
        let resolved = reg.resolve(&path("cfg.x")).unwrap();
        assert!(resolved.contract.keys.contains("x"));
    }

    #[test]
    fn reregister_bumps_generation() {
        let mut reg = ZoneRegistry::new(false);
        let g0 = reg
            .register(
                path("metrics"),
                declared(&[("count", ValueType::Int)], Mutability::ReadOnly, true),
            )
            .unwrap();
        let g1 = reg
            .reregister(
                &path("metrics"),
                declared(&[("count", ValueType::Int)], Mutability::Mutable, true),
            )
            .unwrap();
        assert_eq!(g1, g0.bumped());
        let resolved = reg.resolve(&path("metrics.count")).unwrap();
        assert_eq!(resolved.generation, g1);
        assert_eq!(resolved.contract.mutability, Mutability::Mutable);
    }

    #[test]
    fn reregister_unknown_prefix_fails() {
        let mut reg = ZoneRegistry::new(false);
        let err = reg
            .reregister(&path("missing"), ZoneContract::open())
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnguardedPath { .. }));
    }

    proptest! {
        #[test]
        fn resolution_picks_the_deepest_registered_prefix(
            registered in 1usize..5,
            extra in 1usize..4,
        ) {
            let mut reg = ZoneRegistry::new(false);
            for depth in 1..=registered {
                let prefix = Path::from_segments((0..depth).map(|_| "z"));
                reg.register(prefix, ZoneContract::open()).unwrap();
            }
            let target = Path::from_segments((0..registered + extra).map(|_| "z"));
            let resolved = reg.resolve(&target).unwrap();
            prop_assert_eq!(resolved.prefix.depth(), registered);
            prop_assert!(!resolved.synthetic);
        }
    }

    #[test]
    fn from_specs_builds_registry() {
        let specs = vec![ZoneSpec {
            prefix: path("metrics"),
            contract: declared(&[("count", ValueType::Int)], Mutability::ReadOnly, true),
        }];
        let reg = ZoneRegistry::from_specs(&specs, false).unwrap();
        assert_eq!(reg.len(), 1);
        assert!(reg.resolve(&path("metrics.count")).is_ok());
    }
}
