//! Zone contracts: declared keys, mutability policies, and access ops.
//!
//! A zone is a path prefix plus a contract describing what lives under
//! it: which child keys are allowed (or "open"), the value type per key,
//! and the mutability policy. Contracts are registration data — plain,
//! immutable structs supplied at registry construction.

use std::fmt;

use indexmap::IndexMap;

use crate::path::Path;
use crate::value::ValueType;

/// The kind of operation an execution unit requests against the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessOp {
    /// Copy-on-read fetch of a value.
    Read,
    /// Structured partial update through the merge engine.
    Write,
    /// Zero-copy attachment to a buffer segment.
    Attach,
    /// Read-only plain-structure extraction of a subtree.
    Snapshot,
}

impl fmt::Display for AccessOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Attach => "attach",
            Self::Snapshot => "snapshot",
        };
        write!(f, "{name}")
    }
}

/// Mutability policy of a zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutability {
    /// No writes permitted after registration.
    ReadOnly,
    /// Writes may add absent keys but never overwrite existing values.
    AppendOnly,
    /// Writes may add and overwrite freely.
    Mutable,
}

impl fmt::Display for Mutability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadOnly => "read-only",
            Self::AppendOnly => "append-only",
            Self::Mutable => "mutable",
        };
        write!(f, "{name}")
    }
}

/// Which child keys a zone admits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclaredKeys {
    /// Any key is admitted; values are type-checked only against their
    /// own runtime shape.
    Open,
    /// Only the listed keys are admitted under strict mode; each key
    /// carries its declared value type. Under lenient mode, unlisted
    /// keys are admitted as free-form extensions.
    Declared(IndexMap<String, ValueType>),
}

impl DeclaredKeys {
    /// Look up the declared type for a leading key, if any.
    pub fn key_type(&self, key: &str) -> Option<&ValueType> {
        match self {
            Self::Open => None,
            Self::Declared(keys) => keys.get(key),
        }
    }

    /// Whether a key is explicitly declared.
    pub fn contains(&self, key: &str) -> bool {
        matches!(self, Self::Declared(keys) if keys.contains_key(key))
    }
}

/// The access contract of one zone.
///
/// Immutable once registered for the lifetime of the owning generation;
/// changing a contract requires re-registration under a fresh
/// [`ZoneGeneration`](crate::id::ZoneGeneration).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoneContract {
    /// Admitted child keys and their declared types.
    pub keys: DeclaredKeys,
    /// Write policy for the zone.
    pub mutability: Mutability,
    /// Strict mode rejects any key not listed in `keys`; lenient mode
    /// admits undeclared keys as free-form extensions.
    pub strict: bool,
}

impl ZoneContract {
    /// The synthetic contract governing paths outside every registered
    /// zone when the registry's default mode is lenient.
    pub fn open() -> Self {
        Self {
            keys: DeclaredKeys::Open,
            mutability: Mutability::Mutable,
            strict: false,
        }
    }

    /// Whether two contracts may govern overlapping prefixes.
    ///
    /// Equal contracts are always compatible (re-registration of the
    /// same zone is a no-op at the caller's level). Otherwise two
    /// overlapping contracts are compatible only when both declare key
    /// sets and the sets are disjoint, so that no single key falls under
    /// two conflicting declarations.
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        if self == other {
            return true;
        }
        match (&self.keys, &other.keys) {
            (DeclaredKeys::Declared(a), DeclaredKeys::Declared(b)) => {
                self.mutability == other.mutability && a.keys().all(|k| !b.contains_key(k))
            }
            _ => false,
        }
    }
}

/// One zone registration supplied as configuration data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoneSpec {
    /// Path prefix identifying the zone.
    pub prefix: Path,
    /// The zone's contract.
    pub contract: ZoneContract,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Dtype;

    fn declared(keys: &[(&str, ValueType)]) -> DeclaredKeys {
        DeclaredKeys::Declared(
            keys.iter()
                .map(|(k, t)| (k.to_string(), t.clone()))
                .collect(),
        )
    }

    #[test]
    fn key_type_lookup() {
        let keys = declared(&[("count", ValueType::Int)]);
        assert_eq!(keys.key_type("count"), Some(&ValueType::Int));
        assert_eq!(keys.key_type("other"), None);
        assert!(keys.contains("count"));
        assert!(!DeclaredKeys::Open.contains("count"));
    }

    #[test]
    fn equal_contracts_compatible() {
        let c = ZoneContract {
            keys: declared(&[("x", ValueType::Float)]),
            mutability: Mutability::Mutable,
            strict: true,
        };
        assert!(c.is_compatible_with(&c.clone()));
    }

    #[test]
    fn disjoint_declared_keys_compatible() {
        let a = ZoneContract {
            keys: declared(&[("x", ValueType::Float)]),
            mutability: Mutability::Mutable,
            strict: true,
        };
        let b = ZoneContract {
            keys: declared(&[("y", ValueType::Int)]),
            mutability: Mutability::Mutable,
            strict: false,
        };
        assert!(a.is_compatible_with(&b));
    }

    #[test]
    fn clashing_keys_incompatible() {
        let a = ZoneContract {
            keys: declared(&[("x", ValueType::Float)]),
            mutability: Mutability::Mutable,
            strict: true,
        };
        let b = ZoneContract {
            keys: declared(&[("x", ValueType::Int)]),
            mutability: Mutability::Mutable,
            strict: true,
        };
        assert!(!a.is_compatible_with(&b));
    }

    #[test]
    fn open_overlap_incompatible() {
        let a = ZoneContract::open();
        let b = ZoneContract {
            keys: declared(&[(
                "grid",
                ValueType::Buffer {
                    dtype: Dtype::F32,
                    shape: None,
                },
            )]),
            mutability: Mutability::ReadOnly,
            strict: true,
        };
        assert!(!a.is_compatible_with(&b));
    }

    #[test]
    fn differing_mutability_incompatible() {
        let a = ZoneContract {
            keys: declared(&[("x", ValueType::Float)]),
            mutability: Mutability::ReadOnly,
            strict: true,
        };
        let b = ZoneContract {
            keys: declared(&[("y", ValueType::Float)]),
            mutability: Mutability::Mutable,
            strict: true,
        };
        assert!(!a.is_compatible_with(&b));
    }
}
