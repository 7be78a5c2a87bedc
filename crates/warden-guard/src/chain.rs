//! The layered guard chain: supervising, context, and field guards.
//!
//! Each layer checks one concern and delegates inward; an outer
//! rejection short-circuits everything inside it, so a rejected access
//! never touches the tree, the pool, or a reference count.
//!
//! ```text
//! SupervisingGuard   unit registered? op permitted for role?
//!   └── ContextGuard   zone resolved, mutability policy, strict keys
//!         └── FieldGuard   leaf type/shape checks, then dispatch
//! ```
//!
//! The layers compose through two small traits rather than one struct
//! so a test (or an embedding) can splice its own layer in: the outer
//! two implement [`Interceptor`] over the bare request, and the
//! innermost implements [`ScopedInterceptor`], which additionally
//! receives the [`GuardContext`] the context guard established.

use std::sync::{Arc, RwLock};

use warden_buffer::BufferPool;
use warden_core::{
    AccessOp, DeclaredKeys, GuardError, MergeError, Mutability, Path, Value, ValueType,
};
use warden_tree::{ApplyMode, MergeEngine, MergePatch, PendingMerge};
use warden_zone::ZoneRegistry;

use crate::context::GuardContext;
use crate::request::{AccessKind, AccessOutcome, AccessRequest};
use crate::units::UnitRegistry;

/// One layer of the guard chain, operating on a bare access request.
pub trait Interceptor: Send + Sync {
    /// Check the request and either reject it or delegate inward.
    ///
    /// The outcome's lifetime is tied to the chain because an attach
    /// outcome borrows the buffer pool.
    fn handle<'g>(&'g self, request: AccessRequest) -> Result<AccessOutcome<'g>, GuardError>;
}

/// The innermost layer, operating on a request plus the context the
/// outer layers established.
pub trait ScopedInterceptor: Send + Sync {
    /// Execute (or reject) the request under `cx`.
    fn handle_scoped<'g>(
        &'g self,
        request: AccessRequest,
        cx: &GuardContext,
    ) -> Result<AccessOutcome<'g>, GuardError>;
}

/// Outermost layer: validates the requesting unit and its role.
pub struct SupervisingGuard<I> {
    units: Arc<UnitRegistry>,
    next: I,
}

impl<I: Interceptor> SupervisingGuard<I> {
    /// Compose the supervising guard over an inner layer.
    pub fn new(units: Arc<UnitRegistry>, next: I) -> Self {
        Self { units, next }
    }
}

impl<I: Interceptor> Interceptor for SupervisingGuard<I> {
    fn handle<'g>(&'g self, request: AccessRequest) -> Result<AccessOutcome<'g>, GuardError> {
        self.units.authorize(request.unit, request.op())?;
        self.next.handle(request)
    }
}

/// Middle layer: resolves the zone, establishes the [`GuardContext`],
/// and enforces mutability policy and strict-mode key declarations.
///
/// For reads, attaches, and snapshots the target path names the zone.
/// A write is governed by the zone its patch actually lands in: the
/// guard resolves every path the patch touches, so addressing a zone
/// from an ancestor (the root included) cannot bypass its policy. A
/// patch whose touched paths fall under two different zones is rejected
/// with [`GuardError::CrossZoneWrite`].
pub struct ContextGuard<S> {
    registry: Arc<RwLock<ZoneRegistry>>,
    next: S,
}

impl<S: ScopedInterceptor> ContextGuard<S> {
    /// Compose the context guard over an inner layer.
    pub fn new(registry: Arc<RwLock<ZoneRegistry>>, next: S) -> Self {
        Self { registry, next }
    }

    fn path_context(&self, request: &AccessRequest) -> Result<GuardContext, GuardError> {
        let zone = self.registry.read().unwrap().resolve(&request.path)?;
        let cx = GuardContext::new(request.unit, zone);
        check_strict_key(&cx, &request.path)?;
        Ok(cx)
    }

    fn write_context(
        &self,
        request: &AccessRequest,
        patch: &MergePatch,
    ) -> Result<GuardContext, GuardError> {
        let mut touched = Vec::new();
        touched_paths(&request.path, patch, &mut touched);

        let registry = self.registry.read().unwrap();
        let zone = registry.resolve(&touched[0])?;
        let cx = GuardContext::new(request.unit, zone);

        if cx.mutability() == Mutability::ReadOnly {
            return Err(GuardError::ImmutableZoneViolation {
                path: touched[0].clone(),
                mutability: Mutability::ReadOnly,
            });
        }
        for path in &touched {
            let resolved = registry.resolve(path)?;
            if resolved.prefix != cx.zone.prefix {
                return Err(GuardError::CrossZoneWrite {
                    path: request.path.clone(),
                    zone: cx.zone.prefix.clone(),
                    other: resolved.prefix,
                });
            }
            check_strict_key(&cx, path)?;
        }
        Ok(cx)
    }
}

impl<S: ScopedInterceptor> Interceptor for ContextGuard<S> {
    fn handle<'g>(&'g self, request: AccessRequest) -> Result<AccessOutcome<'g>, GuardError> {
        let cx = match &request.kind {
            AccessKind::Write { patch, .. } => self.write_context(&request, patch)?,
            _ => self.path_context(&request)?,
        };
        self.next.handle_scoped(request, &cx)
    }
}

/// Absolute paths of the patch's terminal nodes: every leaf, plus any
/// empty map (which still materializes a node on commit). Never empty.
fn touched_paths(at: &Path, patch: &MergePatch, out: &mut Vec<Path>) {
    match patch {
        MergePatch::Leaf(_) => out.push(at.clone()),
        MergePatch::Map(children) if children.is_empty() => out.push(at.clone()),
        MergePatch::Map(children) => {
            for (key, child) in children {
                touched_paths(&at.child(key), child, out);
            }
        }
    }
}

/// Strict zones admit only declared first-level keys. Deeper segments
/// fall under the declared key's own type, checked by the field guard.
fn check_strict_key(cx: &GuardContext, path: &Path) -> Result<(), GuardError> {
    if !cx.strict() {
        return Ok(());
    }
    if let Some(first) = cx.remainder(path).segments().first() {
        let admitted = matches!(cx.zone.contract.keys, DeclaredKeys::Open)
            || cx.zone.contract.keys.contains(first);
        if !admitted {
            return Err(GuardError::UndeclaredField {
                path: path.clone(),
                zone: cx.zone.prefix.clone(),
            });
        }
    }
    Ok(())
}

/// Innermost layer: leaf-level type and shape validation, then dispatch
/// to the merge engine, the buffer pool, or the snapshot reader.
pub struct FieldGuard {
    engine: Arc<MergeEngine>,
    pool: Arc<BufferPool>,
    units: Arc<UnitRegistry>,
}

impl FieldGuard {
    /// Build the field guard over the engine and pool it dispatches to.
    pub fn new(engine: Arc<MergeEngine>, pool: Arc<BufferPool>, units: Arc<UnitRegistry>) -> Self {
        Self {
            engine,
            pool,
            units,
        }
    }

    /// Validate a write's patch against the zone contract.
    ///
    /// Walks the patch with absolute paths, so a write addressed from
    /// above the zone prefix is checked against the same declarations as
    /// one addressed at it. Runs before the proposal so a type rejection
    /// never reaches the merge engine's critical section.
    fn validate_patch(
        &self,
        cx: &GuardContext,
        path: &Path,
        patch: &MergePatch,
    ) -> Result<(), GuardError> {
        let Some(remainder) = path.strip_prefix(&cx.zone.prefix) else {
            // Above the zone prefix: pure structure. The context guard
            // already pinned every terminal to this zone.
            if let MergePatch::Map(children) = patch {
                for (key, child) in children {
                    self.validate_patch(cx, &path.child(key), child)?;
                }
            }
            return Ok(());
        };
        match remainder.segments() {
            // At the zone prefix itself: the patch supplies first-level
            // keys directly.
            [] => match patch {
                MergePatch::Map(children) => {
                    for (key, child) in children {
                        self.validate_patch(cx, &path.child(key), child)?;
                    }
                    Ok(())
                }
                MergePatch::Leaf(value) => Err(GuardError::TypeMismatch {
                    path: path.clone(),
                    expected: ValueType::Map,
                    found: value.value_type(),
                }),
            },
            [first] => {
                let declared = cx.zone.contract.keys.key_type(first);
                match (patch, declared) {
                    (MergePatch::Leaf(value), Some(declared)) => {
                        if !value.matches_type(declared) {
                            return Err(GuardError::TypeMismatch {
                                path: path.clone(),
                                expected: declared.clone(),
                                found: value.value_type(),
                            });
                        }
                        Ok(())
                    }
                    (MergePatch::Map(_), Some(declared)) if *declared != ValueType::Map => {
                        Err(GuardError::TypeMismatch {
                            path: path.clone(),
                            expected: declared.clone(),
                            found: ValueType::Map,
                        })
                    }
                    _ => Ok(()),
                }
            }
            // Deeper writes descend through a first-level key; a scalar
            // or buffer declaration there cannot hold a subtree.
            [first, ..] => match cx.zone.contract.keys.key_type(first) {
                Some(ValueType::Map) | None => Ok(()),
                Some(declared) => Err(GuardError::TypeMismatch {
                    path: cx.zone.prefix.child(first),
                    expected: declared.clone(),
                    found: ValueType::Map,
                }),
            },
        }
    }
}

impl ScopedInterceptor for FieldGuard {
    fn handle_scoped<'g>(
        &'g self,
        request: AccessRequest,
        cx: &GuardContext,
    ) -> Result<AccessOutcome<'g>, GuardError> {
        match request.kind {
            AccessKind::Read => {
                let value = self
                    .engine
                    .read(&request.path)
                    .ok_or(GuardError::NotFound {
                        path: request.path.clone(),
                    })?;
                Ok(AccessOutcome::Value(value))
            }
            AccessKind::Snapshot => {
                let plain = self
                    .engine
                    .snapshot(&request.path, &self.pool)?
                    .ok_or(GuardError::NotFound {
                        path: request.path.clone(),
                    })?;
                Ok(AccessOutcome::Snapshot(plain))
            }
            AccessKind::Attach => {
                let value = self
                    .engine
                    .read(&request.path)
                    .ok_or(GuardError::NotFound {
                        path: request.path.clone(),
                    })?;
                let handle = match value {
                    Value::Buffer(handle) => handle,
                    _ => {
                        return Err(GuardError::NotABuffer {
                            path: request.path.clone(),
                        })
                    }
                };
                let attachment = self.pool.attach_scoped(&handle, request.unit)?;
                // A view is only write-capable when both the unit's role
                // and the governing zone allow writes; otherwise it is
                // demoted before it leaves the chain.
                let write_capable = self
                    .units
                    .role_of(request.unit)
                    .is_some_and(|role| role.permits(AccessOp::Write));
                let attachment = if write_capable && cx.mutability() != Mutability::ReadOnly {
                    attachment
                } else {
                    attachment.read_only()
                };
                Ok(AccessOutcome::Attached(attachment))
            }
            AccessKind::Write {
                ref patch,
                base_version,
            } => {
                self.validate_patch(cx, &request.path, patch)?;
                // Append-only runs as an apply mode so the policy check
                // is atomic with the commit's critical section.
                let mode = match cx.mutability() {
                    Mutability::AppendOnly => ApplyMode::AppendOnly,
                    Mutability::Mutable | Mutability::ReadOnly => ApplyMode::Merge,
                };
                let merge = PendingMerge::new(request.path, patch.clone(), base_version);
                let receipt = self.engine.propose_with_mode(&merge, mode).map_err(|e| {
                    match e {
                        MergeError::AppendOverwrite { path } => {
                            GuardError::ImmutableZoneViolation {
                                path,
                                mutability: Mutability::AppendOnly,
                            }
                        }
                        other => GuardError::Merge(other),
                    }
                })?;
                Ok(AccessOutcome::Committed(receipt))
            }
        }
    }
}

/// The fully composed production chain.
pub type GuardChain = SupervisingGuard<ContextGuard<FieldGuard>>;

/// Compose the three production layers.
pub fn chain(
    units: Arc<UnitRegistry>,
    registry: Arc<RwLock<ZoneRegistry>>,
    engine: Arc<MergeEngine>,
    pool: Arc<BufferPool>,
) -> GuardChain {
    let field = FieldGuard::new(engine, pool, Arc::clone(&units));
    SupervisingGuard::new(units, ContextGuard::new(registry, field))
}
