//! [`GuardedState`]: the assembled subsystem behind one front door.
//!
//! Owns the zone registry, buffer pool, merge engine, and unit
//! registry, and routes every data access through the guard chain.
//! Construction optionally hands out the commit-event receiver; the
//! engine emits exactly one event per committed write, synchronously
//! before the write returns.

use std::sync::{Arc, RwLock};

use crossbeam_channel::Receiver;

use warden_buffer::{Attachment, BufferConfig, BufferPool};
use warden_core::{
    BufferHandle, CommitEvent, Dtype, GuardError, Path, RegistryError, Shape, UnitId, Value,
    Version, ZoneContract, ZoneGeneration, ZoneSpec,
};
use warden_tree::{CommitReceipt, MergeEngine, MergePatch, PlainValue};
use warden_zone::ZoneRegistry;

use crate::chain::{self, GuardChain, Interceptor};
use crate::request::AccessRequest;
use crate::units::{Role, UnitRegistry};

/// Construction parameters for a [`GuardedState`].
#[derive(Clone, Debug)]
pub struct StateConfig {
    /// Zones registered up front, as configuration data.
    pub zones: Vec<ZoneSpec>,
    /// Whether paths outside every registered zone fail resolution
    /// (strict) or fall under a synthetic open contract (lenient).
    pub default_strict: bool,
    /// Buffer pool limits.
    pub buffers: BufferConfig,
    /// Whether to open the commit-event channel.
    pub emit_events: bool,
    /// Capacity of the commit-event channel. When the receiver falls
    /// this far behind, further events are dropped rather than blocking
    /// writers.
    pub event_bound: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            zones: Vec::new(),
            default_strict: false,
            buffers: BufferConfig::default(),
            emit_events: false,
            event_bound: 1024,
        }
    }
}

/// The guarded shared-state subsystem.
///
/// Every read, write, attach, and snapshot passes through the guard
/// chain; zone and unit registration go through their registries
/// directly (zone registration itself requires a supervisor unit).
pub struct GuardedState {
    units: Arc<UnitRegistry>,
    registry: Arc<RwLock<ZoneRegistry>>,
    pool: Arc<BufferPool>,
    engine: Arc<MergeEngine>,
    chain: GuardChain,
}

impl GuardedState {
    /// Assemble the subsystem.
    ///
    /// The receiver is `Some` only when `config.emit_events` is set;
    /// dropping it later simply discards events.
    pub fn new(
        config: StateConfig,
    ) -> Result<(Self, Option<Receiver<CommitEvent>>), RegistryError> {
        let registry = Arc::new(RwLock::new(ZoneRegistry::from_specs(
            &config.zones,
            config.default_strict,
        )?));
        let (engine, receiver) = if config.emit_events {
            let (engine, receiver) = MergeEngine::with_events(config.event_bound);
            (Arc::new(engine), Some(receiver))
        } else {
            (Arc::new(MergeEngine::new()), None)
        };
        let pool = Arc::new(BufferPool::new(config.buffers));
        let units = Arc::new(UnitRegistry::new());
        let chain = chain::chain(
            Arc::clone(&units),
            Arc::clone(&registry),
            Arc::clone(&engine),
            Arc::clone(&pool),
        );
        Ok((
            Self {
                units,
                registry,
                pool,
                engine,
                chain,
            },
            receiver,
        ))
    }

    /// Register an execution unit and return its ID.
    pub fn register_unit(&self, role: Role) -> UnitId {
        self.units.register(role)
    }

    /// Remove a unit; its outstanding attachments remain tracked by the
    /// pool and must still be detached.
    pub fn deregister_unit(&self, unit: UnitId) -> bool {
        self.units.deregister(unit)
    }

    /// Register a zone at runtime. Requires a supervisor unit.
    pub fn register_zone(
        &self,
        unit: UnitId,
        prefix: Path,
        contract: ZoneContract,
    ) -> Result<ZoneGeneration, GuardError> {
        self.require_supervisor(unit)?;
        let generation = self.registry.write().unwrap().register(prefix, contract)?;
        Ok(generation)
    }

    /// Replace a zone's contract under a fresh generation. Requires a
    /// supervisor unit.
    pub fn reregister_zone(
        &self,
        unit: UnitId,
        prefix: &Path,
        contract: ZoneContract,
    ) -> Result<ZoneGeneration, GuardError> {
        self.require_supervisor(unit)?;
        let generation = self
            .registry
            .write()
            .unwrap()
            .reregister(prefix, contract)?;
        Ok(generation)
    }

    /// Reserve a zero-initialized buffer segment.
    ///
    /// Allocation precedes a write of the handle into the tree, so it
    /// requires write permission.
    pub fn allocate_buffer(
        &self,
        unit: UnitId,
        byte_len: usize,
        dtype: Dtype,
        shape: &[usize],
    ) -> Result<BufferHandle, GuardError> {
        self.units
            .authorize(unit, warden_core::AccessOp::Write)?;
        let handle = self.pool.allocate(byte_len, dtype, Shape::from_slice(shape))?;
        Ok(handle)
    }

    /// Guarded copy-on-read of the value at `path`.
    pub fn read(&self, unit: UnitId, path: Path) -> Result<Value, GuardError> {
        let outcome = self.chain.handle(AccessRequest::read(unit, path))?;
        Ok(outcome
            .into_value()
            .expect("read request yields a value outcome"))
    }

    /// Guarded write: propose `patch` at `path` against `base_version`.
    pub fn write(
        &self,
        unit: UnitId,
        path: Path,
        patch: MergePatch,
        base_version: Version,
    ) -> Result<CommitReceipt, GuardError> {
        let outcome = self
            .chain
            .handle(AccessRequest::write(unit, path, patch, base_version))?;
        Ok(outcome
            .into_receipt()
            .expect("write request yields a commit outcome"))
    }

    /// Guarded zero-copy attach to the buffer stored at `path`.
    ///
    /// The returned [`Attachment`] detaches on drop; failure paths
    /// included, the reference count always comes back down.
    pub fn attach(&self, unit: UnitId, path: Path) -> Result<Attachment<'_>, GuardError> {
        let outcome = self.chain.handle(AccessRequest::attach(unit, path))?;
        Ok(outcome
            .into_attachment()
            .expect("attach request yields an attachment outcome"))
    }

    /// Guarded plain-structure snapshot of the subtree at `path`.
    pub fn snapshot(&self, unit: UnitId, path: Path) -> Result<PlainValue, GuardError> {
        let outcome = self.chain.handle(AccessRequest::snapshot(unit, path))?;
        Ok(outcome
            .into_snapshot()
            .expect("snapshot request yields a plain outcome"))
    }

    /// Route a pre-built request through the chain.
    pub fn access(
        &self,
        request: AccessRequest,
    ) -> Result<crate::request::AccessOutcome<'_>, GuardError> {
        self.chain.handle(request)
    }

    /// The version counter at `path` (0 for a missing path).
    ///
    /// Unguarded: callers need base versions to build proposals, and
    /// the counter carries no data.
    pub fn version_at(&self, path: &Path) -> Version {
        self.engine.version_at(path)
    }

    /// The buffer pool, for attachment bookkeeping inspection.
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    fn require_supervisor(&self, unit: UnitId) -> Result<(), GuardError> {
        match self.units.role_of(unit) {
            None => Err(GuardError::UnknownUnit { unit }),
            Some(Role::Supervisor) => Ok(()),
            Some(_) => Err(GuardError::OperationDenied {
                unit,
                op: warden_core::AccessOp::Write,
            }),
        }
    }
}
