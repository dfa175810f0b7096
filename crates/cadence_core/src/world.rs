// world.rs - The entity repository
//
// Owns the registry, the entity index, and the per-type chunked tables.
// All structural mutation happens here, on the orchestrator thread, during
// a writable phase; worker threads only ever see `&World` views and defer
// mutation through command buffers.

use crate::entity::{Entity, EntityIndex, Lifecycle};
use crate::error::WorldError;
use crate::mask::ComponentMask;
use crate::phase::Phase;
use crate::query::QueryBuilder;
use crate::registry::{
    Component, ComponentInfo, ComponentKind, ComponentRegistry, ComponentTypeId, ManagedComponent,
    SnapshotMode,
};
use crate::storage::{
    ComponentTable, ManagedRef, ManagedTable, SingletonSlot, SingletonValue,
};
use std::any::TypeId;
use std::sync::Arc;

/// Registration recipe captured from a repository, used to build mirror
/// worlds with identical dense ids.
#[derive(Clone)]
pub struct SchemaSetup {
    infos: Vec<ComponentInfo>,
}

/// Options for [`World::sync_from`].
#[derive(Clone, Default)]
pub struct SyncOptions {
    /// Copy non-snapshotable types too.
    pub include_transient: bool,
    /// Types to skip regardless of other settings.
    pub exclude: Vec<ComponentTypeId>,
    /// When set, only types in this mask are considered.
    pub mask: Option<ComponentMask>,
}

/// What a sync pass actually moved.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub chunks_copied: usize,
    pub headers_copied: bool,
}

/// Per-target memory of what has been mirrored from the sync source.
#[derive(Default)]
struct MirrorState {
    entity_epoch: u64,
    chunk_versions: Vec<Vec<u64>>,
    singleton_versions: Vec<u64>,
}

pub struct World {
    registry: ComponentRegistry,
    entities: EntityIndex,
    unmanaged: Vec<Option<ComponentTable>>,
    managed: Vec<Option<ManagedTable>>,
    singletons: Vec<Option<SingletonSlot>>,
    global_version: u64,
    phase: Phase,
    read_only: bool,
    mirror: MirrorState,
}

impl World {
    pub fn new() -> Self {
        Self {
            registry: ComponentRegistry::new(),
            entities: EntityIndex::new(),
            unmanaged: Vec::new(),
            managed: Vec::new(),
            singletons: Vec::new(),
            // Version 0 is the "never written" baseline for mirrors.
            global_version: 1,
            phase: Phase::Simulation,
            read_only: false,
            mirror: MirrorState::default(),
        }
    }

    /// Build an empty world with the same registered types and dense ids.
    pub fn from_schema(schema: &SchemaSetup) -> Self {
        let mut world = Self::new();
        world.registry = ComponentRegistry::from_infos(schema.infos.clone());
        for info in schema.infos.iter() {
            world.grow_storage_for(info);
        }
        world
    }

    /// Capture this world's registration recipe.
    pub fn schema(&self) -> SchemaSetup {
        SchemaSetup {
            infos: self.registry.clone_infos(),
        }
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register an unmanaged component type.
    ///
    /// Alignment must not exceed 8; chunk payloads are word-backed.
    pub fn register_component<T: Component>(&mut self) -> Result<ComponentTypeId, WorldError> {
        assert!(
            std::mem::align_of::<T>() <= 8,
            "component '{}' alignment {} exceeds the 8-byte chunk alignment",
            T::NAME,
            std::mem::align_of::<T>()
        );
        let id = self.registry.register::<T>()?;
        self.ensure_storage(id);
        Ok(id)
    }

    /// Register a managed component using the trait-declared snapshot mode.
    pub fn register_managed_component<T: ManagedComponent>(
        &mut self,
    ) -> Result<ComponentTypeId, WorldError> {
        let id = self.registry.register_managed::<T>()?;
        self.ensure_storage(id);
        Ok(id)
    }

    /// Register a managed component with an explicit snapshot mode.
    pub fn register_managed_component_with<T: ManagedComponent>(
        &mut self,
        mode: SnapshotMode,
    ) -> Result<ComponentTypeId, WorldError> {
        let id = self.registry.register_managed_with::<T>(mode)?;
        self.ensure_storage(id);
        Ok(id)
    }

    /// Register an unmanaged singleton. Its slot starts zeroed.
    pub fn register_singleton<T: Component>(&mut self) -> Result<ComponentTypeId, WorldError> {
        assert!(
            std::mem::align_of::<T>() <= 8,
            "singleton '{}' alignment {} exceeds the 8-byte slot alignment",
            T::NAME,
            std::mem::align_of::<T>()
        );
        let id = self.registry.register_singleton::<T>()?;
        self.ensure_storage(id);
        Ok(id)
    }

    /// Register a managed singleton; unset until first write.
    pub fn register_managed_singleton<T: ManagedComponent>(
        &mut self,
        mode: SnapshotMode,
    ) -> Result<ComponentTypeId, WorldError> {
        let id = self.registry.register_managed_singleton::<T>(mode)?;
        self.ensure_storage(id);
        Ok(id)
    }

    fn ensure_storage(&mut self, id: ComponentTypeId) {
        let info = self.registry.info(id).unwrap().clone();
        self.grow_storage_for(&info);
    }

    fn grow_storage_for(&mut self, info: &ComponentInfo) {
        let idx = info.id as usize;
        if self.unmanaged.len() <= idx {
            self.unmanaged.resize_with(idx + 1, || None);
            self.managed.resize_with(idx + 1, || None);
            self.singletons.resize_with(idx + 1, || None);
        }
        if info.singleton {
            if self.singletons[idx].is_none() {
                self.singletons[idx] = Some(match info.kind {
                    ComponentKind::Unmanaged => SingletonSlot::unmanaged(info.stride),
                    ComponentKind::Managed => SingletonSlot::managed(),
                });
            }
        } else {
            match info.kind {
                ComponentKind::Unmanaged => {
                    if self.unmanaged[idx].is_none() {
                        self.unmanaged[idx] = Some(ComponentTable::new(info));
                    }
                }
                ComponentKind::Managed => {
                    if self.managed[idx].is_none() {
                        self.managed[idx] = Some(ManagedTable::new());
                    }
                }
            }
        }
    }

    pub fn component_id<T: 'static>(&self) -> Option<ComponentTypeId> {
        self.registry.id_of::<T>()
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    // ------------------------------------------------------------------
    // Phases and versions
    // ------------------------------------------------------------------

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn begin_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Bump the global version. Called exactly once per frame.
    pub fn tick(&mut self) {
        self.global_version += 1;
    }

    pub fn global_version(&self) -> u64 {
        self.global_version
    }

    /// Mark this world as a leased read view; structural mutation fails
    /// with `StructuralDuringRead` until unmarked. Snapshot providers use
    /// this on mirror worlds.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Any chunk (or the singleton slot) of this type written after
    /// `since_version`?
    pub fn has_component_changed(&self, id: ComponentTypeId, since_version: u64) -> bool {
        let idx = id as usize;
        if let Some(Some(table)) = self.unmanaged.get(idx) {
            if table.changed_since(since_version) {
                return true;
            }
        }
        if let Some(Some(table)) = self.managed.get(idx) {
            if table.changed_since(since_version) {
                return true;
            }
        }
        if let Some(Some(slot)) = self.singletons.get(idx) {
            if slot.last_write_version > since_version {
                return true;
            }
        }
        false
    }

    pub fn has_changed<T: 'static>(&self, since_version: u64) -> bool {
        self.component_id::<T>()
            .map_or(false, |id| self.has_component_changed(id, since_version))
    }

    fn gate_write(&self, operation: &'static str) -> Result<(), WorldError> {
        if !self.phase.writable() {
            return Err(WorldError::WrongPhase {
                phase: self.phase,
                operation,
            });
        }
        Ok(())
    }

    fn gate_structural(&self, operation: &'static str) -> Result<(), WorldError> {
        if self.read_only {
            return Err(WorldError::StructuralDuringRead);
        }
        self.gate_write(operation)
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    pub fn create_entity(&mut self) -> Result<Entity, WorldError> {
        self.create_entity_with(Lifecycle::Active)
    }

    pub fn create_entity_with(&mut self, lifecycle: Lifecycle) -> Result<Entity, WorldError> {
        self.gate_structural("create_entity")?;
        Ok(self.entities.allocate(lifecycle))
    }

    /// Destroy the entity: lifecycle goes Dead, the generation bumps, and
    /// every component row it held returns to its table's free list.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<(), WorldError> {
        self.gate_structural("destroy_entity")?;
        let mask = self.entities.destroy(entity)?;
        let version = self.global_version;
        for id in mask.iter() {
            let idx = id as usize;
            if let Some(Some(table)) = self.unmanaged.get_mut(idx) {
                table.remove(entity.index(), version);
            }
            if let Some(Some(table)) = self.managed.get_mut(idx) {
                table.remove(entity.index(), version);
            }
        }
        Ok(())
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    pub fn lifecycle(&self, entity: Entity) -> Result<Lifecycle, WorldError> {
        self.entities.lifecycle(entity)
    }

    pub fn set_lifecycle(&mut self, entity: Entity, state: Lifecycle) -> Result<(), WorldError> {
        self.gate_structural("set_lifecycle")?;
        self.entities.set_lifecycle(entity, state)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.live_count()
    }

    pub fn archetype(&self, entity: Entity) -> Result<&ComponentMask, WorldError> {
        self.entities.mask(entity)
    }

    // ------------------------------------------------------------------
    // Unmanaged components
    // ------------------------------------------------------------------

    pub fn add_component<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<(), WorldError> {
        let (id, _) = self.lookup::<T>(ComponentKind::Unmanaged)?;
        self.add_raw(entity, id, bytemuck::bytes_of(&value), "add_component")
    }

    pub fn set_component<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<(), WorldError> {
        let (id, _) = self.lookup::<T>(ComponentKind::Unmanaged)?;
        self.set_raw(entity, id, bytemuck::bytes_of(&value), T::NAME)
    }

    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<(), WorldError> {
        let (id, _) = self.lookup::<T>(ComponentKind::Unmanaged)?;
        self.remove_raw(entity, id, T::NAME)
    }

    /// Immutable component access; never bumps write versions.
    pub fn get_component<T: Component>(&self, entity: Entity) -> Result<&T, WorldError> {
        let (id, _) = self.lookup::<T>(ComponentKind::Unmanaged)?;
        let index = self.entities.resolve(entity)?;
        let table = self.unmanaged[id as usize]
            .as_ref()
            .ok_or(WorldError::NotRegistered { name: T::NAME })?;
        let bytes = table
            .get(index)
            .ok_or(WorldError::Missing { name: T::NAME })?;
        if std::mem::size_of::<T>() == 0 {
            // Tag component: presence is the whole payload.
            return Ok(unsafe { &*std::ptr::NonNull::dangling().as_ptr() });
        }
        Ok(bytemuck::from_bytes(&bytes[..std::mem::size_of::<T>()]))
    }

    /// Mutable component access; stamps the owning chunk.
    pub fn get_component_mut<T: Component>(
        &mut self,
        entity: Entity,
    ) -> Result<&mut T, WorldError> {
        self.gate_write("get_component_mut")?;
        let (id, _) = self.lookup::<T>(ComponentKind::Unmanaged)?;
        let index = self.entities.resolve(entity)?;
        let version = self.global_version;
        let table = self.unmanaged[id as usize]
            .as_mut()
            .ok_or(WorldError::NotRegistered { name: T::NAME })?;
        let bytes = table
            .get_mut(index, version)
            .ok_or(WorldError::Missing { name: T::NAME })?;
        let size = std::mem::size_of::<T>();
        if size == 0 {
            return Ok(unsafe { &mut *std::ptr::NonNull::dangling().as_ptr() });
        }
        Ok(bytemuck::from_bytes_mut(&mut bytes[..size]))
    }

    pub fn has_component<T: 'static>(&self, entity: Entity) -> bool {
        match (self.component_id::<T>(), self.entities.resolve(entity)) {
            (Some(id), Ok(index)) => {
                self.unmanaged
                    .get(id as usize)
                    .and_then(|t| t.as_ref())
                    .map_or(false, |t| t.has(index))
                    || self
                        .managed
                        .get(id as usize)
                        .and_then(|t| t.as_ref())
                        .map_or(false, |t| t.has(index))
            }
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Managed components
    // ------------------------------------------------------------------

    pub fn add_managed<T: ManagedComponent>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<(), WorldError> {
        let (id, _) = self.lookup::<T>(ComponentKind::Managed)?;
        self.add_managed_raw(entity, id, Arc::new(value), "add_managed")
    }

    pub fn set_managed<T: ManagedComponent>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<(), WorldError> {
        let (id, _) = self.lookup::<T>(ComponentKind::Managed)?;
        self.set_managed_raw(entity, id, Arc::new(value), T::NAME)
    }

    pub fn remove_managed<T: ManagedComponent>(&mut self, entity: Entity) -> Result<(), WorldError> {
        let (id, _) = self.lookup::<T>(ComponentKind::Managed)?;
        self.remove_raw(entity, id, T::NAME)
    }

    /// Shared reference to the managed component.
    pub fn get_managed<T: ManagedComponent>(&self, entity: Entity) -> Result<Arc<T>, WorldError> {
        let (id, _) = self.lookup::<T>(ComponentKind::Managed)?;
        let index = self.entities.resolve(entity)?;
        let table = self.managed[id as usize]
            .as_ref()
            .ok_or(WorldError::NotRegistered { name: T::NAME })?;
        let value = table
            .get(index)
            .ok_or(WorldError::Missing { name: T::NAME })?;
        Arc::clone(value)
            .downcast::<T>()
            .map_err(|_| WorldError::Missing { name: T::NAME })
    }

    // ------------------------------------------------------------------
    // Raw (type-erased) component paths, used by command playback
    // ------------------------------------------------------------------

    pub(crate) fn add_component_by_key(
        &mut self,
        entity: Entity,
        type_key: TypeId,
        name: &'static str,
        bytes: &[u8],
    ) -> Result<(), WorldError> {
        let id = self.id_by_key(type_key, name)?;
        self.add_raw(entity, id, bytes, "add_component")
    }

    pub(crate) fn set_component_by_key(
        &mut self,
        entity: Entity,
        type_key: TypeId,
        name: &'static str,
        bytes: &[u8],
    ) -> Result<(), WorldError> {
        let id = self.id_by_key(type_key, name)?;
        self.set_raw(entity, id, bytes, name)
    }

    pub(crate) fn remove_component_by_key(
        &mut self,
        entity: Entity,
        type_key: TypeId,
        name: &'static str,
    ) -> Result<(), WorldError> {
        let id = self.id_by_key(type_key, name)?;
        self.remove_raw(entity, id, name)
    }

    pub(crate) fn add_managed_by_key(
        &mut self,
        entity: Entity,
        type_key: TypeId,
        name: &'static str,
        value: ManagedRef,
    ) -> Result<(), WorldError> {
        let id = self.id_by_key(type_key, name)?;
        self.add_managed_raw(entity, id, value, "add_managed")
    }

    pub(crate) fn set_managed_by_key(
        &mut self,
        entity: Entity,
        type_key: TypeId,
        name: &'static str,
        value: ManagedRef,
    ) -> Result<(), WorldError> {
        let id = self.id_by_key(type_key, name)?;
        self.set_managed_raw(entity, id, value, name)
    }

    fn id_by_key(&self, type_key: TypeId, name: &'static str) -> Result<ComponentTypeId, WorldError> {
        self.registry
            .id_of_key(type_key)
            .ok_or(WorldError::NotRegistered { name })
    }

    fn add_raw(
        &mut self,
        entity: Entity,
        id: ComponentTypeId,
        bytes: &[u8],
        operation: &'static str,
    ) -> Result<(), WorldError> {
        self.gate_structural(operation)?;
        let index = self.entities.resolve(entity)?;
        let version = self.global_version;
        let name = self.registry.info(id).map(|i| i.name).unwrap_or("?");
        let table = self.unmanaged[id as usize]
            .as_mut()
            .ok_or(WorldError::NotRegistered { name })?;
        table.insert(index, bytes, version);
        self.entities.set_mask_bit(index, id);
        Ok(())
    }

    fn set_raw(
        &mut self,
        entity: Entity,
        id: ComponentTypeId,
        bytes: &[u8],
        name: &'static str,
    ) -> Result<(), WorldError> {
        self.gate_write("set_component")?;
        let index = self.entities.resolve(entity)?;
        let version = self.global_version;
        let table = self.unmanaged[id as usize]
            .as_mut()
            .ok_or(WorldError::NotRegistered { name })?;
        if !table.has(index) {
            return Err(WorldError::Missing { name });
        }
        table.write(index, bytes, version);
        Ok(())
    }

    fn remove_raw(
        &mut self,
        entity: Entity,
        id: ComponentTypeId,
        name: &'static str,
    ) -> Result<(), WorldError> {
        self.gate_structural("remove_component")?;
        let index = self.entities.resolve(entity)?;
        let version = self.global_version;
        let removed = match self.registry.info(id).map(|i| i.kind) {
            Some(ComponentKind::Unmanaged) => self.unmanaged[id as usize]
                .as_mut()
                .map_or(false, |t| t.remove(index, version)),
            Some(ComponentKind::Managed) => self.managed[id as usize]
                .as_mut()
                .map_or(false, |t| t.remove(index, version)),
            None => return Err(WorldError::NotRegistered { name }),
        };
        if !removed {
            return Err(WorldError::Missing { name });
        }
        self.entities.clear_mask_bit(index, id);
        Ok(())
    }

    fn add_managed_raw(
        &mut self,
        entity: Entity,
        id: ComponentTypeId,
        value: ManagedRef,
        operation: &'static str,
    ) -> Result<(), WorldError> {
        self.gate_structural(operation)?;
        let index = self.entities.resolve(entity)?;
        let version = self.global_version;
        let name = self.registry.info(id).map(|i| i.name).unwrap_or("?");
        let table = self.managed[id as usize]
            .as_mut()
            .ok_or(WorldError::NotRegistered { name })?;
        table.insert(index, value, version);
        self.entities.set_mask_bit(index, id);
        Ok(())
    }

    fn set_managed_raw(
        &mut self,
        entity: Entity,
        id: ComponentTypeId,
        value: ManagedRef,
        name: &'static str,
    ) -> Result<(), WorldError> {
        self.gate_write("set_managed")?;
        let index = self.entities.resolve(entity)?;
        let version = self.global_version;
        let table = self.managed[id as usize]
            .as_mut()
            .ok_or(WorldError::NotRegistered { name })?;
        if !table.has(index) {
            return Err(WorldError::Missing { name });
        }
        table.write(index, value, version);
        Ok(())
    }

    fn lookup<T: 'static>(&self, kind: ComponentKind) -> Result<(ComponentTypeId, &ComponentInfo), WorldError> {
        let name = std::any::type_name::<T>();
        let id = self
            .registry
            .id_of::<T>()
            .ok_or(WorldError::NotRegistered {
                name: short_type_name(name),
            })?;
        let info = self.registry.info(id).unwrap();
        if info.kind != kind || info.singleton {
            return Err(WorldError::NotRegistered {
                name: short_type_name(name),
            });
        }
        Ok((id, info))
    }

    // ------------------------------------------------------------------
    // Singletons
    // ------------------------------------------------------------------

    pub fn singleton<T: Component>(&self) -> Result<&T, WorldError> {
        let id = self.singleton_id::<T>(ComponentKind::Unmanaged)?;
        let slot = self.singletons[id as usize].as_ref().unwrap();
        match &slot.value {
            SingletonValue::Unmanaged(bytes) => {
                Ok(bytemuck::from_bytes(&bytes[..std::mem::size_of::<T>()]))
            }
            SingletonValue::Managed(_) => Err(WorldError::NotRegistered { name: T::NAME }),
        }
    }

    pub fn singleton_mut<T: Component>(&mut self) -> Result<&mut T, WorldError> {
        self.gate_write("singleton_mut")?;
        let id = self.singleton_id::<T>(ComponentKind::Unmanaged)?;
        let version = self.global_version;
        let slot = self.singletons[id as usize].as_mut().unwrap();
        slot.last_write_version = version;
        match &mut slot.value {
            SingletonValue::Unmanaged(bytes) => {
                let size = std::mem::size_of::<T>();
                Ok(bytemuck::from_bytes_mut(&mut bytes[..size]))
            }
            SingletonValue::Managed(_) => Err(WorldError::NotRegistered { name: T::NAME }),
        }
    }

    pub fn set_singleton<T: Component>(&mut self, value: T) -> Result<(), WorldError> {
        *self.singleton_mut::<T>()? = value;
        Ok(())
    }

    pub fn managed_singleton<T: ManagedComponent>(&self) -> Result<Arc<T>, WorldError> {
        let id = self.singleton_id::<T>(ComponentKind::Managed)?;
        let slot = self.singletons[id as usize].as_ref().unwrap();
        match &slot.value {
            SingletonValue::Managed(Some(value)) => Arc::clone(value)
                .downcast::<T>()
                .map_err(|_| WorldError::Missing { name: T::NAME }),
            SingletonValue::Managed(None) => Err(WorldError::Missing { name: T::NAME }),
            SingletonValue::Unmanaged(_) => Err(WorldError::NotRegistered { name: T::NAME }),
        }
    }

    pub fn set_managed_singleton<T: ManagedComponent>(&mut self, value: T) -> Result<(), WorldError> {
        self.gate_write("set_managed_singleton")?;
        let id = self.singleton_id::<T>(ComponentKind::Managed)?;
        let version = self.global_version;
        let slot = self.singletons[id as usize].as_mut().unwrap();
        slot.last_write_version = version;
        match &mut slot.value {
            SingletonValue::Managed(dst) => {
                *dst = Some(Arc::new(value));
                Ok(())
            }
            SingletonValue::Unmanaged(_) => Err(WorldError::NotRegistered { name: T::NAME }),
        }
    }

    fn singleton_id<T: 'static>(&self, kind: ComponentKind) -> Result<ComponentTypeId, WorldError> {
        let name = short_type_name(std::any::type_name::<T>());
        let id = self
            .registry
            .id_of::<T>()
            .ok_or(WorldError::NotRegistered { name })?;
        let info = self.registry.info(id).unwrap();
        if !info.singleton || info.kind != kind {
            return Err(WorldError::NotRegistered { name });
        }
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn query(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(self)
    }

    pub(crate) fn entity_slots(&self) -> &[crate::entity::EntitySlot] {
        self.entities.slots()
    }

    // ------------------------------------------------------------------
    // Dirty-chunk sync
    // ------------------------------------------------------------------

    /// Populate this world from `source`, copying only chunks written since
    /// this target last mirrored them. Non-snapshotable types are skipped
    /// unless `include_transient`.
    pub fn sync_from(&mut self, source: &World, options: &SyncOptions) -> SyncReport {
        debug_assert_eq!(
            self.registry.len(),
            source.registry.len(),
            "sync requires schema-identical worlds"
        );
        let mut report = SyncReport::default();

        if source.entities.epoch() != self.mirror.entity_epoch {
            self.entities.copy_from(&source.entities);
            self.mirror.entity_epoch = source.entities.epoch();
            report.headers_copied = true;
        }

        let types = source.registry.len();
        self.mirror
            .chunk_versions
            .resize_with(types, Vec::new);
        self.mirror.singleton_versions.resize(types, 0);

        for info in source.registry.iter() {
            if !info.snapshotable && !options.include_transient {
                continue;
            }
            if options.exclude.contains(&info.id) {
                continue;
            }
            if let Some(mask) = &options.mask {
                if !mask.test(info.id) {
                    continue;
                }
            }
            let idx = info.id as usize;

            if info.singleton {
                let src_slot = source.singletons[idx].as_ref().unwrap();
                if src_slot.last_write_version > self.mirror.singleton_versions[idx] {
                    self.singletons[idx]
                        .as_mut()
                        .unwrap()
                        .copy_from(src_slot);
                    self.mirror.singleton_versions[idx] = src_slot.last_write_version;
                    report.chunks_copied += 1;
                }
                continue;
            }

            let mirrored = &mut self.mirror.chunk_versions[idx];
            match info.kind {
                ComponentKind::Unmanaged => {
                    if let (Some(dst), Some(src)) =
                        (self.unmanaged[idx].as_mut(), source.unmanaged[idx].as_ref())
                    {
                        report.chunks_copied += dst.sync_from(src, mirrored);
                    }
                }
                ComponentKind::Managed => {
                    if let (Some(dst), Some(src)) =
                        (self.managed[idx].as_mut(), source.managed[idx].as_ref())
                    {
                        report.chunks_copied += dst.sync_from(src, mirrored);
                    }
                }
            }
        }

        self.global_version = source.global_version;
        report
    }

    /// Reset all entity and component state but keep the schema and the
    /// allocated chunks (pooled mirror reuse).
    pub fn soft_clear(&mut self) {
        self.entities = EntityIndex::new();
        for table in self.unmanaged.iter_mut().flatten() {
            table.soft_clear();
        }
        for table in self.managed.iter_mut().flatten() {
            table.soft_clear();
        }
        for (idx, slot) in self.singletons.iter_mut().enumerate() {
            if let Some(slot) = slot {
                let info = self.registry.info(idx as ComponentTypeId).unwrap();
                *slot = match info.kind {
                    ComponentKind::Unmanaged => SingletonSlot::unmanaged(info.stride),
                    ComponentKind::Managed => SingletonSlot::managed(),
                };
            }
        }
        self.mirror = MirrorState::default();
        self.global_version = 1;
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Position {
        x: f32,
        y: f32,
    }
    crate::define_component!(Position, "Position");

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Heading {
        radians: f64,
    }
    crate::define_component!(Heading, "Heading");

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct DebugScratch {
        v: u64,
    }
    crate::define_component!(DebugScratch, "DebugScratch", transient);

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct FrameInfo {
        frame: u64,
    }
    crate::define_component!(FrameInfo, "FrameInfo");

    #[derive(Debug, PartialEq)]
    struct Roster {
        members: Vec<u64>,
    }
    impl ManagedComponent for Roster {
        const NAME: &'static str = "Roster";
        const SNAPSHOT: Option<SnapshotMode> = Some(SnapshotMode::Shared);
    }

    fn world() -> World {
        let mut world = World::new();
        world.register_component::<Position>().unwrap();
        world.register_component::<Heading>().unwrap();
        world.register_component::<DebugScratch>().unwrap();
        world.register_managed_component::<Roster>().unwrap();
        world.register_singleton::<FrameInfo>().unwrap();
        world
    }

    #[test]
    fn handle_stays_valid_until_destroyed() {
        let mut world = world();
        let e = world.create_entity().unwrap();
        assert!(world.is_alive(e));

        world.destroy_entity(e).unwrap();
        assert!(!world.is_alive(e));
        assert_eq!(
            world.add_component(e, Position { x: 0.0, y: 0.0 }),
            Err(WorldError::NotAlive)
        );
        assert!(matches!(
            world.get_component::<Position>(e),
            Err(WorldError::NotAlive)
        ));
    }

    #[test]
    fn reused_index_gets_fresh_generation() {
        let mut world = world();
        let first = world.create_entity().unwrap();
        world.destroy_entity(first).unwrap();
        let second = world.create_entity().unwrap();
        assert_eq!(first.index(), second.index());
        assert_ne!(first.generation(), second.generation());
        assert!(world.is_alive(second));
        assert!(!world.is_alive(first));
    }

    #[test]
    fn component_crud_roundtrip() {
        let mut world = world();
        let e = world.create_entity().unwrap();

        world.add_component(e, Position { x: 1.0, y: 2.0 }).unwrap();
        assert_eq!(
            world.get_component::<Position>(e).unwrap(),
            &Position { x: 1.0, y: 2.0 }
        );

        world.set_component(e, Position { x: 3.0, y: 4.0 }).unwrap();
        assert_eq!(
            world.get_component::<Position>(e).unwrap(),
            &Position { x: 3.0, y: 4.0 }
        );

        get_mut_bumps_version(&mut world, e);

        world.remove_component::<Position>(e).unwrap();
        assert_eq!(
            world.get_component::<Position>(e),
            Err(WorldError::Missing { name: "Position" })
        );
        assert_eq!(
            world.set_component(e, Position { x: 0.0, y: 0.0 }),
            Err(WorldError::Missing { name: "Position" })
        );
    }

    fn get_mut_bumps_version(world: &mut World, e: Entity) {
        world.tick();
        let since = world.global_version() - 1;
        let id = world.component_id::<Position>().unwrap();
        assert!(!world.has_component_changed(id, since));
        world.get_component_mut::<Position>(e).unwrap().x = 9.0;
        assert!(world.has_component_changed(id, since));
    }

    #[test]
    fn reads_never_bump_versions() {
        let mut world = world();
        let e = world.create_entity().unwrap();
        world.add_component(e, Position { x: 0.0, y: 0.0 }).unwrap();

        world.tick();
        let since = world.global_version() - 1;
        let id = world.component_id::<Position>().unwrap();
        let _ = world.get_component::<Position>(e).unwrap();
        let _ = world.query().with::<Position>().iter().count();
        assert!(!world.has_component_changed(id, since));
    }

    #[test]
    fn archetype_mask_follows_add_remove() {
        let mut world = world();
        let e = world.create_entity().unwrap();
        let pos = world.component_id::<Position>().unwrap();

        assert!(!world.archetype(e).unwrap().test(pos));
        world.add_component(e, Position { x: 0.0, y: 0.0 }).unwrap();
        assert!(world.archetype(e).unwrap().test(pos));
        world.remove_component::<Position>(e).unwrap();
        assert!(!world.archetype(e).unwrap().test(pos));
    }

    #[test]
    fn export_phase_rejects_writes() {
        let mut world = world();
        let e = world.create_entity().unwrap();
        world.add_component(e, Position { x: 0.0, y: 0.0 }).unwrap();

        world.begin_phase(Phase::Export);
        assert!(matches!(
            world.set_component(e, Position { x: 1.0, y: 1.0 }),
            Err(WorldError::WrongPhase { phase: Phase::Export, .. })
        ));
        assert!(matches!(world.create_entity(), Err(WorldError::WrongPhase { .. })));
        // Reads are fine.
        assert!(world.get_component::<Position>(e).is_ok());

        world.begin_phase(Phase::Simulation);
        assert!(world.set_component(e, Position { x: 1.0, y: 1.0 }).is_ok());
    }

    #[test]
    fn read_only_views_reject_structural_ops() {
        let mut world = world();
        world.set_read_only(true);
        assert_eq!(world.create_entity(), Err(WorldError::StructuralDuringRead));
    }

    #[test]
    fn unregistered_type_is_an_error() {
        #[derive(Clone, Copy, Pod, Zeroable)]
        #[repr(C)]
        struct Unknown {
            v: u32,
        }
        crate::define_component!(Unknown, "Unknown");

        let mut world = world();
        let e = world.create_entity().unwrap();
        assert!(matches!(
            world.add_component(e, Unknown { v: 1 }),
            Err(WorldError::NotRegistered { .. })
        ));
    }

    #[test]
    fn singleton_follows_write_version_rule() {
        let mut world = world();
        let id = world.component_id::<FrameInfo>().unwrap();

        world.tick();
        let since = world.global_version() - 1;
        assert_eq!(world.singleton::<FrameInfo>().unwrap().frame, 0);
        assert!(!world.has_component_changed(id, since));

        world.set_singleton(FrameInfo { frame: 41 }).unwrap();
        assert!(world.has_component_changed(id, since));
        assert_eq!(world.singleton::<FrameInfo>().unwrap().frame, 41);
    }

    #[test]
    fn managed_components_share_references() {
        let mut world = world();
        let e = world.create_entity().unwrap();
        world
            .add_managed(e, Roster { members: vec![1, 2] })
            .unwrap();

        let a = world.get_managed::<Roster>(e).unwrap();
        let b = world.get_managed::<Roster>(e).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.members, vec![1, 2]);
    }

    #[test]
    fn tick_bumps_global_version_once() {
        let mut world = world();
        let v = world.global_version();
        world.tick();
        assert_eq!(world.global_version(), v + 1);
    }

    #[test]
    fn sync_mirrors_snapshotable_state() {
        let mut live = world();
        let e1 = live.create_entity().unwrap();
        live.add_component(e1, Position { x: 1.0, y: 1.0 }).unwrap();
        live.add_component(e1, DebugScratch { v: 99 }).unwrap();
        live.add_managed(e1, Roster { members: vec![7] }).unwrap();
        live.set_singleton(FrameInfo { frame: 3 }).unwrap();

        let mut replica = World::from_schema(&live.schema());
        let report = replica.sync_from(&live, &SyncOptions::default());
        assert!(report.headers_copied);
        assert!(report.chunks_copied > 0);

        // Snapshotable values match the source.
        assert_eq!(
            replica.get_component::<Position>(e1).unwrap(),
            &Position { x: 1.0, y: 1.0 }
        );
        assert_eq!(replica.get_managed::<Roster>(e1).unwrap().members, vec![7]);
        assert_eq!(replica.singleton::<FrameInfo>().unwrap().frame, 3);

        // Transient types never flow to replicas by default.
        assert_eq!(
            replica.get_component::<DebugScratch>(e1),
            Err(WorldError::Missing { name: "DebugScratch" })
        );

        // A clean re-sync copies nothing.
        let clean = replica.sync_from(&live, &SyncOptions::default());
        assert_eq!(clean.chunks_copied, 0);
        assert!(!clean.headers_copied);
    }

    #[test]
    fn sync_copies_only_dirty_chunks() {
        let mut live = world();
        let e = live.create_entity().unwrap();
        live.add_component(e, Position { x: 0.0, y: 0.0 }).unwrap();
        live.add_component(e, Heading { radians: 0.5 }).unwrap();

        let mut replica = World::from_schema(&live.schema());
        replica.sync_from(&live, &SyncOptions::default());

        // Touch only Position; the next sync must not move Heading chunks.
        live.tick();
        live.set_component(e, Position { x: 2.0, y: 0.0 }).unwrap();
        let report = replica.sync_from(&live, &SyncOptions::default());
        assert_eq!(report.chunks_copied, 1);
        assert_eq!(
            replica.get_component::<Position>(e).unwrap(),
            &Position { x: 2.0, y: 0.0 }
        );
    }

    #[test]
    fn sync_honors_mask_and_exclusions() {
        let mut live = world();
        let e = live.create_entity().unwrap();
        live.add_component(e, Position { x: 1.0, y: 0.0 }).unwrap();
        live.add_component(e, Heading { radians: 1.0 }).unwrap();

        let pos = live.component_id::<Position>().unwrap();
        let heading = live.component_id::<Heading>().unwrap();

        let mut replica = World::from_schema(&live.schema());
        let options = SyncOptions {
            mask: Some([pos].into_iter().collect()),
            ..Default::default()
        };
        replica.sync_from(&live, &options);
        assert!(replica.get_component::<Position>(e).is_ok());
        assert!(replica.get_component::<Heading>(e).is_err());

        let mut excluded = World::from_schema(&live.schema());
        let options = SyncOptions {
            exclude: vec![heading],
            ..Default::default()
        };
        excluded.sync_from(&live, &options);
        assert!(excluded.get_component::<Position>(e).is_ok());
        assert!(excluded.get_component::<Heading>(e).is_err());
    }

    #[test]
    fn soft_clear_keeps_schema() {
        let mut world = world();
        let e = world.create_entity().unwrap();
        world.add_component(e, Position { x: 1.0, y: 1.0 }).unwrap();

        world.soft_clear();
        assert_eq!(world.entity_count(), 0);
        assert!(world.component_id::<Position>().is_some());

        // Reusable immediately.
        let e2 = world.create_entity().unwrap();
        world.add_component(e2, Position { x: 2.0, y: 2.0 }).unwrap();
        assert_eq!(
            world.get_component::<Position>(e2).unwrap(),
            &Position { x: 2.0, y: 2.0 }
        );
    }
}
