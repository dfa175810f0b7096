// registry.rs - Host-local component type registry
//
// Assigns dense small-integer ids to component types and records layout
// metadata. Every repository owns its own registry; there is no process-wide
// state, so two hosts in one process may assign different ids to the same
// Rust type.

use crate::error::WorldError;
use bytemuck::Pod;
use std::any::TypeId;
use std::collections::HashMap;

/// Dense component type id, `< MAX_COMPONENT_TYPES`.
pub type ComponentTypeId = u16;

/// Upper bound on registered component types; archetype masks are sized to it.
pub const MAX_COMPONENT_TYPES: usize = 256;

/// Storage tier of a component type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ComponentKind {
    /// Packed byte payload in chunked tables.
    Unmanaged,
    /// Shared-reference slots (`Arc`) in chunked tables.
    Managed,
}

/// How a managed type participates in snapshots.
///
/// Rust cannot introspect immutability the way the snapshot convention
/// demands, so managed registration states it explicitly.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SnapshotMode {
    /// Immutable by convention; replicas share the `Arc`.
    Shared,
    /// Never flows to replicas or snapshots.
    Transient,
}

/// Runtime metadata for a registered component type.
#[derive(Clone, Debug)]
pub struct ComponentInfo {
    pub id: ComponentTypeId,
    pub name: &'static str,
    pub size: usize,
    pub align: usize,
    /// Bytes between consecutive rows (>= size, multiple of align).
    pub stride: usize,
    pub kind: ComponentKind,
    pub snapshotable: bool,
    pub singleton: bool,
    pub(crate) type_key: TypeId,
}

/// Unmanaged component: a plain-old-data value type.
///
/// Value types snapshot by default; override `snapshotable` to keep a type
/// out of replicas.
pub trait Component: Pod + Send + Sync + 'static {
    const NAME: &'static str;

    fn snapshotable() -> bool {
        true
    }
}

/// Managed component: an arbitrary shared object stored behind an `Arc`.
///
/// `SNAPSHOT` is the type's declared snapshot participation. Leaving it
/// `None` makes registration fail with the remedies error; see
/// [`SnapshotMode`].
pub trait ManagedComponent: Send + Sync + 'static {
    const NAME: &'static str;
    const SNAPSHOT: Option<SnapshotMode> = None;
}

/// Host-local registry: dense ids, layout metadata, name and type lookup.
pub struct ComponentRegistry {
    infos: Vec<ComponentInfo>,
    by_type: HashMap<TypeId, ComponentTypeId>,
    by_name: HashMap<&'static str, ComponentTypeId>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self {
            infos: Vec::new(),
            by_type: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Register an unmanaged component type, or return its existing id.
    pub fn register<T: Component>(&mut self) -> Result<ComponentTypeId, WorldError> {
        self.register_unmanaged::<T>(T::snapshotable(), false)
    }

    /// Register an unmanaged singleton type.
    pub fn register_singleton<T: Component>(&mut self) -> Result<ComponentTypeId, WorldError> {
        self.register_unmanaged::<T>(T::snapshotable(), true)
    }

    /// Register a managed component using the mode declared on the trait.
    pub fn register_managed<T: ManagedComponent>(&mut self) -> Result<ComponentTypeId, WorldError> {
        match T::SNAPSHOT {
            Some(mode) => self.register_managed_with::<T>(mode),
            None => Err(WorldError::SnapshotModeRequired { name: T::NAME }),
        }
    }

    /// Register a managed component with an explicit snapshot mode.
    pub fn register_managed_with<T: ManagedComponent>(
        &mut self,
        mode: SnapshotMode,
    ) -> Result<ComponentTypeId, WorldError> {
        self.insert(ComponentInfo {
            id: 0,
            name: T::NAME,
            size: 0,
            align: 1,
            stride: 0,
            kind: ComponentKind::Managed,
            snapshotable: matches!(mode, SnapshotMode::Shared),
            singleton: false,
            type_key: TypeId::of::<T>(),
        })
    }

    /// Register a managed singleton with an explicit snapshot mode.
    pub fn register_managed_singleton<T: ManagedComponent>(
        &mut self,
        mode: SnapshotMode,
    ) -> Result<ComponentTypeId, WorldError> {
        self.insert(ComponentInfo {
            id: 0,
            name: T::NAME,
            size: 0,
            align: 1,
            stride: 0,
            kind: ComponentKind::Managed,
            snapshotable: matches!(mode, SnapshotMode::Shared),
            singleton: true,
            type_key: TypeId::of::<T>(),
        })
    }

    fn register_unmanaged<T: Component>(
        &mut self,
        snapshotable: bool,
        singleton: bool,
    ) -> Result<ComponentTypeId, WorldError> {
        let size = std::mem::size_of::<T>();
        let align = std::mem::align_of::<T>();
        self.insert(ComponentInfo {
            id: 0,
            name: T::NAME,
            size,
            align,
            stride: size.next_multiple_of(align),
            kind: ComponentKind::Unmanaged,
            snapshotable,
            singleton,
            type_key: TypeId::of::<T>(),
        })
    }

    fn insert(&mut self, mut info: ComponentInfo) -> Result<ComponentTypeId, WorldError> {
        if let Some(&id) = self.by_type.get(&info.type_key) {
            let existing = &self.infos[id as usize];
            // Re-registration of the same Rust type must not change shape.
            assert_eq!(
                existing.kind, info.kind,
                "component '{}' re-registered with a different kind",
                info.name
            );
            assert_eq!(
                existing.singleton, info.singleton,
                "component '{}' re-registered with a different singleton flag",
                info.name
            );
            return Ok(id);
        }
        if let Some(&clash) = self.by_name.get(info.name) {
            panic!(
                "component name '{}' already registered under id {clash} by a different type",
                info.name
            );
        }
        if self.infos.len() >= MAX_COMPONENT_TYPES {
            return Err(WorldError::CapacityExceeded {
                what: "component type registry",
            });
        }

        let id = self.infos.len() as ComponentTypeId;
        info.id = id;
        self.by_type.insert(info.type_key, id);
        self.by_name.insert(info.name, id);
        self.infos.push(info);
        Ok(id)
    }

    pub fn id_of<T: 'static>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    pub fn id_of_key(&self, type_key: TypeId) -> Option<ComponentTypeId> {
        self.by_type.get(&type_key).copied()
    }

    pub fn id_of_name(&self, name: &str) -> Option<ComponentTypeId> {
        self.by_name.get(name).copied()
    }

    pub fn info(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.infos.get(id as usize)
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.infos.iter()
    }

    pub(crate) fn clone_infos(&self) -> Vec<ComponentInfo> {
        self.infos.clone()
    }

    pub(crate) fn from_infos(infos: Vec<ComponentInfo>) -> Self {
        let mut by_type = HashMap::new();
        let mut by_name = HashMap::new();
        for info in &infos {
            by_type.insert(info.type_key, info.id);
            by_name.insert(info.name, info.id);
        }
        Self {
            infos,
            by_type,
            by_name,
        }
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Implement [`Component`] for a POD struct.
///
/// Usage:
/// ```ignore
/// #[derive(Clone, Copy, Pod, Zeroable)]
/// #[repr(C)]
/// struct Position { x: f32, y: f32 }
/// define_component!(Position, "Position");
/// ```
#[macro_export]
macro_rules! define_component {
    ($ty:ty, $name:expr) => {
        impl $crate::Component for $ty {
            const NAME: &'static str = $name;
        }
    };
    ($ty:ty, $name:expr, transient) => {
        impl $crate::Component for $ty {
            const NAME: &'static str = $name;
            fn snapshotable() -> bool {
                false
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};

    #[derive(Clone, Copy, Pod, Zeroable)]
    #[repr(C)]
    struct Pos {
        x: f32,
        y: f32,
    }
    define_component!(Pos, "Pos");

    #[derive(Clone, Copy, Pod, Zeroable)]
    #[repr(C)]
    struct Scratch {
        v: u64,
    }
    define_component!(Scratch, "Scratch", transient);

    struct Roster {
        #[allow(dead_code)]
        members: Vec<u64>,
    }
    impl ManagedComponent for Roster {
        const NAME: &'static str = "Roster";
    }

    struct Label(#[allow(dead_code)] String);
    impl ManagedComponent for Label {
        const NAME: &'static str = "Label";
        const SNAPSHOT: Option<SnapshotMode> = Some(SnapshotMode::Shared);
    }

    #[test]
    fn dense_ids_in_registration_order() {
        let mut reg = ComponentRegistry::new();
        let a = reg.register::<Pos>().unwrap();
        let b = reg.register::<Scratch>().unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        // Idempotent
        assert_eq!(reg.register::<Pos>().unwrap(), 0);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn snapshotable_flag_follows_type() {
        let mut reg = ComponentRegistry::new();
        let pos = reg.register::<Pos>().unwrap();
        let scratch = reg.register::<Scratch>().unwrap();
        assert!(reg.info(pos).unwrap().snapshotable);
        assert!(!reg.info(scratch).unwrap().snapshotable);
    }

    #[test]
    fn managed_without_mode_is_rejected() {
        let mut reg = ComponentRegistry::new();
        let err = reg.register_managed::<Roster>().unwrap_err();
        assert!(matches!(err, WorldError::SnapshotModeRequired { name: "Roster" }));

        // Explicit opt-out is the documented remedy.
        let id = reg
            .register_managed_with::<Roster>(SnapshotMode::Transient)
            .unwrap();
        assert!(!reg.info(id).unwrap().snapshotable);
    }

    #[test]
    fn managed_with_declared_mode_registers() {
        let mut reg = ComponentRegistry::new();
        let id = reg.register_managed::<Label>().unwrap();
        let info = reg.info(id).unwrap();
        assert_eq!(info.kind, ComponentKind::Managed);
        assert!(info.snapshotable);
    }
}
