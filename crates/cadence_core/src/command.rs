// command.rs - Deferred structural command journal
//
// Worker threads never touch the live repository; they record structural
// intent here and the orchestrator plays the journal back at the harvest
// point. Created entities get negative temp ids that later commands in the
// same buffer may reference; playback remaps them to the real handles it
// allocates.

use crate::entity::{Entity, Lifecycle};
use crate::error::WorldError;
use crate::event::{Event, EventBus};
use crate::registry::{Component, ManagedComponent};
use crate::storage::ManagedRef;
use crate::world::World;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// Target of a deferred command: a live handle or a temp id from
/// [`CommandBuffer::create_entity`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EntityRef {
    Live(Entity),
    Temp(i32),
}

impl From<Entity> for EntityRef {
    fn from(entity: Entity) -> Self {
        EntityRef::Live(entity)
    }
}

enum Command {
    Create {
        temp: i32,
        lifecycle: Lifecycle,
    },
    Destroy {
        target: EntityRef,
    },
    AddComponent {
        target: EntityRef,
        type_key: TypeId,
        name: &'static str,
        bytes: Vec<u8>,
    },
    SetComponent {
        target: EntityRef,
        type_key: TypeId,
        name: &'static str,
        bytes: Vec<u8>,
    },
    RemoveComponent {
        target: EntityRef,
        type_key: TypeId,
        name: &'static str,
    },
    AddManaged {
        target: EntityRef,
        type_key: TypeId,
        name: &'static str,
        value: ManagedRef,
    },
    SetManaged {
        target: EntityRef,
        type_key: TypeId,
        name: &'static str,
        value: ManagedRef,
    },
    SetLifecycle {
        target: EntityRef,
        state: Lifecycle,
    },
    PublishEvent {
        type_key: TypeId,
        name: &'static str,
        bytes: Vec<u8>,
    },
}

/// What playback did; stale-target skips are counted, not fatal.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackStats {
    pub applied: usize,
    pub skipped: usize,
}

/// FIFO journal of structural commands.
pub struct CommandBuffer {
    commands: Vec<Command>,
    next_temp: i32,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            next_temp: -1,
        }
    }

    /// Queue entity creation; the returned temp ref is valid as a target in
    /// every later command of this buffer.
    pub fn create_entity(&mut self) -> EntityRef {
        self.create_entity_with(Lifecycle::Active)
    }

    pub fn create_entity_with(&mut self, lifecycle: Lifecycle) -> EntityRef {
        let temp = self.next_temp;
        self.next_temp -= 1;
        self.commands.push(Command::Create { temp, lifecycle });
        EntityRef::Temp(temp)
    }

    pub fn destroy_entity(&mut self, target: impl Into<EntityRef>) {
        self.commands.push(Command::Destroy {
            target: target.into(),
        });
    }

    pub fn add_component<T: Component>(&mut self, target: impl Into<EntityRef>, value: T) {
        self.commands.push(Command::AddComponent {
            target: target.into(),
            type_key: TypeId::of::<T>(),
            name: T::NAME,
            bytes: bytemuck::bytes_of(&value).to_vec(),
        });
    }

    pub fn set_component<T: Component>(&mut self, target: impl Into<EntityRef>, value: T) {
        self.commands.push(Command::SetComponent {
            target: target.into(),
            type_key: TypeId::of::<T>(),
            name: T::NAME,
            bytes: bytemuck::bytes_of(&value).to_vec(),
        });
    }

    pub fn remove_component<T: Component>(&mut self, target: impl Into<EntityRef>) {
        self.commands.push(Command::RemoveComponent {
            target: target.into(),
            type_key: TypeId::of::<T>(),
            name: T::NAME,
        });
    }

    pub fn add_managed<T: ManagedComponent>(&mut self, target: impl Into<EntityRef>, value: T) {
        self.commands.push(Command::AddManaged {
            target: target.into(),
            type_key: TypeId::of::<T>(),
            name: T::NAME,
            value: Arc::new(value),
        });
    }

    pub fn set_managed<T: ManagedComponent>(&mut self, target: impl Into<EntityRef>, value: T) {
        self.commands.push(Command::SetManaged {
            target: target.into(),
            type_key: TypeId::of::<T>(),
            name: T::NAME,
            value: Arc::new(value),
        });
    }

    pub fn set_lifecycle(&mut self, target: impl Into<EntityRef>, state: Lifecycle) {
        self.commands.push(Command::SetLifecycle {
            target: target.into(),
            state,
        });
    }

    /// Queue an event publish; it reaches the bus during playback, so
    /// delivery follows the normal one-swap delay from the playback frame.
    pub fn publish<E: Event>(&mut self, value: E) {
        self.commands.push(Command::PublishEvent {
            type_key: TypeId::of::<E>(),
            name: E::NAME,
            bytes: bytemuck::bytes_of(&value).to_vec(),
        });
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.next_temp = -1;
    }

    /// Apply the journal in FIFO order against the live repository.
    ///
    /// Commands whose target died since recording (or whose temp id never
    /// resolved) are logged and skipped; registration and phase errors
    /// propagate, since those are developer mistakes.
    pub fn playback(
        &mut self,
        world: &mut World,
        bus: &EventBus,
    ) -> Result<PlaybackStats, WorldError> {
        let mut stats = PlaybackStats::default();
        let mut temp_map: HashMap<i32, Entity> = HashMap::new();

        for command in self.commands.drain(..) {
            match command {
                Command::Create { temp, lifecycle } => {
                    let entity = world.create_entity_with(lifecycle)?;
                    temp_map.insert(temp, entity);
                    stats.applied += 1;
                }
                Command::Destroy { target } => {
                    match resolve(&temp_map, target) {
                        Some(entity) => match world.destroy_entity(entity) {
                            Ok(()) => stats.applied += 1,
                            Err(WorldError::NotAlive) => skip(&mut stats, "destroy", target),
                            Err(other) => return Err(other),
                        },
                        None => skip(&mut stats, "destroy", target),
                    };
                }
                Command::AddComponent {
                    target,
                    type_key,
                    name,
                    bytes,
                } => {
                    apply(&mut stats, "add_component", target, &temp_map, |entity| {
                        world.add_component_by_key(entity, type_key, name, &bytes)
                    })?;
                }
                Command::SetComponent {
                    target,
                    type_key,
                    name,
                    bytes,
                } => {
                    apply(&mut stats, "set_component", target, &temp_map, |entity| {
                        world.set_component_by_key(entity, type_key, name, &bytes)
                    })?;
                }
                Command::RemoveComponent {
                    target,
                    type_key,
                    name,
                } => {
                    apply(&mut stats, "remove_component", target, &temp_map, |entity| {
                        world.remove_component_by_key(entity, type_key, name)
                    })?;
                }
                Command::AddManaged {
                    target,
                    type_key,
                    name,
                    value,
                } => {
                    apply(&mut stats, "add_managed", target, &temp_map, |entity| {
                        world.add_managed_by_key(entity, type_key, name, value.clone())
                    })?;
                }
                Command::SetManaged {
                    target,
                    type_key,
                    name,
                    value,
                } => {
                    apply(&mut stats, "set_managed", target, &temp_map, |entity| {
                        world.set_managed_by_key(entity, type_key, name, value.clone())
                    })?;
                }
                Command::SetLifecycle { target, state } => {
                    apply(&mut stats, "set_lifecycle", target, &temp_map, |entity| {
                        world.set_lifecycle(entity, state)
                    })?;
                }
                Command::PublishEvent {
                    type_key,
                    name,
                    bytes,
                } => {
                    bus.publish_raw(type_key, &bytes).map_err(|_| {
                        WorldError::NotRegistered { name }
                    })?;
                    stats.applied += 1;
                }
            }
        }
        self.next_temp = -1;
        Ok(stats)
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve(temp_map: &HashMap<i32, Entity>, target: EntityRef) -> Option<Entity> {
    match target {
        EntityRef::Live(entity) => Some(entity),
        EntityRef::Temp(id) => temp_map.get(&id).copied(),
    }
}

fn skip(stats: &mut PlaybackStats, op: &str, target: EntityRef) {
    tracing::warn!(?target, op, "command target is gone; skipping");
    stats.skipped += 1;
}

fn apply(
    stats: &mut PlaybackStats,
    op: &str,
    target: EntityRef,
    temp_map: &HashMap<i32, Entity>,
    f: impl FnOnce(Entity) -> Result<(), WorldError>,
) -> Result<(), WorldError> {
    match resolve(temp_map, target) {
        Some(entity) => match f(entity) {
            Ok(()) => {
                stats.applied += 1;
                Ok(())
            }
            Err(WorldError::NotAlive) => {
                skip(stats, op, target);
                Ok(())
            }
            Err(other) => Err(other),
        },
        None => {
            skip(stats, op, target);
            Ok(())
        }
    }
}
