// query.rs - Archetype-mask queries over live entities
//
// The builder accumulates include/exclude masks and a lifecycle filter; the
// iterator is a plain value type walking the slot table, so steady-state
// iteration allocates nothing.

use crate::entity::{Entity, EntitySlot, Lifecycle};
use crate::mask::ComponentMask;
use crate::world::World;

#[inline]
fn lifecycle_bit(state: Lifecycle) -> u8 {
    match state {
        Lifecycle::Ghost => 1 << 0,
        Lifecycle::Constructing => 1 << 1,
        Lifecycle::Active => 1 << 2,
        Lifecycle::TearDown => 1 << 3,
        Lifecycle::Dead => 1 << 4,
    }
}

pub struct QueryBuilder<'w> {
    world: &'w World,
    include: ComponentMask,
    exclude: ComponentMask,
    lifecycles: u8,
    /// Set when an unregistered type is required; nothing can match.
    impossible: bool,
}

impl<'w> QueryBuilder<'w> {
    pub(crate) fn new(world: &'w World) -> Self {
        Self {
            world,
            include: ComponentMask::EMPTY,
            exclude: ComponentMask::EMPTY,
            lifecycles: lifecycle_bit(Lifecycle::Active),
            impossible: false,
        }
    }

    /// Require component `T`. Requiring an unregistered type yields an
    /// empty query (no entity can carry it).
    pub fn with<T: 'static>(mut self) -> Self {
        match self.world.component_id::<T>() {
            Some(id) => self.include.set(id),
            None => self.impossible = true,
        }
        self
    }

    /// Exclude entities carrying `T`. Excluding an unregistered type is a
    /// no-op.
    pub fn without<T: 'static>(mut self) -> Self {
        if let Some(id) = self.world.component_id::<T>() {
            self.exclude.set(id);
        }
        self
    }

    /// Widen the lifecycle filter (Active stays included).
    pub fn include_lifecycle(mut self, state: Lifecycle) -> Self {
        self.lifecycles |= lifecycle_bit(state);
        self
    }

    /// Replace the lifecycle filter entirely.
    pub fn only_lifecycle(mut self, state: Lifecycle) -> Self {
        self.lifecycles = lifecycle_bit(state);
        self
    }

    pub fn iter(self) -> QueryIter<'w> {
        QueryIter {
            slots: self.world.entity_slots(),
            next: 0,
            include: self.include,
            exclude: self.exclude,
            lifecycles: if self.impossible { 0 } else { self.lifecycles },
        }
    }
}

/// Allocation-free iterator over matching live entities.
pub struct QueryIter<'w> {
    slots: &'w [EntitySlot],
    next: u32,
    include: ComponentMask,
    exclude: ComponentMask,
    lifecycles: u8,
}

impl<'w> Iterator for QueryIter<'w> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        while (self.next as usize) < self.slots.len() {
            let index = self.next;
            self.next += 1;
            let slot = &self.slots[index as usize];

            if self.lifecycles & lifecycle_bit(slot.lifecycle) == 0 {
                continue;
            }
            if !slot.mask.contains_all(&self.include) {
                continue;
            }
            if slot.mask.intersects(&self.exclude) {
                continue;
            }
            return Some(Entity::from_parts(index, slot.generation));
        }
        None
    }
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
    struct Velocity {
        x: f32,
        y: f32,
    }
    crate::define_component!(Velocity, "Velocity");

    #[derive(Clone, Copy, Pod, Zeroable)]
    #[repr(C)]
    struct Frozen {
        _pad: u8,
    }
    crate::define_component!(Frozen, "Frozen");

    // Never registered; only used to probe the builder's unknown-type path.
    struct Unregistered;

    fn world() -> World {
        let mut world = World::new();
        world.register_component::<Position>().unwrap();
        world.register_component::<Velocity>().unwrap();
        world.register_component::<Frozen>().unwrap();
        world
    }

    #[test]
    fn include_and_exclude_masks() {
        let mut world = world();
        let moving = world.create_entity().unwrap();
        world
            .add_component(moving, Position { x: 0.0, y: 0.0 })
            .unwrap();
        world
            .add_component(moving, Velocity { x: 1.0, y: 0.0 })
            .unwrap();

        let frozen = world.create_entity().unwrap();
        world
            .add_component(frozen, Position { x: 5.0, y: 5.0 })
            .unwrap();
        world.add_component(frozen, Frozen { _pad: 0 }).unwrap();

        let both: Vec<_> = world.query().with::<Position>().iter().collect();
        assert_eq!(both.len(), 2);

        let movers: Vec<_> = world
            .query()
            .with::<Position>()
            .with::<Velocity>()
            .iter()
            .collect();
        assert_eq!(movers, vec![moving]);

        let unfrozen: Vec<_> = world
            .query()
            .with::<Position>()
            .without::<Frozen>()
            .iter()
            .collect();
        assert_eq!(unfrozen, vec![moving]);
    }

    #[test]
    fn default_filter_is_active_only() {
        let mut world = world();
        let ghost = world
            .create_entity_with(crate::Lifecycle::Ghost)
            .unwrap();
        world
            .add_component(ghost, Position { x: 0.0, y: 0.0 })
            .unwrap();
        let active = world.create_entity().unwrap();
        world
            .add_component(active, Position { x: 1.0, y: 1.0 })
            .unwrap();

        let default: Vec<_> = world.query().with::<Position>().iter().collect();
        assert_eq!(default, vec![active]);

        let widened: Vec<_> = world
            .query()
            .with::<Position>()
            .include_lifecycle(crate::Lifecycle::Ghost)
            .iter()
            .collect();
        assert_eq!(widened.len(), 2);

        let ghosts: Vec<_> = world
            .query()
            .with::<Position>()
            .only_lifecycle(crate::Lifecycle::Ghost)
            .iter()
            .collect();
        assert_eq!(ghosts, vec![ghost]);
    }

    #[test]
    fn destroyed_entities_never_match() {
        let mut world = world();
        let e = world.create_entity().unwrap();
        world.add_component(e, Position { x: 0.0, y: 0.0 }).unwrap();
        world.destroy_entity(e).unwrap();
        assert_eq!(world.query().with::<Position>().iter().count(), 0);
    }

    #[test]
    fn unregistered_requirement_matches_nothing() {
        let mut world = world();
        let e = world.create_entity().unwrap();
        world.add_component(e, Position { x: 0.0, y: 0.0 }).unwrap();

        assert_eq!(
            world
                .query()
                .with::<Position>()
                .with::<Unregistered>()
                .iter()
                .count(),
            0
        );
        // Excluding an unregistered type changes nothing.
        assert_eq!(
            world
                .query()
                .with::<Position>()
                .without::<Unregistered>()
                .iter()
                .count(),
            1
        );
    }
}
