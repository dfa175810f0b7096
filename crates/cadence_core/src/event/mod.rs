// mod.rs - Type-indexed double-buffered event transport
//
// Events published in frame N become consumable after the swap that ends
// frame N; there is no same-frame delivery. Publish is multi-writer and
// lock-free on the steady path; swap is single-writer (orchestrator).

mod channel;
mod frame;

pub use channel::{EventSpan, RawEventView};
pub use frame::{CapturedStream, EventFrame};

use crate::error::WorldError;
use bytemuck::Pod;
use channel::EventChannel;
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};

/// Dense event type id, `< MAX_EVENT_TYPES`.
pub type EventTypeId = u16;

/// Upper bound on registered event types (active-type sets are fixed-width).
pub const MAX_EVENT_TYPES: usize = 256;

const SET_WORDS: usize = MAX_EVENT_TYPES / 64;

/// Event payload: a plain-old-data value type.
pub trait Event: Pod + Send + Sync + 'static {
    const NAME: &'static str;
}

/// Layout metadata for a registered event type.
#[derive(Clone, Debug)]
pub struct EventInfo {
    pub id: EventTypeId,
    pub name: &'static str,
    pub size: usize,
    pub stride: usize,
    pub(crate) type_key: TypeId,
}

/// Per-type double-buffered event bus.
pub struct EventBus {
    channels: Vec<EventChannel>,
    by_type: DashMap<TypeId, EventTypeId>,
    /// Types published since the last swap (pending side).
    pending_set: [AtomicU64; SET_WORDS],
    /// Types present in the current buffers (reset by swap).
    current_set: [AtomicU64; SET_WORDS],
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
            by_type: DashMap::new(),
            pending_set: std::array::from_fn(|_| AtomicU64::new(0)),
            current_set: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Register an event type, or return its existing id.
    ///
    /// Payload alignment must not exceed 8; buffers are word-backed.
    pub fn register<E: Event>(&mut self) -> Result<EventTypeId, WorldError> {
        let key = TypeId::of::<E>();
        if let Some(id) = self.by_type.get(&key) {
            return Ok(*id);
        }
        if self.channels.len() >= MAX_EVENT_TYPES {
            return Err(WorldError::CapacityExceeded {
                what: "event type registry",
            });
        }
        let align = std::mem::align_of::<E>();
        assert!(
            align <= 8,
            "event '{}' alignment {align} exceeds the 8-byte buffer alignment",
            E::NAME
        );

        let id = self.channels.len() as EventTypeId;
        let size = std::mem::size_of::<E>();
        self.channels.push(EventChannel::new(EventInfo {
            id,
            name: E::NAME,
            size,
            stride: size.next_multiple_of(align.max(1)),
            type_key: key,
        }));
        self.by_type.insert(key, id);
        Ok(id)
    }

    pub fn id_of<E: Event>(&self) -> Option<EventTypeId> {
        self.by_type.get(&TypeId::of::<E>()).map(|id| *id)
    }

    /// Append an event to the pending buffer. Callable from any thread.
    pub fn publish<E: Event>(&self, value: E) -> Result<(), WorldError> {
        let id = self
            .id_of::<E>()
            .ok_or(WorldError::NotRegistered { name: E::NAME })?;
        self.channels[id as usize].publish_bytes(bytemuck::bytes_of(&value));
        self.mark_pending(id);
        Ok(())
    }

    /// Append a pre-serialized event (command-buffer playback path).
    pub fn publish_raw(&self, type_key: TypeId, bytes: &[u8]) -> Result<(), WorldError> {
        let id = self
            .by_type
            .get(&type_key)
            .map(|id| *id)
            .ok_or(WorldError::NotRegistered {
                name: "<raw event>",
            })?;
        self.channels[id as usize].publish_bytes(bytes);
        self.mark_pending(id);
        Ok(())
    }

    fn mark_pending(&self, id: EventTypeId) {
        self.pending_set[id as usize / 64].fetch_or(1 << (id as usize % 64), Ordering::AcqRel);
    }

    /// Promote pending buffers to current and reset the active-type set.
    ///
    /// Single-writer: only the orchestrator calls this, once per frame.
    pub fn swap_buffers(&self) {
        for channel in &self.channels {
            channel.swap();
        }
        for word in 0..SET_WORDS {
            let published = self.pending_set[word].swap(0, Ordering::AcqRel);
            self.current_set[word].store(published, Ordering::Release);
        }
    }

    /// Zero-copy span over the current buffer of `E`. Repeated calls within
    /// one frame observe identical data.
    pub fn consume<E: Event>(&self) -> Result<EventSpan<'_, E>, WorldError> {
        let id = self
            .id_of::<E>()
            .ok_or(WorldError::NotRegistered { name: E::NAME })?;
        Ok(self.channels[id as usize].current_view().typed())
    }

    /// True iff at least one event of this type survived the last swap.
    pub fn has_event(&self, id: EventTypeId) -> bool {
        self.current_set[id as usize / 64].load(Ordering::Acquire) & (1 << (id as usize % 64)) != 0
    }

    pub fn has_event_of<E: Event>(&self) -> bool {
        self.id_of::<E>().map_or(false, |id| self.has_event(id))
    }

    /// Enumerate the active current-buffer streams for serialization.
    pub fn streams(&self) -> impl Iterator<Item = (EventInfo, RawEventView<'_>)> {
        self.channels.iter().filter_map(|channel| {
            let view = channel.current_view();
            if view.count() == 0 {
                None
            } else {
                Some((channel.info.clone(), view))
            }
        })
    }

    /// Copy the frame's events into an owned capture (the accumulator entry
    /// handed to worker-side modules).
    pub fn capture_frame(&self, version: u64) -> EventFrame {
        EventFrame::capture(self, version)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};
    use std::sync::Arc;

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Collision {
        v: u32,
    }
    impl Event for Collision {
        const NAME: &'static str = "Collision";
    }

    #[derive(Clone, Copy, Pod, Zeroable)]
    #[repr(C)]
    struct Spawned {
        id: u64,
    }
    impl Event for Spawned {
        const NAME: &'static str = "Spawned";
    }

    #[test]
    fn delivery_is_delayed_one_swap() {
        // Publish -> invisible -> swap -> visible once -> swap -> gone.
        let mut bus = EventBus::new();
        bus.register::<Collision>().unwrap();

        bus.publish(Collision { v: 42 }).unwrap();
        assert!(bus.consume::<Collision>().unwrap().is_empty());

        bus.swap_buffers();
        let span = bus.consume::<Collision>().unwrap();
        assert_eq!(span.as_slice(), &[Collision { v: 42 }]);
        drop(span);

        bus.swap_buffers();
        assert!(bus.consume::<Collision>().unwrap().is_empty());
    }

    #[test]
    fn repeated_consume_is_idempotent() {
        let mut bus = EventBus::new();
        bus.register::<Collision>().unwrap();
        bus.publish(Collision { v: 1 }).unwrap();
        bus.publish(Collision { v: 2 }).unwrap();
        bus.swap_buffers();

        let first: Vec<_> = bus.consume::<Collision>().unwrap().to_vec();
        let second: Vec<_> = bus.consume::<Collision>().unwrap().to_vec();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn active_type_set_resets_on_swap() {
        let mut bus = EventBus::new();
        let collision = bus.register::<Collision>().unwrap();
        let spawned = bus.register::<Spawned>().unwrap();

        bus.publish(Collision { v: 9 }).unwrap();
        assert!(!bus.has_event(collision));

        bus.swap_buffers();
        assert!(bus.has_event(collision));
        assert!(!bus.has_event(spawned));

        bus.swap_buffers();
        assert!(!bus.has_event(collision));
    }

    #[test]
    fn overflow_doubles_capacity() {
        let mut bus = EventBus::new();
        bus.register::<Collision>().unwrap();
        // Well past the initial 1024-element capacity.
        for v in 0..3000u32 {
            bus.publish(Collision { v }).unwrap();
        }
        bus.swap_buffers();
        let span = bus.consume::<Collision>().unwrap();
        assert_eq!(span.len(), 3000);
        assert_eq!(span[2999], Collision { v: 2999 });
    }

    #[test]
    fn concurrent_publishers_lose_nothing() {
        // Ten workers, a thousand events each; the union must survive the swap.
        let mut bus = EventBus::new();
        bus.register::<Collision>().unwrap();
        let bus = Arc::new(bus);

        let handles: Vec<_> = (0..10u32)
            .map(|worker| {
                let bus = Arc::clone(&bus);
                std::thread::spawn(move || {
                    for i in 0..1000u32 {
                        bus.publish(Collision {
                            v: worker * 1000 + i,
                        })
                        .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        bus.swap_buffers();
        let span = bus.consume::<Collision>().unwrap();
        assert_eq!(span.len(), 10_000);

        let mut seen: Vec<u32> = span.iter().map(|c| c.v).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 10_000);
        assert_eq!(seen[0], 0);
        assert_eq!(seen[9999], 9999);
    }

    #[test]
    fn streams_enumerate_active_types_only() {
        let mut bus = EventBus::new();
        bus.register::<Collision>().unwrap();
        bus.register::<Spawned>().unwrap();

        bus.publish(Spawned { id: 77 }).unwrap();
        bus.swap_buffers();

        let streams: Vec<_> = bus.streams().collect();
        assert_eq!(streams.len(), 1);
        let (info, view) = &streams[0];
        assert_eq!(info.name, "Spawned");
        assert_eq!(view.count(), 1);
        assert_eq!(view.bytes().len(), std::mem::size_of::<Spawned>());
    }
}
