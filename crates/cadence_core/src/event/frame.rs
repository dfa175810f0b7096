// frame.rs - Owned capture of one frame's events
//
// After the swap the orchestrator copies the current buffers into an
// EventFrame keyed by the repository version. Worker-side modules read
// events from the capture, so their view stays valid however long the task
// runs; the live bus can keep swapping underneath them.

use super::{Event, EventBus, EventTypeId, MAX_EVENT_TYPES};
use std::any::TypeId;

/// One captured stream: the frame's events of a single type.
pub struct CapturedStream {
    pub type_id: EventTypeId,
    pub name: &'static str,
    pub elem_size: usize,
    pub count: usize,
    stride: usize,
    type_key: TypeId,
    /// Word-backed so typed reads stay aligned.
    words: Box<[u64]>,
}

impl CapturedStream {
    pub fn bytes(&self) -> &[u8] {
        let len = self.count * self.stride;
        unsafe { std::slice::from_raw_parts(self.words.as_ptr() as *const u8, len) }
    }
}

/// Immutable snapshot of every active stream in one frame.
pub struct EventFrame {
    version: u64,
    streams: Vec<CapturedStream>,
    active: [u64; MAX_EVENT_TYPES / 64],
}

impl EventFrame {
    /// An empty frame (no events captured yet).
    pub fn empty(version: u64) -> Self {
        Self {
            version,
            streams: Vec::new(),
            active: [0; MAX_EVENT_TYPES / 64],
        }
    }

    pub(super) fn capture(bus: &EventBus, version: u64) -> Self {
        let mut frame = Self::empty(version);
        for (info, view) in bus.streams() {
            let src = view.bytes();
            let mut words = vec![0u64; src.len().div_ceil(8)].into_boxed_slice();
            unsafe {
                std::ptr::copy_nonoverlapping(
                    src.as_ptr(),
                    words.as_mut_ptr() as *mut u8,
                    src.len(),
                );
            }
            frame.active[info.id as usize / 64] |= 1 << (info.id as usize % 64);
            frame.streams.push(CapturedStream {
                type_id: info.id,
                name: info.name,
                elem_size: info.size,
                count: view.count(),
                stride: info.stride,
                type_key: info.type_key,
                words,
            });
        }
        frame
    }

    /// Repository version this frame was captured at.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn has_event(&self, id: EventTypeId) -> bool {
        self.active[id as usize / 64] & (1 << (id as usize % 64)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn streams(&self) -> impl Iterator<Item = &CapturedStream> {
        self.streams.iter()
    }

    /// Typed read of the captured events of `E`; empty slice if none.
    pub fn read<E: Event>(&self) -> &[E] {
        let key = TypeId::of::<E>();
        let Some(stream) = self.streams.iter().find(|s| s.type_key == key) else {
            return &[];
        };
        if std::mem::size_of::<E>() == 0 {
            return unsafe {
                std::slice::from_raw_parts(std::ptr::NonNull::dangling().as_ptr(), stream.count)
            };
        }
        let ptr = stream.words.as_ptr() as *const E;
        debug_assert_eq!(ptr as usize % std::mem::align_of::<E>(), 0);
        unsafe { std::slice::from_raw_parts(ptr, stream.count) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Ping {
        seq: u32,
    }
    impl Event for Ping {
        const NAME: &'static str = "Ping";
    }

    #[derive(Clone, Copy, Pod, Zeroable)]
    #[repr(C)]
    struct Pong {
        seq: u32,
    }
    impl Event for Pong {
        const NAME: &'static str = "Pong";
    }

    #[test]
    fn capture_preserves_payload_and_type_set() {
        let mut bus = EventBus::new();
        let ping = bus.register::<Ping>().unwrap();
        let pong = bus.register::<Pong>().unwrap();

        bus.publish(Ping { seq: 1 }).unwrap();
        bus.publish(Ping { seq: 2 }).unwrap();
        bus.swap_buffers();

        let frame = bus.capture_frame(17);
        assert_eq!(frame.version(), 17);
        assert!(frame.has_event(ping));
        assert!(!frame.has_event(pong));
        assert_eq!(frame.read::<Ping>(), &[Ping { seq: 1 }, Ping { seq: 2 }]);
        assert!(frame.read::<Pong>().is_empty());
    }

    #[test]
    fn capture_outlives_later_swaps() {
        let mut bus = EventBus::new();
        bus.register::<Ping>().unwrap();
        bus.publish(Ping { seq: 9 }).unwrap();
        bus.swap_buffers();

        let frame = bus.capture_frame(1);
        bus.swap_buffers();
        bus.swap_buffers();
        assert_eq!(frame.read::<Ping>(), &[Ping { seq: 9 }]);
    }
}
