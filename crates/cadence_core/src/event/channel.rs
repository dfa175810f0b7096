// channel.rs - Double-buffered event channel for one event type
//
// Two append buffers per type. Publish reserves a slot in the pending buffer
// with an atomic fetch-add and writes the payload bytes through disjoint
// slots; capacity growth is serialized by the buffer's RwLock (publishers
// hold the shared side while writing, the grower takes the exclusive side,
// so a reserved writer never dangles into a reallocated allocation).
//
// swap() is single-writer: only the orchestrator rotates roles.

use crate::event::EventInfo;
use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard};

/// Initial capacity per buffer, in events.
pub(crate) const INITIAL_EVENT_CAPACITY: usize = 1024;

/// Word-aligned payload storage. Backing words keep every row aligned to 8
/// bytes; event registration rejects stricter alignments.
pub(crate) struct RawStorage {
    words: Box<[UnsafeCell<u64>]>,
    capacity_rows: usize,
}

// Rows are written through disjoint offsets while the RwLock is held shared.
unsafe impl Sync for RawStorage {}
unsafe impl Send for RawStorage {}

impl RawStorage {
    fn new(rows: usize, stride: usize) -> Self {
        let words = (rows * stride).div_ceil(8);
        Self {
            words: (0..words).map(|_| UnsafeCell::new(0)).collect(),
            capacity_rows: rows,
        }
    }

    #[inline]
    pub(crate) fn capacity_rows(&self) -> usize {
        self.capacity_rows
    }

    #[inline]
    pub(crate) fn base_ptr(&self) -> *const u8 {
        self.words.as_ptr() as *const u8
    }

    /// Write one row. Caller holds at least the shared lock and owns `row`
    /// exclusively (it was reserved via fetch-add).
    unsafe fn write_row(&self, row: usize, bytes: &[u8], stride: usize) {
        debug_assert!(row < self.capacity_rows);
        debug_assert!(bytes.len() <= stride);
        let dst = (self.words.as_ptr() as *mut u8).add(row * stride);
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
    }

    fn grow_to(&mut self, rows: usize, stride: usize) {
        let mut grown = RawStorage::new(rows, stride);
        let used = self.words.len();
        // Exclusive access on both sides: plain copy of the old payload.
        for (i, cell) in grown.words.iter_mut().take(used).enumerate() {
            *cell = UnsafeCell::new(unsafe { *self.words[i].get() });
        }
        *self = grown;
    }
}

struct EventBuffer {
    storage: RwLock<RawStorage>,
    count: AtomicUsize,
}

impl EventBuffer {
    fn new(stride: usize) -> Self {
        Self {
            storage: RwLock::new(RawStorage::new(INITIAL_EVENT_CAPACITY, stride)),
            count: AtomicUsize::new(0),
        }
    }
}

pub(crate) struct EventChannel {
    pub(crate) info: EventInfo,
    buffers: [EventBuffer; 2],
    /// Index of the pending (publish-target) buffer.
    pending: AtomicUsize,
}

impl EventChannel {
    pub fn new(info: EventInfo) -> Self {
        let stride = info.stride;
        Self {
            info,
            buffers: [EventBuffer::new(stride), EventBuffer::new(stride)],
            pending: AtomicUsize::new(0),
        }
    }

    /// Append one event to the pending buffer. Thread-safe.
    pub fn publish_bytes(&self, bytes: &[u8]) {
        let stride = self.info.stride;
        let buffer = &self.buffers[self.pending.load(Ordering::Acquire)];
        let row = buffer.count.fetch_add(1, Ordering::AcqRel);

        if stride == 0 {
            return;
        }
        loop {
            {
                let guard = buffer.storage.read().unwrap();
                if row < guard.capacity_rows() {
                    unsafe { guard.write_row(row, bytes, stride) };
                    return;
                }
            }
            let mut grower = buffer.storage.write().unwrap();
            if row >= grower.capacity_rows() {
                let target = grower
                    .capacity_rows()
                    .max(INITIAL_EVENT_CAPACITY)
                    .checked_mul(2)
                    .expect("event buffer capacity overflow")
                    .max(row + 1)
                    .next_power_of_two();
                grower.grow_to(target, stride);
            }
        }
    }

    /// Rotate roles: clear the outgoing current buffer and make it pending.
    /// Single-writer (orchestrator).
    pub fn swap(&self) {
        let old_pending = self.pending.load(Ordering::Acquire);
        let old_current = 1 - old_pending;
        self.buffers[old_current].count.store(0, Ordering::Release);
        self.pending.store(old_current, Ordering::Release);
    }

    /// Zero-copy view over the current buffer.
    pub fn current_view(&self) -> RawEventView<'_> {
        let current = 1 - self.pending.load(Ordering::Acquire);
        let buffer = &self.buffers[current];
        let count = buffer.count.load(Ordering::Acquire);
        let guard = buffer.storage.read().unwrap();
        let count = count.min(guard.capacity_rows());
        RawEventView {
            guard,
            count,
            stride: self.info.stride,
        }
    }
}

/// Guarded view over one buffer's raw payload. Holding it pins the
/// allocation: a concurrent grower blocks until the view is dropped.
pub struct RawEventView<'a> {
    guard: RwLockReadGuard<'a, RawStorage>,
    count: usize,
    stride: usize,
}

impl<'a> RawEventView<'a> {
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn bytes(&self) -> &[u8] {
        if self.stride == 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.guard.base_ptr(), self.count * self.stride) }
    }

    /// Reinterpret as a typed span. Caller guarantees `E` matches the
    /// channel's registered type.
    pub(crate) fn typed<E>(self) -> EventSpan<'a, E> {
        EventSpan {
            view: self,
            _marker: PhantomData,
        }
    }
}

/// Typed zero-copy span over the current buffer of one event type.
pub struct EventSpan<'a, E> {
    view: RawEventView<'a>,
    _marker: PhantomData<&'a [E]>,
}

impl<'a, E> EventSpan<'a, E> {
    pub fn as_slice(&self) -> &[E] {
        let count = self.view.count;
        if std::mem::size_of::<E>() == 0 {
            return unsafe {
                std::slice::from_raw_parts(std::ptr::NonNull::dangling().as_ptr(), count)
            };
        }
        let ptr = self.view.guard.base_ptr();
        debug_assert_eq!(ptr as usize % std::mem::align_of::<E>(), 0);
        unsafe { std::slice::from_raw_parts(ptr as *const E, count) }
    }

    pub fn len(&self) -> usize {
        self.view.count
    }

    pub fn is_empty(&self) -> bool {
        self.view.count == 0
    }
}

impl<'a, E> std::ops::Deref for EventSpan<'a, E> {
    type Target = [E];

    fn deref(&self) -> &[E] {
        self.as_slice()
    }
}
