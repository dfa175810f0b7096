// table.rs - Chunked table for one unmanaged component type
//
// Rows live in fixed-size chunks; a dense directory maps entity index to
// (chunk, row). Mutating access stamps the owning chunk with the current
// repository version; reads never do.

use super::chunk::{Chunk, CHUNK_PAYLOAD_BYTES};
use super::INVALID_SLOT;
use crate::registry::ComponentInfo;

pub(crate) struct ComponentTable {
    stride: usize,
    rows_per_chunk: usize,
    chunks: Vec<Chunk>,
    /// entity index -> global row slot (`chunk * rows_per_chunk + row`).
    directory: Vec<u32>,
    free: Vec<u32>,
    /// Bumped whenever the directory shape changes (insert/remove).
    structure_version: u64,
}

impl ComponentTable {
    pub fn new(info: &ComponentInfo) -> Self {
        // Zero-sized types (tag components) keep occupancy only.
        let rows_per_chunk = if info.stride == 0 {
            CHUNK_PAYLOAD_BYTES
        } else {
            (CHUNK_PAYLOAD_BYTES / info.stride).max(1)
        };
        Self {
            stride: info.stride,
            rows_per_chunk,
            chunks: Vec::new(),
            directory: Vec::new(),
            free: Vec::new(),
            structure_version: 0,
        }
    }

    #[inline]
    pub fn has(&self, entity_index: u32) -> bool {
        self.directory
            .get(entity_index as usize)
            .map_or(false, |&slot| slot != INVALID_SLOT)
    }

    /// Insert or overwrite the row for `entity_index`.
    pub fn insert(&mut self, entity_index: u32, bytes: &[u8], version: u64) {
        debug_assert!(self.stride == 0 || bytes.len() == self.stride);
        if self.has(entity_index) {
            self.write(entity_index, bytes, version);
            return;
        }

        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                let slot = (self.chunks.len() * self.rows_per_chunk) as u32;
                self.chunks
                    .push(Chunk::new(self.rows_per_chunk, self.stride, version));
                // Refill the free list with the rest of the fresh chunk, last
                // row first so allocation proceeds in ascending order.
                for row in (1..self.rows_per_chunk).rev() {
                    self.free.push(slot + row as u32);
                }
                slot
            }
        };

        let dir_len = entity_index as usize + 1;
        if self.directory.len() < dir_len {
            self.directory.resize(dir_len, INVALID_SLOT);
        }
        self.directory[entity_index as usize] = slot;

        let (chunk, row) = self.locate(slot);
        let chunk = &mut self.chunks[chunk];
        chunk.set_occupied(row);
        if self.stride > 0 {
            chunk.row_bytes_mut(row, self.stride).copy_from_slice(bytes);
        }
        chunk.last_write_version = version;
        self.structure_version += 1;
    }

    /// Overwrite an existing row. Caller guarantees presence.
    pub fn write(&mut self, entity_index: u32, bytes: &[u8], version: u64) {
        let slot = self.directory[entity_index as usize];
        debug_assert_ne!(slot, INVALID_SLOT);
        let (chunk, row) = self.locate(slot);
        let chunk = &mut self.chunks[chunk];
        if self.stride > 0 {
            chunk.row_bytes_mut(row, self.stride).copy_from_slice(bytes);
        }
        chunk.last_write_version = version;
    }

    pub fn get(&self, entity_index: u32) -> Option<&[u8]> {
        let &slot = self.directory.get(entity_index as usize)?;
        if slot == INVALID_SLOT {
            return None;
        }
        let (chunk, row) = self.locate(slot);
        debug_assert!(self.chunks[chunk].is_occupied(row));
        Some(self.chunks[chunk].row_bytes(row, self.stride))
    }

    /// Mutable row access; stamps the chunk.
    pub fn get_mut(&mut self, entity_index: u32, version: u64) -> Option<&mut [u8]> {
        let &slot = self.directory.get(entity_index as usize)?;
        if slot == INVALID_SLOT {
            return None;
        }
        let (chunk_idx, row) = self.locate(slot);
        let chunk = &mut self.chunks[chunk_idx];
        chunk.last_write_version = version;
        Some(chunk.row_bytes_mut(row, self.stride))
    }

    /// Vacate the row for `entity_index`. Returns false if absent.
    pub fn remove(&mut self, entity_index: u32, version: u64) -> bool {
        let Some(&slot) = self.directory.get(entity_index as usize) else {
            return false;
        };
        if slot == INVALID_SLOT {
            return false;
        }
        self.directory[entity_index as usize] = INVALID_SLOT;
        let (chunk_idx, row) = self.locate(slot);
        let chunk = &mut self.chunks[chunk_idx];
        chunk.clear_row(row, self.stride);
        chunk.last_write_version = version;
        self.free.push(slot);
        self.structure_version += 1;
        true
    }

    /// Any chunk stamped after `version`?
    pub fn changed_since(&self, version: u64) -> bool {
        self.chunks.iter().any(|c| c.last_write_version > version)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Copy dirty chunks from `source`, guided by `mirrored` (the source
    /// chunk versions this table saw at its last sync). Returns how many
    /// chunks were copied.
    pub fn sync_from(&mut self, source: &ComponentTable, mirrored: &mut Vec<u64>) -> usize {
        debug_assert_eq!(self.stride, source.stride);
        mirrored.resize(source.chunks.len(), 0);

        let mut copied = 0;
        for (i, src_chunk) in source.chunks.iter().enumerate() {
            if src_chunk.last_write_version <= mirrored[i] {
                continue;
            }
            if i >= self.chunks.len() {
                self.chunks
                    .push(Chunk::new(self.rows_per_chunk, self.stride, 0));
            }
            self.chunks[i].copy_from(src_chunk);
            mirrored[i] = src_chunk.last_write_version;
            copied += 1;
        }

        if self.structure_version != source.structure_version {
            self.directory.clear();
            self.directory.extend_from_slice(&source.directory);
            self.free.clear();
            self.free.extend_from_slice(&source.free);
            self.structure_version = source.structure_version;
        }
        copied
    }

    /// Drop all rows but keep allocated chunks (pooled world reuse).
    pub fn soft_clear(&mut self) {
        for chunk in &mut self.chunks {
            *chunk = Chunk::new(self.rows_per_chunk, self.stride, 0);
        }
        self.directory.clear();
        self.free.clear();
        for slot in (0..self.chunks.len() * self.rows_per_chunk).rev() {
            self.free.push(slot as u32);
        }
        self.structure_version += 1;
    }

    #[inline]
    fn locate(&self, slot: u32) -> (usize, usize) {
        (
            slot as usize / self.rows_per_chunk,
            slot as usize % self.rows_per_chunk,
        )
    }
}
