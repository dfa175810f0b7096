// managed.rs - Chunked table for one managed component type
//
// Managed components are arbitrary shared objects stored behind `Arc`.
// Snapshot-shared managed types are immutable by convention, so mirroring a
// chunk clones the `Arc`s, never the objects.

use super::{ManagedRef, INVALID_SLOT};

/// Reference rows per managed chunk.
const ROWS_PER_CHUNK: usize = 1024;

pub(crate) struct ManagedChunk {
    values: Vec<Option<ManagedRef>>,
    pub(crate) last_write_version: u64,
}

impl ManagedChunk {
    fn new(version: u64) -> Self {
        Self {
            values: vec![None; ROWS_PER_CHUNK],
            last_write_version: version,
        }
    }
}

pub(crate) struct ManagedTable {
    chunks: Vec<ManagedChunk>,
    directory: Vec<u32>,
    free: Vec<u32>,
    structure_version: u64,
}

impl ManagedTable {
    pub fn new() -> Self {
        Self {
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

    pub fn insert(&mut self, entity_index: u32, value: ManagedRef, version: u64) {
        if self.has(entity_index) {
            self.write(entity_index, value, version);
            return;
        }

        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                let slot = (self.chunks.len() * ROWS_PER_CHUNK) as u32;
                self.chunks.push(ManagedChunk::new(version));
                for row in (1..ROWS_PER_CHUNK).rev() {
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

        let chunk = &mut self.chunks[slot as usize / ROWS_PER_CHUNK];
        chunk.values[slot as usize % ROWS_PER_CHUNK] = Some(value);
        chunk.last_write_version = version;
        self.structure_version += 1;
    }

    pub fn write(&mut self, entity_index: u32, value: ManagedRef, version: u64) {
        let slot = self.directory[entity_index as usize];
        debug_assert_ne!(slot, INVALID_SLOT);
        let chunk = &mut self.chunks[slot as usize / ROWS_PER_CHUNK];
        chunk.values[slot as usize % ROWS_PER_CHUNK] = Some(value);
        chunk.last_write_version = version;
    }

    pub fn get(&self, entity_index: u32) -> Option<&ManagedRef> {
        let &slot = self.directory.get(entity_index as usize)?;
        if slot == INVALID_SLOT {
            return None;
        }
        self.chunks[slot as usize / ROWS_PER_CHUNK].values[slot as usize % ROWS_PER_CHUNK].as_ref()
    }

    pub fn remove(&mut self, entity_index: u32, version: u64) -> bool {
        let Some(&slot) = self.directory.get(entity_index as usize) else {
            return false;
        };
        if slot == INVALID_SLOT {
            return false;
        }
        self.directory[entity_index as usize] = INVALID_SLOT;
        let chunk = &mut self.chunks[slot as usize / ROWS_PER_CHUNK];
        chunk.values[slot as usize % ROWS_PER_CHUNK] = None;
        chunk.last_write_version = version;
        self.free.push(slot);
        self.structure_version += 1;
        true
    }

    pub fn changed_since(&self, version: u64) -> bool {
        self.chunks.iter().any(|c| c.last_write_version > version)
    }

    /// Mirror dirty chunks by cloning the `Arc`s. Returns chunks copied.
    pub fn sync_from(&mut self, source: &ManagedTable, mirrored: &mut Vec<u64>) -> usize {
        mirrored.resize(source.chunks.len(), 0);

        let mut copied = 0;
        for (i, src_chunk) in source.chunks.iter().enumerate() {
            if src_chunk.last_write_version <= mirrored[i] {
                continue;
            }
            if i >= self.chunks.len() {
                self.chunks.push(ManagedChunk::new(0));
            }
            let dst = &mut self.chunks[i];
            dst.values.clone_from(&src_chunk.values);
            dst.last_write_version = src_chunk.last_write_version;
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

    pub fn soft_clear(&mut self) {
        for chunk in &mut self.chunks {
            chunk.values.iter_mut().for_each(|v| *v = None);
            chunk.last_write_version = 0;
        }
        self.directory.clear();
        self.free.clear();
        for slot in (0..self.chunks.len() * ROWS_PER_CHUNK).rev() {
            self.free.push(slot as u32);
        }
        self.structure_version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn shared_references_survive_mirroring() {
        let mut source = ManagedTable::new();
        let mut target = ManagedTable::new();
        let mut mirrored = Vec::new();

        let roster: ManagedRef = Arc::new(vec![1u64, 2, 3]);
        source.insert(0, Arc::clone(&roster), 1);
        assert_eq!(target.sync_from(&source, &mut mirrored), 1);

        let mirror = target.get(0).unwrap();
        assert!(Arc::ptr_eq(mirror, &roster));

        // Clean sync copies nothing.
        assert_eq!(target.sync_from(&source, &mut mirrored), 0);
    }

    #[test]
    fn remove_vacates_slot() {
        let mut table = ManagedTable::new();
        table.insert(5, Arc::new(42u32), 1);
        assert!(table.has(5));
        assert!(table.remove(5, 2));
        assert!(!table.has(5));
        assert!(table.get(5).is_none());
    }
}
