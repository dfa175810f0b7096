// chunk.rs - Fixed-size storage block for one component type
//
// Payloads are word-backed so every row stays 8-byte aligned; registration
// rejects component types with stricter alignment. Row offsets are
// `row * stride` with stride a multiple of the element alignment, so typed
// references into a chunk are always properly aligned.

/// Target payload size per chunk. Tuned for cache locality; a type whose
/// stride exceeds this still gets one row per chunk.
pub(crate) const CHUNK_PAYLOAD_BYTES: usize = 64 * 1024;

/// One block of packed component rows plus its change-tracking stamp.
pub(crate) struct Chunk {
    words: Vec<u64>,
    occupied: Vec<u64>,
    pub(crate) last_write_version: u64,
}

impl Chunk {
    pub fn new(rows: usize, stride: usize, version: u64) -> Self {
        Self {
            words: vec![0; (rows * stride).div_ceil(8)],
            occupied: vec![0; rows.div_ceil(64)],
            last_write_version: version,
        }
    }

    #[inline]
    pub fn row_bytes(&self, row: usize, stride: usize) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(
                (self.words.as_ptr() as *const u8).add(row * stride),
                stride,
            )
        }
    }

    #[inline]
    pub fn row_bytes_mut(&mut self, row: usize, stride: usize) -> &mut [u8] {
        unsafe {
            std::slice::from_raw_parts_mut(
                (self.words.as_mut_ptr() as *mut u8).add(row * stride),
                stride,
            )
        }
    }

    #[inline]
    pub fn is_occupied(&self, row: usize) -> bool {
        self.occupied[row / 64] & (1 << (row % 64)) != 0
    }

    pub fn set_occupied(&mut self, row: usize) {
        self.occupied[row / 64] |= 1 << (row % 64);
    }

    /// Vacate a row; the payload is zeroed so freed rows never leak stale
    /// values into later reads or replica copies.
    pub fn clear_row(&mut self, row: usize, stride: usize) {
        self.occupied[row / 64] &= !(1 << (row % 64));
        if stride > 0 {
            self.row_bytes_mut(row, stride).fill(0);
        }
    }

    /// Overwrite this chunk with the contents of `source`.
    pub fn copy_from(&mut self, source: &Chunk) {
        self.words.clear();
        self.words.extend_from_slice(&source.words);
        self.occupied.clear();
        self.occupied.extend_from_slice(&source.occupied);
        self.last_write_version = source.last_write_version;
    }
}
