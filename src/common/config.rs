//! Configuration constants for heapstore.

/// Size of a page in bytes (4KB).
///
/// Every page on disk and every frame in the buffer pool is exactly this
/// size. Slot offsets inside a data page are stored as `u16`, so this must
/// stay below 64KB.
pub const PAGE_SIZE: usize = 4096;

/// Number of frames used when a caller does not pick a pool size.
pub const DEFAULT_POOL_SIZE: usize = 100;

/// Longest heap file name that fits in the header page.
pub const MAX_FILE_NAME_LEN: usize = 50;

/// Frame directory capacity as a multiple of the pool size.
///
/// Keeps the expected lookup cost O(1) without rehashing during steady state.
pub const DIRECTORY_LOAD_FACTOR: f64 = 1.2;

/// Capacity to reserve in the frame directory for a pool of `pool_size` frames.
pub fn directory_capacity(pool_size: usize) -> usize {
    (pool_size as f64 * DIRECTORY_LOAD_FACTOR) as usize + 1
}
