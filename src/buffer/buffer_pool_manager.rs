//! Buffer Pool Manager - the core page caching layer.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between open files and memory
//! - Pin-based reference counting
//! - Dirty page write-back on eviction, flush, and drop
//! - Clock (second chance) eviction

use parking_lot::{Mutex, RwLockReadGuard, RwLockWriteGuard};
use tracing::{error, trace, warn};

use crate::buffer::frame::{FrameDescriptor, FrameInfo, ResidentPage};
use crate::buffer::replacer::ClockReplacer;
use crate::buffer::{BufferPoolStats, Frame, FrameDirectory, FrameKey, PinnedPage};
use crate::common::{Error, FrameId, PageId, Result};
use crate::storage::page::Page;
use crate::storage::FileHandle;

/// Bookkeeping guarded by the pool mutex.
struct PoolState {
    descriptors: Vec<FrameDescriptor>,
    directory: FrameDirectory,
    replacer: ClockReplacer,
}

/// Manages a pool of buffer frames caching pages of open files.
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │                     BufferPoolManager                        │
/// │  state: Mutex<PoolState>                                     │
/// │  ┌──────────────────┐  ┌──────────────────────────────────┐  │
/// │  │ directory        │  │ descriptors: Vec<FrameDescriptor>│  │
/// │  │(file,page) → Fid │─▶│ [Free] [Resident] [Resident] ... │  │
/// │  └──────────────────┘  └──────────────────────────────────┘  │
/// │  ┌──────────────────┐  ┌──────────────────────────────────┐  │
/// │  │ replacer (clock) │  │ frames: Vec<Frame> (page bytes)  │  │
/// │  └──────────────────┘  └──────────────────────────────────┘  │
/// └──────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `state`: one `Mutex` over descriptors, directory and clock hand
/// - `frames`: no lock on the vector; each frame's bytes sit behind an `RwLock`
/// - `stats`: atomic counters
///
/// Pins are plain reference counts. A caller must hold a pin on a page for as
/// long as it holds a guard from [`page`](Self::page) or
/// [`page_mut`](Self::page_mut), and must drop the guard before unpinning.
///
/// # Usage
/// ```no_run
/// use std::sync::Arc;
/// use heapstore::{BufferPoolManager, FileManager};
///
/// let pool = Arc::new(BufferPoolManager::new(16));
/// let files = FileManager::new("/tmp/db", Arc::clone(&pool));
/// files.create_file("t").unwrap();
/// let file = files.open_file("t").unwrap();
///
/// let pinned = pool.allocate_page(&file).unwrap();
/// pool.page_mut(&pinned).as_mut_slice()[100] = 0xAB;
/// pool.unpin_page(&file, pinned.page_no(), true).unwrap();
///
/// let pinned = pool.fetch_page(&file, pinned.page_no()).unwrap();
/// assert_eq!(pool.page(&pinned).as_slice()[100], 0xAB);
/// pool.unpin_page(&file, pinned.page_no(), false).unwrap();
/// files.close_file(&file).unwrap();
/// ```
pub struct BufferPoolManager {
    frames: Vec<Frame>,
    state: Mutex<PoolState>,
    stats: BufferPoolStats,
    pool_size: usize,
}

impl BufferPoolManager {
    /// Create a pool of `pool_size` frames, all free.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        Self {
            frames: (0..pool_size).map(|_| Frame::new()).collect(),
            state: Mutex::new(PoolState {
                descriptors: vec![FrameDescriptor::Free; pool_size],
                directory: FrameDirectory::new(pool_size),
                replacer: ClockReplacer::new(pool_size),
            }),
            stats: BufferPoolStats::new(),
            pool_size,
        }
    }

    // ========================================================================
    // Public API: pin and unpin
    // ========================================================================

    /// Pin `page_no` of `file`, reading it from disk on a miss.
    ///
    /// A hit bumps the pin count and sets the reference bit without I/O.
    ///
    /// # Errors
    /// - `Error::BufferExceeded` if every frame is pinned
    /// - any error from reading the page; the pool is left as it was apart
    ///   from a possible eviction
    pub fn fetch_page(&self, file: &FileHandle, page_no: PageId) -> Result<PinnedPage> {
        let mut state = self.state.lock();
        let key = FrameKey::new(file.id(), page_no);

        match state.directory.lookup(key) {
            Ok(frame_id) => {
                if let Some(resident) = state.descriptors[frame_id.0].resident_mut() {
                    resident.pin_count += 1;
                    resident.ref_bit = true;
                }
                self.stats.record_hit();
                return Ok(PinnedPage::new(file.clone(), page_no, frame_id));
            }
            Err(Error::HashNotFound) => {}
            Err(e) => return Err(e),
        }

        self.stats.record_miss();
        let frame_id = self.allocate_frame(&mut state)?;

        state.directory.insert(key, frame_id)?;
        state.descriptors[frame_id.0] = FrameDescriptor::pinned(file.clone(), page_no);

        let read = file.read_page(page_no, &mut self.frames[frame_id.0].page_mut());
        if let Err(e) = read {
            state.descriptors[frame_id.0].clear();
            state.directory.remove(key)?;
            return Err(e);
        }

        self.stats.record_read();
        Ok(PinnedPage::new(file.clone(), page_no, frame_id))
    }

    /// Drop one pin on `page_no` of `file`, marking it dirty if `is_dirty`.
    ///
    /// The dirty flag is sticky: a clean unpin never clears an earlier dirty
    /// one.
    ///
    /// # Errors
    /// `Error::PageNotPinned` if the page is not resident or has no pins.
    pub fn unpin_page(&self, file: &FileHandle, page_no: PageId, is_dirty: bool) -> Result<()> {
        let mut state = self.state.lock();
        let frame_id = state
            .directory
            .lookup(FrameKey::new(file.id(), page_no))
            .map_err(|_| Error::PageNotPinned(page_no))?;

        match state.descriptors[frame_id.0].resident_mut() {
            Some(resident) if resident.pin_count > 0 => {
                resident.pin_count -= 1;
                resident.dirty |= is_dirty;
                Ok(())
            }
            _ => Err(Error::PageNotPinned(page_no)),
        }
    }

    // ========================================================================
    // Public API: allocate and dispose
    // ========================================================================

    /// Allocate a new page in `file` and pin it in a zeroed frame.
    ///
    /// If no frame can be found the page is handed back to the file, so a
    /// failed call does not grow it.
    ///
    /// # Errors
    /// - `Error::BufferExceeded` if every frame is pinned
    /// - I/O errors from the file
    pub fn allocate_page(&self, file: &FileHandle) -> Result<PinnedPage> {
        let mut state = self.state.lock();
        let page_no = file.allocate_page()?;

        let frame_id = match self.allocate_frame(&mut state) {
            Ok(frame_id) => frame_id,
            Err(e) => {
                if let Err(dispose_err) = file.dispose_page(page_no) {
                    warn!(
                        file = file.name(),
                        page = %page_no,
                        error = %dispose_err,
                        "could not return page after failed allocation"
                    );
                }
                return Err(e);
            }
        };
        self.stats.record_allocation();
        state
            .directory
            .insert(FrameKey::new(file.id(), page_no), frame_id)?;
        state.descriptors[frame_id.0] = FrameDescriptor::pinned(file.clone(), page_no);
        self.frames[frame_id.0].page_mut().reset();

        Ok(PinnedPage::new(file.clone(), page_no, frame_id))
    }

    /// Drop `page_no` from the pool, if cached, and free it in `file`.
    ///
    /// The cached copy is discarded whatever its pin count or dirty flag.
    pub fn dispose_page(&self, file: &FileHandle, page_no: PageId) -> Result<()> {
        {
            let mut state = self.state.lock();
            let key = FrameKey::new(file.id(), page_no);
            if let Ok(frame_id) = state.directory.lookup(key) {
                state.directory.remove(key)?;
                state.descriptors[frame_id.0].clear();
            }
        }
        file.dispose_page(page_no)
    }

    // ========================================================================
    // Public API: flush
    // ========================================================================

    /// Write back and drop every frame belonging to `file`.
    ///
    /// Frames already processed stay flushed if a later one fails.
    ///
    /// # Errors
    /// - `Error::PagePinned` if a page of `file` is still pinned
    /// - I/O errors from write-back
    pub fn flush_file(&self, file: &FileHandle) -> Result<()> {
        let mut state = self.state.lock();

        for index in 0..self.pool_size {
            let resident = match state.descriptors[index].resident() {
                Some(r) if r.file.id() == file.id() => r.clone(),
                _ => continue,
            };
            if resident.pin_count > 0 {
                return Err(Error::PagePinned(resident.page_no));
            }
            if resident.dirty {
                self.write_back(FrameId::new(index), &resident)?;
            }
            state.directory.remove(resident.key())?;
            state.descriptors[index].clear();
        }
        Ok(())
    }

    /// Write back every dirty frame without evicting anything.
    ///
    /// Pinned frames are written too; their dirty flag is cleared like any
    /// other, so a holder that modifies the page afterwards must unpin dirty.
    pub fn flush_all(&self) -> Result<()> {
        let mut state = self.state.lock();

        for index in 0..self.pool_size {
            let resident = match state.descriptors[index].resident() {
                Some(r) if r.dirty => r.clone(),
                _ => continue,
            };
            self.write_back(FrameId::new(index), &resident)?;
            if let Some(r) = state.descriptors[index].resident_mut() {
                r.dirty = false;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Public API: page access
    // ========================================================================

    /// Shared access to the bytes of a pinned page.
    #[inline]
    pub fn page(&self, pinned: &PinnedPage) -> RwLockReadGuard<'_, Page> {
        self.frames[pinned.frame_id().0].page()
    }

    /// Exclusive access to the bytes of a pinned page. The caller reports the
    /// modification through `unpin_page(.., true)`.
    #[inline]
    pub fn page_mut(&self, pinned: &PinnedPage) -> RwLockWriteGuard<'_, Page> {
        self.frames[pinned.frame_id().0].page_mut()
    }

    // ========================================================================
    // Public API: inspection
    // ========================================================================

    /// Pin count of a resident page, `None` if it is not cached.
    pub fn pin_count(&self, file: &FileHandle, page_no: PageId) -> Option<u32> {
        let state = self.state.lock();
        let frame_id = state
            .directory
            .lookup(FrameKey::new(file.id(), page_no))
            .ok()?;
        Some(state.descriptors[frame_id.0].pin_count())
    }

    /// Whether `page_no` of `file` is cached.
    pub fn is_resident(&self, file: &FileHandle, page_no: PageId) -> bool {
        self.state
            .lock()
            .directory
            .lookup(FrameKey::new(file.id(), page_no))
            .is_ok()
    }

    /// Copy of every frame descriptor, in frame order.
    pub fn frame_snapshot(&self) -> Vec<FrameInfo> {
        let state = self.state.lock();
        state
            .descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| FrameInfo::of(FrameId::new(i), d))
            .collect()
    }

    /// Directory contents, for checking against [`frame_snapshot`](Self::frame_snapshot).
    pub fn directory_entries(&self) -> Vec<(FrameKey, FrameId)> {
        self.state.lock().directory.iter().collect()
    }

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state
            .lock()
            .descriptors
            .iter()
            .filter(|d| d.is_free())
            .count()
    }

    /// Number of cached pages.
    pub fn resident_count(&self) -> usize {
        self.state.lock().directory.len()
    }

    /// Frame the clock hand points at.
    pub fn clock_hand(&self) -> FrameId {
        self.state.lock().replacer.hand()
    }

    // ========================================================================
    // Internal
    // ========================================================================

    /// Find a frame to reuse, writing back and unmapping its page if it had
    /// one. The frame is returned free.
    fn allocate_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        let frame_id = state.replacer.pick_victim(&mut state.descriptors)?;

        if let Some(victim) = state.descriptors[frame_id.0].resident().cloned() {
            if victim.dirty {
                self.write_back(frame_id, &victim)?;
            }
            state.directory.remove(victim.key())?;
            state.descriptors[frame_id.0].clear();
            self.stats.record_eviction();
            trace!(
                frame = %frame_id,
                file = victim.file.name(),
                page = %victim.page_no,
                dirty = victim.dirty,
                "evicted page"
            );
        }
        Ok(frame_id)
    }

    fn write_back(&self, frame_id: FrameId, resident: &ResidentPage) -> Result<()> {
        let page = self.frames[frame_id.0].page();
        resident.file.write_page(resident.page_no, &page)?;
        self.stats.record_write();
        Ok(())
    }
}

impl Drop for BufferPoolManager {
    fn drop(&mut self) {
        let state = self.state.lock();
        for (index, descriptor) in state.descriptors.iter().enumerate() {
            let Some(resident) = descriptor.resident() else {
                continue;
            };
            if !resident.dirty {
                continue;
            }
            if let Err(e) = self.write_back(FrameId::new(index), resident) {
                error!(
                    file = resident.file.name(),
                    page = %resident.page_no,
                    pin_count = resident.pin_count,
                    error = %e,
                    "write-back at pool shutdown failed"
                );
            }
        }
    }
}
