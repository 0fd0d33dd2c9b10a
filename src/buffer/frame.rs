//! Frame - a slot in the buffer pool.
//!
//! A [`Frame`] holds the bytes of one cached page. Its bookkeeping lives in a
//! [`FrameDescriptor`], which is either `Free` or `Resident`; a free frame
//! carries no file, no pins, and no dirty bit by construction.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::buffer::FrameKey;
use crate::common::{FileId, FrameId, PageId};
use crate::storage::page::Page;
use crate::storage::FileHandle;

/// Page bytes of one buffer slot.
pub struct Frame {
    page: RwLock<Page>,
}

impl Frame {
    /// Create a new zeroed frame.
    pub fn new() -> Self {
        Self {
            page: RwLock::new(Page::new()),
        }
    }

    /// Acquire read lock on the page.
    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Acquire write lock on the page.
    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

/// Clock-relevant classification of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Holds no page; usable immediately.
    Free,
    /// Unpinned, reference bit clear; next in line for eviction.
    Cold,
    /// Unpinned, reference bit set; gets a second chance.
    Warm,
    /// Pin count above zero; never evicted.
    Pinned,
}

/// Bookkeeping for a frame that currently caches a page.
#[derive(Debug, Clone)]
pub struct ResidentPage {
    pub file: FileHandle,
    pub page_no: PageId,
    pub pin_count: u32,
    pub ref_bit: bool,
    pub dirty: bool,
}

impl ResidentPage {
    #[inline]
    pub fn key(&self) -> FrameKey {
        FrameKey::new(self.file.id(), self.page_no)
    }
}

/// Descriptor of one frame.
#[derive(Debug, Clone, Default)]
pub enum FrameDescriptor {
    #[default]
    Free,
    Resident(ResidentPage),
}

impl FrameDescriptor {
    /// Descriptor for a page that was just read or allocated: one pin,
    /// reference bit set, clean.
    pub fn pinned(file: FileHandle, page_no: PageId) -> Self {
        FrameDescriptor::Resident(ResidentPage {
            file,
            page_no,
            pin_count: 1,
            ref_bit: true,
            dirty: false,
        })
    }

    pub fn state(&self) -> FrameState {
        match self {
            FrameDescriptor::Free => FrameState::Free,
            FrameDescriptor::Resident(r) if r.pin_count > 0 => FrameState::Pinned,
            FrameDescriptor::Resident(r) if r.ref_bit => FrameState::Warm,
            FrameDescriptor::Resident(_) => FrameState::Cold,
        }
    }

    #[inline]
    pub fn resident(&self) -> Option<&ResidentPage> {
        match self {
            FrameDescriptor::Resident(r) => Some(r),
            FrameDescriptor::Free => None,
        }
    }

    #[inline]
    pub fn resident_mut(&mut self) -> Option<&mut ResidentPage> {
        match self {
            FrameDescriptor::Resident(r) => Some(r),
            FrameDescriptor::Free => None,
        }
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        matches!(self, FrameDescriptor::Free)
    }

    pub fn pin_count(&self) -> u32 {
        self.resident().map_or(0, |r| r.pin_count)
    }

    pub fn is_dirty(&self) -> bool {
        self.resident().is_some_and(|r| r.dirty)
    }

    /// Return the frame to the free state.
    #[inline]
    pub fn clear(&mut self) {
        *self = FrameDescriptor::Free;
    }
}

/// Point-in-time copy of one frame's descriptor, for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub frame_id: FrameId,
    pub file: Option<FileId>,
    pub page_no: Option<PageId>,
    pub state: FrameState,
    pub pin_count: u32,
    pub ref_bit: bool,
    pub dirty: bool,
}

impl FrameInfo {
    pub fn of(frame_id: FrameId, descriptor: &FrameDescriptor) -> Self {
        let resident = descriptor.resident();
        Self {
            frame_id,
            file: resident.map(|r| r.file.id()),
            page_no: resident.map(|r| r.page_no),
            state: descriptor.state(),
            pin_count: descriptor.pin_count(),
            ref_bit: resident.is_some_and(|r| r.ref_bit),
            dirty: descriptor.is_dirty(),
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.state != FrameState::Free
    }
}
