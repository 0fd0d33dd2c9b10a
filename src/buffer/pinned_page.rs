//! Handle to a page pinned in the buffer pool.

use crate::common::{FrameId, PageId};
use crate::storage::FileHandle;

/// Proof of one pin on a resident page.
///
/// Returned by [`BufferPoolManager::fetch_page`] and
/// [`BufferPoolManager::allocate_page`]. The pin is released explicitly with
/// [`BufferPoolManager::unpin_page`]; dropping the handle does not unpin.
/// Page bytes are reached through [`BufferPoolManager::page`] and
/// [`BufferPoolManager::page_mut`] while the pin is held.
///
/// [`BufferPoolManager::fetch_page`]: crate::buffer::BufferPoolManager::fetch_page
/// [`BufferPoolManager::allocate_page`]: crate::buffer::BufferPoolManager::allocate_page
/// [`BufferPoolManager::unpin_page`]: crate::buffer::BufferPoolManager::unpin_page
/// [`BufferPoolManager::page`]: crate::buffer::BufferPoolManager::page
/// [`BufferPoolManager::page_mut`]: crate::buffer::BufferPoolManager::page_mut
#[derive(Debug, Clone)]
pub struct PinnedPage {
    file: FileHandle,
    page_no: PageId,
    frame_id: FrameId,
}

impl PinnedPage {
    pub(crate) fn new(file: FileHandle, page_no: PageId, frame_id: FrameId) -> Self {
        Self {
            file,
            page_no,
            frame_id,
        }
    }

    #[inline]
    pub fn page_no(&self) -> PageId {
        self.page_no
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    #[inline]
    pub fn file(&self) -> &FileHandle {
        &self.file
    }
}
