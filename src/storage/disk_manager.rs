//! Disk Manager - low-level page I/O for one database file.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing pages (with checksum stamping/verification)
//! - Allocating and disposing pages through a free list
//! - Tracking the file's first allocated page

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::{Page, PageHeader, PageType};

const META_PAGE: PageId = PageId(0);
const META_MAGIC: u32 = 0x4845_4150; // "HEAP"

const OFFSET_MAGIC: usize = PageHeader::SIZE;
const OFFSET_PAGE_COUNT: usize = OFFSET_MAGIC + 4;
const OFFSET_FIRST_PAGE: usize = OFFSET_PAGE_COUNT + 4;
const OFFSET_FREE_HEAD: usize = OFFSET_FIRST_PAGE + 4;

/// Offset of the next-free pointer inside a page on the free list.
const OFFSET_NEXT_FREE: usize = PageHeader::SIZE;

fn get_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

fn put_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Manages disk I/O for a single database file.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (meta)  │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// Page 0 holds `{magic, page_count, first_page, free_head}` and is never
/// handed out. Disposed pages are chained into a free list and reused by
/// later allocations before the file grows.
///
/// # Thread Safety
/// `DiskManager` is **single-threaded**. Callers share it behind a mutex.
pub struct DiskManager {
    file: File,
    /// Number of pages in the file, including the metadata page.
    page_count: u32,
    first_page: PageId,
    free_head: PageId,
}

impl DiskManager {
    /// Create a new database file containing only the metadata page.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        let mut dm = Self {
            file,
            page_count: 1,
            first_page: PageId::INVALID,
            free_head: PageId::INVALID,
        };
        dm.write_meta()?;
        dm.file.sync_all()?;
        Ok(dm)
    }

    /// Open an existing database file.
    ///
    /// # Errors
    /// - I/O errors if the file doesn't exist or cannot be read
    /// - `Error::Corrupted` if the metadata page is damaged
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;

        let mut meta = Page::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(meta.as_mut_slice())?;

        let data = meta.as_slice();
        if meta.page_type() != PageType::FileMeta
            || get_u32(data, OFFSET_MAGIC) != META_MAGIC
            || !meta.verify_checksum()
        {
            return Err(Error::Corrupted(META_PAGE));
        }

        Ok(Self {
            file,
            page_count: get_u32(data, OFFSET_PAGE_COUNT),
            first_page: PageId(get_u32(data, OFFSET_FIRST_PAGE)),
            free_head: PageId(get_u32(data, OFFSET_FREE_HEAD)),
        })
    }

    fn check_page_no(&self, page_id: PageId) -> Result<()> {
        if page_id == META_PAGE || page_id.0 >= self.page_count {
            return Err(Error::BadPageNo(page_id));
        }
        Ok(())
    }

    fn read_raw(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(page.as_mut_slice())?;
        Ok(())
    }

    fn write_raw(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(page.as_slice())?;
        Ok(())
    }

    fn write_meta(&mut self) -> Result<()> {
        let mut meta = Page::new();
        PageHeader::new(PageType::FileMeta).write_to(meta.as_mut_slice());
        let data = meta.as_mut_slice();
        put_u32(data, OFFSET_MAGIC, META_MAGIC);
        put_u32(data, OFFSET_PAGE_COUNT, self.page_count);
        put_u32(data, OFFSET_FIRST_PAGE, self.first_page.0);
        put_u32(data, OFFSET_FREE_HEAD, self.free_head.0);
        meta.update_checksum();
        self.write_raw(META_PAGE, &meta)
    }

    /// Read a page from disk into `page`.
    ///
    /// # Errors
    /// - `Error::BadPageNo` for the metadata page, a page past the end of the
    ///   file, or a page on the free list
    /// - `Error::Corrupted` if a written page fails its checksum
    pub fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        self.check_page_no(page_id)?;
        self.read_raw(page_id, page)?;

        match page.page_type() {
            PageType::Free => Err(Error::BadPageNo(page_id)),
            // Allocated but never written: all zeros, no checksum yet.
            PageType::Invalid => Ok(()),
            _ if !page.verify_checksum() => Err(Error::Corrupted(page_id)),
            _ => Ok(()),
        }
    }

    /// Write a page to disk, stamping its checksum.
    ///
    /// The caller's buffer is left untouched; the checksum goes into a copy.
    ///
    /// # Errors
    /// Returns `Error::BadPageNo` if the page hasn't been allocated.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.check_page_no(page_id)?;

        let mut stamped = Page::new();
        stamped.copy_from(page);
        stamped.update_checksum();
        self.write_raw(page_id, &stamped)
    }

    /// Allocate a page, reusing the free list before growing the file.
    ///
    /// The returned page is zeroed on disk. The first page ever allocated
    /// becomes the file's first page.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        let page_id = if self.free_head.is_valid() {
            let reused = self.free_head;
            let mut free = Page::new();
            self.read_raw(reused, &mut free)?;
            self.free_head = PageId(get_u32(free.as_slice(), OFFSET_NEXT_FREE));
            reused
        } else {
            let fresh = PageId::new(self.page_count);
            self.page_count += 1;
            fresh
        };

        self.write_raw(page_id, &Page::new())?;
        if !self.first_page.is_valid() {
            self.first_page = page_id;
        }
        self.write_meta()?;

        Ok(page_id)
    }

    /// Return a page to the free list.
    ///
    /// # Errors
    /// - `Error::BadPageNo` if the page is out of range, already free, or is
    ///   the file's first page
    pub fn dispose_page(&mut self, page_id: PageId) -> Result<()> {
        self.check_page_no(page_id)?;
        if page_id == self.first_page {
            return Err(Error::BadPageNo(page_id));
        }

        let mut page = Page::new();
        self.read_raw(page_id, &mut page)?;
        if page.page_type() == PageType::Free {
            return Err(Error::BadPageNo(page_id));
        }

        page.reset();
        PageHeader::new(PageType::Free).write_to(page.as_mut_slice());
        put_u32(page.as_mut_slice(), OFFSET_NEXT_FREE, self.free_head.0);
        page.update_checksum();
        self.write_raw(page_id, &page)?;

        self.free_head = page_id;
        self.write_meta()
    }

    /// The first page ever allocated in this file.
    ///
    /// # Errors
    /// Returns `Error::BadPageNo` if nothing has been allocated yet.
    pub fn first_page(&self) -> Result<PageId> {
        if self.first_page.is_valid() {
            Ok(self.first_page)
        } else {
            Err(Error::BadPageNo(PageId::INVALID))
        }
    }

    /// Force buffered writes to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Get the number of pages in the file, including the metadata page.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }
}
