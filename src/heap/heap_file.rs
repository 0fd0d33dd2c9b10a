//! Heap file - an unordered record store on a chain of data pages.
//!
//! A heap file is a header page followed by a singly linked chain of slotted
//! data pages. An open [`HeapFile`] keeps the header page pinned for its whole
//! life, plus at most one "current" data page that the cursors built on top of
//! it move along the chain.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::buffer::{BufferPoolManager, PinnedPage};
use crate::common::{Error, PageId, Result, Rid};
use crate::heap::FileHeader;
use crate::storage::page::DataPage;
use crate::storage::{FileHandle, FileManager};

/// Create an empty heap file: a header page and one empty data page.
///
/// # Errors
/// - `Error::FileExists` if the file can already be opened
/// - any error from creating the file or allocating its pages
pub fn create_heap_file(files: &FileManager, name: &str) -> Result<()> {
    match files.open_file(name) {
        Ok(file) => {
            files.close_file(&file)?;
            return Err(Error::FileExists(name.to_string()));
        }
        Err(Error::FileNotFound(_)) => {}
        Err(e) => return Err(e),
    }

    files.create_file(name)?;
    let file = files.open_file(name)?;
    let built = init_pages(files.pool(), &file, name);
    let closed = files.close_file(&file);
    built?;
    closed?;

    debug!(file = name, "created heap file");
    Ok(())
}

fn init_pages(pool: &BufferPoolManager, file: &FileHandle, name: &str) -> Result<()> {
    let header_page = pool.allocate_page(file)?;
    let data_page = match pool.allocate_page(file) {
        Ok(page) => page,
        Err(e) => {
            pool.unpin_page(file, header_page.page_no(), false)?;
            return Err(e);
        }
    };

    DataPage::new(pool.page_mut(&data_page).as_mut_slice()).init(data_page.page_no());
    FileHeader::new(name, data_page.page_no())
        .write_to(pool.page_mut(&header_page).as_mut_slice());

    pool.unpin_page(file, header_page.page_no(), true)?;
    pool.unpin_page(file, data_page.page_no(), true)?;
    pool.flush_file(file)
}

/// Delete a heap file.
///
/// # Errors
/// `Error::FileOpenError` while it is open, `Error::FileNotFound` if absent.
pub fn destroy_heap_file(files: &FileManager, name: &str) -> Result<()> {
    files.destroy_file(name)
}

/// The data page a handle currently holds pinned.
#[derive(Debug)]
pub(crate) struct CurrentPage {
    page: PinnedPage,
    dirty: bool,
    /// Record the cursor sits on; `None` is "before the first record".
    position: Option<Rid>,
}

/// Page and position a cursor held before a failed page switch, re-pinned
/// by [`HeapFile::reattach`].
#[derive(Debug, Clone, Copy)]
struct Detached {
    page_no: PageId,
    position: Option<Rid>,
}

/// A failed [`HeapFile::close`]. The file stays open until the close is
/// retried or this value is dropped.
#[derive(Debug, Error)]
#[error("closing heap file failed: {error}")]
pub struct CloseError {
    #[source]
    error: Error,
    heap: HeapFile,
}

impl CloseError {
    pub fn error(&self) -> &Error {
        &self.error
    }

    /// Try the close again, typically after releasing the pin that blocked it.
    pub fn retry(self) -> std::result::Result<(), CloseError> {
        self.heap.close()
    }
}

/// An open heap file.
///
/// Dropping the handle closes it; [`close`](Self::close) does the same but
/// reports the result of closing the file.
pub struct HeapFile {
    files: Arc<FileManager>,
    file: FileHandle,
    header_page: PinnedPage,
    header: FileHeader,
    header_dirty: bool,
    header_pinned: bool,
    current: Option<CurrentPage>,
    detached: Option<Detached>,
    closed: bool,
}

impl HeapFile {
    /// Open `name`, pinning its header page and its first data page.
    ///
    /// # Errors
    /// Any error from opening the file or pinning either page. Nothing stays
    /// pinned or open on failure.
    pub fn open(files: &Arc<FileManager>, name: &str) -> Result<Self> {
        let file = files.open_file(name)?;

        match Self::pin_initial(files.pool(), &file) {
            Ok((header_page, header, first)) => {
                debug!(file = name, records = header.rec_cnt, "opened heap file");
                Ok(Self {
                    files: Arc::clone(files),
                    file,
                    header_page,
                    header,
                    header_dirty: false,
                    header_pinned: true,
                    current: Some(CurrentPage {
                        page: first,
                        dirty: false,
                        position: None,
                    }),
                    detached: None,
                    closed: false,
                })
            }
            Err(e) => {
                if let Err(close_err) = files.close_file(&file) {
                    warn!(file = name, error = %close_err, "close after failed open");
                }
                Err(e)
            }
        }
    }

    fn pin_initial(
        pool: &BufferPoolManager,
        file: &FileHandle,
    ) -> Result<(PinnedPage, FileHeader, PinnedPage)> {
        let header_no = file.first_page()?;
        let header_page = pool.fetch_page(file, header_no)?;

        let header = FileHeader::read_from(header_no, pool.page(&header_page).as_slice());
        let pinned_first = header.and_then(|header| {
            let first = pool.fetch_page(file, header.first_page)?;
            Ok((header, first))
        });

        match pinned_first {
            Ok((header, first)) => Ok((header_page, header, first)),
            Err(e) => {
                pool.unpin_page(file, header_no, false)?;
                Err(e)
            }
        }
    }

    /// Unpin everything and close the file.
    ///
    /// Unpin failures are logged. If closing the file fails, for instance
    /// with `Error::PagePinned` while someone else still pins one of its
    /// pages, the handle comes back inside the [`CloseError`] so the close
    /// can be retried.
    pub fn close(mut self) -> std::result::Result<(), CloseError> {
        match self.shutdown() {
            Ok(()) => Ok(()),
            Err(error) => Err(CloseError { error, heap: self }),
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.detached = None;
        if let Err(e) = self.release_current() {
            warn!(file = self.name(), error = %e, "unpin of data page failed at close");
        }
        if self.header_pinned {
            self.header_pinned = false;
            if let Err(e) =
                self.pool()
                    .unpin_page(&self.file, self.header_page.page_no(), self.header_dirty)
            {
                warn!(file = self.name(), error = %e, "unpin of header page failed at close");
            }
        }

        self.files.close_file(&self.file)?;
        self.closed = true;
        debug!(file = self.name(), "closed heap file");
        Ok(())
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.file.name()
    }

    #[inline]
    pub fn file(&self) -> &FileHandle {
        &self.file
    }

    /// Number of records in the file.
    #[inline]
    pub fn record_count(&self) -> u32 {
        self.header.rec_cnt
    }

    /// Number of data pages in the chain.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.header.page_cnt
    }

    #[inline]
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Copy of the record named by `rid`, which becomes the current record.
    ///
    /// If `rid` lives on another page than the current one, the current page
    /// is unpinned and `rid`'s page pinned in its place.
    ///
    /// # Errors
    /// - `Error::InvalidSlot` if no such record exists
    /// - errors from pinning the page
    pub fn get_record(&mut self, rid: Rid) -> Result<Vec<u8>> {
        if self.current_page_no() != Some(rid.page_no) {
            self.pin_current(rid.page_no)?;
        }
        self.set_position(Some(rid))?;
        self.with_current(|page, _| page.record(rid).map(<[u8]>::to_vec))?
    }

    // ========================================================================
    // Cursor plumbing shared by the scan and insert cursors
    // ========================================================================

    #[inline]
    pub(crate) fn pool(&self) -> &Arc<BufferPoolManager> {
        self.files.pool()
    }

    pub(crate) fn current_page_no(&self) -> Option<PageId> {
        self.current.as_ref().map(|c| c.page.page_no())
    }

    /// Page and position of the cursor, counting a detached one as still
    /// being where it was.
    pub(crate) fn cursor(&self) -> (Option<PageId>, Option<Rid>) {
        match (&self.current, self.detached) {
            (Some(c), _) => (Some(c.page.page_no()), c.position),
            (None, Some(d)) => (Some(d.page_no), d.position),
            (None, None) => (None, None),
        }
    }

    pub(crate) fn set_position(&mut self, position: Option<Rid>) -> Result<()> {
        let current = self.current.as_mut().ok_or(Error::NoCurrentRecord)?;
        current.position = position;
        Ok(())
    }

    /// Replace the current page with `page_no`, positioned before its first
    /// record.
    ///
    /// If `page_no` cannot be pinned the handle is left detached: it holds no
    /// page, and [`reattach`](Self::reattach) returns it to where it was.
    pub(crate) fn pin_current(&mut self, page_no: PageId) -> Result<()> {
        let previous = self
            .current
            .as_ref()
            .map(|c| Detached {
                page_no: c.page.page_no(),
                position: c.position,
            })
            .or(self.detached);

        self.release_current()?;
        match self.pool().fetch_page(&self.file, page_no) {
            Ok(page) => {
                self.current = Some(CurrentPage {
                    page,
                    dirty: false,
                    position: None,
                });
                self.detached = None;
                Ok(())
            }
            Err(e) => {
                self.detached = previous;
                Err(e)
            }
        }
    }

    /// Re-pin the page a failed [`pin_current`](Self::pin_current) let go
    /// of and restore the position on it. A no-op unless detached.
    pub(crate) fn reattach(&mut self) -> Result<()> {
        let Some(detached) = self.detached else {
            return Ok(());
        };
        if self.current.is_some() {
            self.detached = None;
            return Ok(());
        }

        let page = self.pool().fetch_page(&self.file, detached.page_no)?;
        self.current = Some(CurrentPage {
            page,
            dirty: false,
            position: detached.position,
        });
        self.detached = None;
        debug!(file = self.name(), page = %detached.page_no, "cursor reattached");
        Ok(())
    }

    /// Forget any page a failed switch left behind.
    pub(crate) fn forget_detached(&mut self) {
        self.detached = None;
    }

    /// Unpin the current page, if any.
    pub(crate) fn release_current(&mut self) -> Result<()> {
        match self.current.take() {
            Some(current) => {
                self.pool()
                    .unpin_page(&self.file, current.page.page_no(), current.dirty)
            }
            None => Ok(()),
        }
    }

    pub(crate) fn mark_current_dirty(&mut self) -> Result<()> {
        let current = self.current.as_mut().ok_or(Error::NoCurrentRecord)?;
        current.dirty = true;
        Ok(())
    }

    /// Read the current page along with the cursor position.
    pub(crate) fn with_current<R>(
        &self,
        f: impl FnOnce(&DataPage<&[u8]>, Option<Rid>) -> R,
    ) -> Result<R> {
        let current = self.current.as_ref().ok_or(Error::NoCurrentRecord)?;
        let guard = self.pool().page(&current.page);
        Ok(f(&DataPage::new(guard.as_slice()), current.position))
    }

    /// Modify the current page; it is marked dirty.
    pub(crate) fn with_current_mut<R>(
        &mut self,
        f: impl FnOnce(&mut DataPage<&mut [u8]>) -> R,
    ) -> Result<R> {
        let current = self.current.as_mut().ok_or(Error::NoCurrentRecord)?;
        let mut guard = self.files.pool().page_mut(&current.page);
        let result = f(&mut DataPage::new(guard.as_mut_slice()));
        current.dirty = true;
        Ok(result)
    }

    /// Change the header and write it through to the pinned header page.
    pub(crate) fn update_header(&mut self, f: impl FnOnce(&mut FileHeader)) {
        f(&mut self.header);
        self.header
            .write_to(self.files.pool().page_mut(&self.header_page).as_mut_slice());
        self.header_dirty = true;
    }
}

impl Drop for HeapFile {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(file = self.name(), error = %e, "closing heap file failed");
        }
    }
}

impl std::fmt::Debug for HeapFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapFile")
            .field("file", &self.file)
            .field("header", &self.header)
            .field("current", &self.current)
            .field("detached", &self.detached)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_fm(pool_size: usize) -> (Arc<FileManager>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let pool = Arc::new(BufferPoolManager::new(pool_size));
        (Arc::new(FileManager::new(dir.path(), pool)), dir)
    }

    #[test]
    fn test_create_and_open() {
        let (fm, _dir) = create_fm(8);
        create_heap_file(&fm, "emp").unwrap();

        let heap = HeapFile::open(&fm, "emp").unwrap();
        assert_eq!(heap.name(), "emp");
        assert_eq!(heap.header().file_name, "emp");
        assert_eq!(heap.record_count(), 0);
        assert_eq!(heap.page_count(), 1);
        assert_eq!(heap.header().first_page, heap.header().last_page);
        assert_eq!(heap.current_page_no(), Some(heap.header().first_page));

        // Header and first data page are pinned while open.
        assert_eq!(fm.pool().resident_count(), 2);
        heap.close().unwrap();
        assert_eq!(fm.pool().resident_count(), 0);
    }

    #[test]
    fn test_create_existing_fails() {
        let (fm, _dir) = create_fm(8);
        create_heap_file(&fm, "emp").unwrap();
        assert!(matches!(create_heap_file(&fm, "emp"), Err(Error::FileExists(_))));
        assert_eq!(fm.open_count("emp"), 0);
    }

    #[test]
    fn test_first_data_page_is_terminal() {
        let (fm, _dir) = create_fm(8);
        create_heap_file(&fm, "emp").unwrap();
        let heap = HeapFile::open(&fm, "emp").unwrap();

        let (next, first) = heap
            .with_current(|page, _| (page.next_page(), page.first_record()))
            .unwrap();
        assert_eq!(next, PageId::INVALID);
        assert_eq!(first, None);
    }

    #[test]
    fn test_open_missing() {
        let (fm, _dir) = create_fm(8);
        assert!(matches!(HeapFile::open(&fm, "nope"), Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_open_plain_file_fails_cleanly() {
        let (fm, _dir) = create_fm(8);
        fm.create_file("raw").unwrap();

        assert!(matches!(HeapFile::open(&fm, "raw"), Err(Error::BadPageNo(_))));
        assert_eq!(fm.open_count("raw"), 0);
        assert_eq!(fm.pool().resident_count(), 0);
    }

    #[test]
    fn test_drop_closes() {
        let (fm, _dir) = create_fm(8);
        create_heap_file(&fm, "emp").unwrap();
        {
            let _heap = HeapFile::open(&fm, "emp").unwrap();
            assert_eq!(fm.open_count("emp"), 1);
        }
        assert_eq!(fm.open_count("emp"), 0);
        destroy_heap_file(&fm, "emp").unwrap();
        assert!(!fm.exists("emp"));
    }

    #[test]
    fn test_destroy_open_file_fails() {
        let (fm, _dir) = create_fm(8);
        create_heap_file(&fm, "emp").unwrap();
        let heap = HeapFile::open(&fm, "emp").unwrap();

        assert!(matches!(
            destroy_heap_file(&fm, "emp"),
            Err(Error::FileOpenError { .. })
        ));
        heap.close().unwrap();
    }

    #[test]
    fn test_close_blocked_by_pin_can_be_retried() {
        let (fm, _dir) = create_fm(8);
        create_heap_file(&fm, "emp").unwrap();
        let heap = HeapFile::open(&fm, "emp").unwrap();
        let file = heap.file().clone();
        let first = heap.header().first_page;

        let held = fm.pool().fetch_page(&file, first).unwrap();
        let err = heap.close().unwrap_err();
        assert!(matches!(err.error(), Error::PagePinned(p) if *p == first));
        assert_eq!(fm.open_count("emp"), 1);

        // Only the outside pin is left.
        assert_eq!(fm.pool().pin_count(&file, first), Some(1));
        let err = err.retry().unwrap_err();
        assert_eq!(fm.pool().pin_count(&file, first), Some(1));

        fm.pool().unpin_page(&file, held.page_no(), false).unwrap();
        err.retry().unwrap();
        assert_eq!(fm.open_count("emp"), 0);
        destroy_heap_file(&fm, "emp").unwrap();
    }

    #[test]
    fn test_dropped_close_error_still_closes() {
        let (fm, _dir) = create_fm(8);
        create_heap_file(&fm, "emp").unwrap();
        let heap = HeapFile::open(&fm, "emp").unwrap();
        let file = heap.file().clone();

        let held = fm.pool().fetch_page(&file, heap.header().first_page).unwrap();
        let err = heap.close().unwrap_err();
        fm.pool().unpin_page(&file, held.page_no(), false).unwrap();
        drop(err);

        assert_eq!(fm.open_count("emp"), 0);
    }

    #[test]
    fn test_header_changes_persist() {
        let (fm, _dir) = create_fm(8);
        create_heap_file(&fm, "emp").unwrap();

        let mut heap = HeapFile::open(&fm, "emp").unwrap();
        heap.update_header(|h| h.rec_cnt = 17);
        heap.close().unwrap();

        let heap = HeapFile::open(&fm, "emp").unwrap();
        assert_eq!(heap.record_count(), 17);
    }

    #[test]
    fn test_get_record_across_pages() {
        let (fm, _dir) = create_fm(8);
        create_heap_file(&fm, "emp").unwrap();
        let mut heap = HeapFile::open(&fm, "emp").unwrap();

        let first = heap.current_page_no().unwrap();
        let rid = heap
            .with_current_mut(|page| page.insert_record(b"alpha"))
            .unwrap()
            .unwrap();

        // Move to a fresh second page and come back.
        let other = fm.pool().allocate_page(heap.file()).unwrap();
        let other_no = other.page_no();
        DataPage::new(fm.pool().page_mut(&other).as_mut_slice()).init(other_no);
        fm.pool().unpin_page(heap.file(), other_no, true).unwrap();
        heap.pin_current(other_no).unwrap();
        assert_eq!(fm.pool().pin_count(heap.file(), first), Some(0));

        assert_eq!(heap.get_record(rid).unwrap(), b"alpha");
        assert_eq!(heap.cursor(), (Some(first), Some(rid)));
        assert_eq!(fm.pool().pin_count(heap.file(), other_no), Some(0));
        assert_eq!(fm.pool().pin_count(heap.file(), first), Some(1));
    }

    #[test]
    fn test_get_record_bad_slot() {
        let (fm, _dir) = create_fm(8);
        create_heap_file(&fm, "emp").unwrap();
        let mut heap = HeapFile::open(&fm, "emp").unwrap();
        let first = heap.header().first_page;

        assert!(matches!(
            heap.get_record(Rid::new(first, 3)),
            Err(Error::InvalidSlot(_))
        ));
    }
}
