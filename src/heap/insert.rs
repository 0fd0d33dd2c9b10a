//! Append cursor for a heap file.

use std::sync::Arc;

use tracing::debug;

use crate::common::{Error, Result, Rid};
use crate::heap::{CloseError, HeapFile};
use crate::storage::page::{DataPage, MAX_RECORD_LEN};
use crate::storage::FileManager;

/// Inserts records at the tail of a heap file's page chain.
#[derive(Debug)]
pub struct InsertFileScan {
    heap: HeapFile,
}

impl InsertFileScan {
    pub fn open(files: &Arc<FileManager>, name: &str) -> Result<Self> {
        Ok(Self {
            heap: HeapFile::open(files, name)?,
        })
    }

    /// Append `record`, growing the chain by one page if the last page is
    /// full.
    ///
    /// # Errors
    /// - `Error::InvalidRecordLength` if the record exceeds what one page holds
    /// - `Error::BufferExceeded` or I/O errors while pinning or allocating
    pub fn insert_record(&mut self, record: &[u8]) -> Result<Rid> {
        if record.len() > MAX_RECORD_LEN {
            return Err(Error::InvalidRecordLength(record.len()));
        }

        let last = self.heap.header().last_page;
        if self.heap.current_page_no() != Some(last) {
            self.heap.pin_current(last)?;
        }

        match self.heap.with_current_mut(|page| page.insert_record(record))? {
            Ok(rid) => {
                self.heap.set_position(Some(rid))?;
                self.heap.update_header(|h| h.rec_cnt += 1);
                Ok(rid)
            }
            Err(Error::NoSpace) => self.append_page(record),
            Err(e) => Err(e),
        }
    }

    /// Allocate a new tail page, link it after the current one, and put
    /// `record` on it. Leaves no data page pinned.
    fn append_page(&mut self, record: &[u8]) -> Result<Rid> {
        let pool = Arc::clone(self.heap.pool());
        let file = self.heap.file().clone();

        let new_page = pool.allocate_page(&file)?;
        let new_no = new_page.page_no();
        DataPage::new(pool.page_mut(&new_page).as_mut_slice()).init(new_no);

        self.heap.with_current_mut(|page| page.set_next_page(new_no))?;
        self.heap.release_current()?;
        self.heap.update_header(|h| {
            h.last_page = new_no;
            h.page_cnt += 1;
        });

        let inserted = DataPage::new(pool.page_mut(&new_page).as_mut_slice()).insert_record(record);
        pool.unpin_page(&file, new_no, true)?;
        let rid = inserted?;

        self.heap.update_header(|h| h.rec_cnt += 1);
        debug!(
            file = self.heap.name(),
            page = %new_no,
            pages = self.heap.page_count(),
            "heap file grew"
        );
        Ok(rid)
    }

    #[inline]
    pub fn record_count(&self) -> u32 {
        self.heap.record_count()
    }

    pub fn heap(&self) -> &HeapFile {
        &self.heap
    }

    pub fn close(self) -> std::result::Result<(), CloseError> {
        self.heap.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPoolManager;
    use crate::common::PageId;
    use crate::heap::create_heap_file;
    use tempfile::tempdir;

    fn create_fm() -> (Arc<FileManager>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let pool = Arc::new(BufferPoolManager::new(8));
        let fm = Arc::new(FileManager::new(dir.path(), pool));
        create_heap_file(&fm, "t").unwrap();
        (fm, dir)
    }

    #[test]
    fn test_insert_counts() {
        let (fm, _dir) = create_fm();
        let mut ins = InsertFileScan::open(&fm, "t").unwrap();

        let a = ins.insert_record(b"first").unwrap();
        let b = ins.insert_record(b"second").unwrap();
        assert_eq!(a.page_no, b.page_no);
        assert!(a < b);
        assert_eq!(ins.record_count(), 2);
        ins.close().unwrap();

        let mut heap = HeapFile::open(&fm, "t").unwrap();
        assert_eq!(heap.record_count(), 2);
        assert_eq!(heap.get_record(b).unwrap(), b"second");
    }

    #[test]
    fn test_record_too_long() {
        let (fm, _dir) = create_fm();
        let mut ins = InsertFileScan::open(&fm, "t").unwrap();

        let big = vec![0u8; MAX_RECORD_LEN + 1];
        assert!(matches!(
            ins.insert_record(&big),
            Err(Error::InvalidRecordLength(n)) if n == MAX_RECORD_LEN + 1
        ));
        assert_eq!(ins.record_count(), 0);

        // The largest record fits on a fresh page.
        let max = vec![1u8; MAX_RECORD_LEN];
        ins.insert_record(&max).unwrap();
    }

    #[test]
    fn test_overflow_grows_chain_once() {
        let (fm, _dir) = create_fm();
        let mut ins = InsertFileScan::open(&fm, "t").unwrap();
        let first = ins.heap().header().last_page;
        let record = [0xAB; 1000];

        let mut rids = Vec::new();
        while ins.heap().page_count() == 1 {
            rids.push(ins.insert_record(&record).unwrap());
        }

        let header = ins.heap().header().clone();
        assert_eq!(header.page_cnt, 2);
        assert_ne!(header.last_page, first);
        assert_eq!(header.rec_cnt as usize, rids.len());
        assert_eq!(rids.last().unwrap().page_no, header.last_page);
        assert!(rids[..rids.len() - 1].iter().all(|r| r.page_no == first));

        // No data page stays pinned after growing.
        assert_eq!(fm.pool().pin_count(ins.heap().file(), header.last_page), Some(0));

        let file = ins.heap().file().clone();
        let p = fm.pool().fetch_page(&file, first).unwrap();
        let next = DataPage::new(fm.pool().page(&p).as_slice()).next_page();
        fm.pool().unpin_page(&file, first, false).unwrap();
        assert_eq!(next, header.last_page);

        let p = fm.pool().fetch_page(&file, header.last_page).unwrap();
        let tail_next = DataPage::new(fm.pool().page(&p).as_slice()).next_page();
        fm.pool().unpin_page(&file, header.last_page, false).unwrap();
        assert_eq!(tail_next, PageId::INVALID);

        // The next insert lands on the new tail page.
        let rid = ins.insert_record(&record).unwrap();
        assert_eq!(rid.page_no, header.last_page);
        assert_eq!(ins.heap().page_count(), 2);
    }
}
