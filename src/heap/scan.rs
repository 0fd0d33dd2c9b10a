//! Sequential scan over a heap file with an optional filter.

use std::sync::Arc;

use crate::common::{Error, PageId, Result, Rid};
use crate::heap::{CloseError, Datatype, HeapFile, Operator, ScanFilter};
use crate::storage::FileManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Next `scan_next` starts from the first data page.
    Unpositioned,
    Positioned,
    /// The chain is exhausted; `scan_next` keeps failing until reset.
    EndOfFile,
}

#[derive(Debug, Clone, Copy)]
struct Mark {
    state: ScanState,
    page_no: Option<PageId>,
    position: Option<Rid>,
}

/// Outcome of one step along the current page.
enum Step {
    Candidate { rid: Rid, matched: bool },
    PageExhausted { next: PageId },
}

/// Read cursor over a heap file.
///
/// After [`scan_next`](Self::scan_next) returns a RID, that record's page
/// stays pinned, so [`get_record`](Self::get_record) and
/// [`delete_record`](Self::delete_record) act on it without further I/O.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use heapstore::heap::{create_heap_file, Datatype, HeapFileScan, Operator};
/// use heapstore::{BufferPoolManager, Error, FileManager};
///
/// let pool = Arc::new(BufferPoolManager::new(32));
/// let files = Arc::new(FileManager::new("/tmp/db", pool));
/// create_heap_file(&files, "emp").unwrap();
///
/// let mut scan = HeapFileScan::open(&files, "emp").unwrap();
/// scan.start_scan(0, 4, Datatype::Integer, Some(&5i32.to_le_bytes()), Operator::Gt)
///     .unwrap();
/// loop {
///     match scan.scan_next() {
///         Ok(_rid) => println!("{:?}", scan.get_record().unwrap()),
///         Err(Error::EndOfFile) => break,
///         Err(e) => panic!("{e}"),
///     }
/// }
/// scan.close().unwrap();
/// ```
#[derive(Debug)]
pub struct HeapFileScan {
    heap: HeapFile,
    filter: Option<ScanFilter>,
    state: ScanState,
    mark: Option<Mark>,
}

impl HeapFileScan {
    pub fn open(files: &Arc<FileManager>, name: &str) -> Result<Self> {
        Ok(Self {
            heap: HeapFile::open(files, name)?,
            filter: None,
            state: ScanState::Unpositioned,
            mark: None,
        })
    }

    /// Set the scan filter. `None` for `filter` scans every record.
    ///
    /// The scan position is not changed.
    ///
    /// # Errors
    /// `Error::BadScanParam` for an invalid filter; the previous filter is
    /// kept.
    pub fn start_scan(
        &mut self,
        offset: usize,
        length: usize,
        datatype: Datatype,
        filter: Option<&[u8]>,
        op: Operator,
    ) -> Result<()> {
        self.filter = match filter {
            Some(value) => Some(ScanFilter::new(offset, length, datatype, value, op)?),
            None => None,
        };
        Ok(())
    }

    /// RID of the next record that passes the filter.
    ///
    /// A failure to pin the next page leaves the scan where it was, so the
    /// call can be repeated once frames are available.
    ///
    /// # Errors
    /// - `Error::EndOfFile` once the last page is exhausted
    /// - errors from pinning the next page
    pub fn scan_next(&mut self) -> Result<Rid> {
        match self.state {
            ScanState::EndOfFile => return Err(Error::EndOfFile),
            ScanState::Positioned => self.heap.reattach()?,
            ScanState::Unpositioned => {
                let first = self.heap.header().first_page;
                if self.heap.current_page_no() == Some(first) {
                    self.heap.set_position(None)?;
                } else {
                    self.heap.pin_current(first)?;
                }
                self.state = ScanState::Positioned;
            }
        }

        loop {
            let filter = self.filter.as_ref();
            let step = self.heap.with_current(|page, position| {
                let candidate = match position {
                    None => page.first_record(),
                    Some(rid) => page.next_record(rid),
                };
                match candidate {
                    Some(rid) => page.record(rid).map(|record| Step::Candidate {
                        rid,
                        matched: filter.map_or(true, |f| f.matches(record)),
                    }),
                    None => Ok(Step::PageExhausted {
                        next: page.next_page(),
                    }),
                }
            })??;

            match step {
                Step::Candidate { rid, matched } => {
                    self.heap.set_position(Some(rid))?;
                    if matched {
                        return Ok(rid);
                    }
                }
                Step::PageExhausted { next } if !next.is_valid() => {
                    self.state = ScanState::EndOfFile;
                    return Err(Error::EndOfFile);
                }
                Step::PageExhausted { next } => self.heap.pin_current(next)?,
            }
        }
    }

    /// Bytes of the record at the scan position.
    ///
    /// # Errors
    /// `Error::NoCurrentRecord` if the scan is not on a record.
    pub fn get_record(&mut self) -> Result<Vec<u8>> {
        let rid = self.current_rid()?;
        self.heap.reattach()?;
        self.heap
            .with_current(|page, _| page.record(rid).map(<[u8]>::to_vec))?
    }

    /// Delete the record at the scan position. The scan continues after it.
    ///
    /// # Errors
    /// `Error::NoCurrentRecord` if the scan is not on a record.
    pub fn delete_record(&mut self) -> Result<()> {
        let rid = self.current_rid()?;
        self.heap.reattach()?;
        self.heap.with_current_mut(|page| page.delete_record(rid))??;
        self.heap
            .update_header(|h| h.rec_cnt = h.rec_cnt.saturating_sub(1));
        Ok(())
    }

    /// Flag the current page as modified so it is written back.
    pub fn mark_dirty(&mut self) -> Result<()> {
        self.heap.reattach()?;
        self.heap.mark_current_dirty()
    }

    /// Remember the scan position for [`reset_scan`](Self::reset_scan).
    pub fn mark_scan(&mut self) {
        let (page_no, position) = self.heap.cursor();
        self.mark = Some(Mark {
            state: self.state,
            page_no,
            position,
        });
    }

    /// Return to the last mark, or to the start of the file if there is none.
    ///
    /// The marked page is re-pinned only if it differs from the current one.
    pub fn reset_scan(&mut self) -> Result<()> {
        let mark = match self.mark {
            Some(mark) if mark.state != ScanState::Unpositioned => mark,
            _ => {
                self.state = ScanState::Unpositioned;
                return Ok(());
            }
        };
        let Some(page_no) = mark.page_no else {
            self.state = ScanState::Unpositioned;
            return Ok(());
        };

        if self.heap.current_page_no() != Some(page_no) {
            self.heap.pin_current(page_no)?;
        }
        self.heap.set_position(mark.position)?;
        self.state = mark.state;
        Ok(())
    }

    /// Unpin the current page. Safe to call repeatedly; a later
    /// [`scan_next`](Self::scan_next) starts over from the first page.
    pub fn end_scan(&mut self) -> Result<()> {
        self.state = ScanState::Unpositioned;
        self.heap.forget_detached();
        self.heap.release_current()
    }

    pub fn close(self) -> std::result::Result<(), CloseError> {
        self.heap.close()
    }

    #[inline]
    pub fn record_count(&self) -> u32 {
        self.heap.record_count()
    }

    pub fn heap(&self) -> &HeapFile {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut HeapFile {
        &mut self.heap
    }

    fn current_rid(&self) -> Result<Rid> {
        match self.state {
            ScanState::Positioned => self.heap.cursor().1.ok_or(Error::NoCurrentRecord),
            _ => Err(Error::NoCurrentRecord),
        }
    }
}
