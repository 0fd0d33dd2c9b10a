//! Slotted data page for variable-length records.
//!
//! # Page Layout
//!
//! ```text
//! +----------------------+  0
//! |    PageHeader        |  5 bytes (type + checksum)
//! |    page_no   (u32)   |
//! |    next_page (u32)   |  PageId::INVALID terminates the chain
//! |    slot_count (u16)  |
//! |    free_end  (u16)   |  start of the record area
//! +----------------------+  17
//! |    Slot Array        |  4 bytes per slot, grows forward
//! |      [slot 0]        |  offset: 2 bytes, length: 2 bytes
//! |      [slot 1]        |
//! |        ...           |
//! +----------------------+
//! |    Free Space        |
//! +----------------------+  free_end
//! |    Record Data       |  packed backward from the end of the page
//! |     [record 1]       |
//! |     [record 0]       |
//! +----------------------+  PAGE_SIZE
//! ```
//!
//! Deleting a record compacts the record area, so free space is always one
//! contiguous run. Deleted slots are reused by later inserts; trailing
//! deleted slots are dropped from the slot array.

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result, Rid};

use super::page_header::{PageHeader, PageType};

const OFFSET_PAGE_NO: usize = PageHeader::SIZE;
const OFFSET_NEXT_PAGE: usize = OFFSET_PAGE_NO + 4;
const OFFSET_SLOT_COUNT: usize = OFFSET_NEXT_PAGE + 4;
const OFFSET_FREE_END: usize = OFFSET_SLOT_COUNT + 2;

/// Size of the fixed data page header.
pub const DATA_HEADER_SIZE: usize = OFFSET_FREE_END + 2;

/// Size of each slot in bytes (offset: 2, length: 2).
pub const SLOT_SIZE: usize = 4;

/// Fixed overhead of a data page holding one record.
pub const DPFIXED: usize = DATA_HEADER_SIZE + SLOT_SIZE;

/// Largest record a single data page can hold.
pub const MAX_RECORD_LEN: usize = PAGE_SIZE - DPFIXED;

/// Marker for a deleted slot.
const SLOT_DELETED: u16 = 0xFFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    offset: u16,
    length: u16,
}

impl Slot {
    fn is_deleted(&self) -> bool {
        self.offset == SLOT_DELETED
    }
}

/// A slotted view over page bytes.
///
/// Read operations work on any `B: AsRef<[u8]>` (a `&Page` or a read guard);
/// mutations additionally need `AsMut<[u8]>`.
///
/// # Example
/// ```
/// use heapstore::storage::page::{DataPage, Page};
/// use heapstore::PageId;
///
/// let mut page = Page::new();
/// let mut data = DataPage::new(&mut page);
/// data.init(PageId::new(1));
///
/// let rid = data.insert_record(b"hello").unwrap();
/// assert_eq!(data.record(rid).unwrap(), b"hello");
/// assert_eq!(data.first_record(), Some(rid));
/// ```
pub struct DataPage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> DataPage<B> {
    /// Wrap page bytes.
    ///
    /// # Panics
    /// Panics if the buffer is not exactly one page.
    pub fn new(data: B) -> Self {
        assert_eq!(data.as_ref().len(), PAGE_SIZE, "data page must be one page");
        Self { data }
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn read_u16(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.bytes()[offset], self.bytes()[offset + 1]])
    }

    fn read_u32(&self, offset: usize) -> u32 {
        let b = self.bytes();
        u32::from_le_bytes([b[offset], b[offset + 1], b[offset + 2], b[offset + 3]])
    }

    /// Page number this page was initialized with.
    pub fn page_no(&self) -> PageId {
        PageId(self.read_u32(OFFSET_PAGE_NO))
    }

    /// Next page in the chain, or `PageId::INVALID` at the end.
    pub fn next_page(&self) -> PageId {
        PageId(self.read_u32(OFFSET_NEXT_PAGE))
    }

    /// Number of entries in the slot array, live or deleted.
    pub fn slot_count(&self) -> u16 {
        self.read_u16(OFFSET_SLOT_COUNT)
    }

    fn free_end(&self) -> usize {
        self.read_u16(OFFSET_FREE_END) as usize
    }

    fn slots_end(&self) -> usize {
        DATA_HEADER_SIZE + self.slot_count() as usize * SLOT_SIZE
    }

    /// Bytes between the slot array and the record area.
    pub fn free_space(&self) -> usize {
        self.free_end().saturating_sub(self.slots_end())
    }

    fn slot(&self, slot_no: u16) -> Option<Slot> {
        if slot_no >= self.slot_count() {
            return None;
        }
        let at = DATA_HEADER_SIZE + slot_no as usize * SLOT_SIZE;
        Some(Slot {
            offset: self.read_u16(at),
            length: self.read_u16(at + 2),
        })
    }

    fn live_slot_from(&self, start: u16) -> Option<Rid> {
        let page_no = self.page_no();
        (start..self.slot_count())
            .find(|&s| self.slot(s).is_some_and(|slot| !slot.is_deleted()))
            .map(|s| Rid::new(page_no, s))
    }

    /// First live record on the page, or `None` if the page is empty.
    pub fn first_record(&self) -> Option<Rid> {
        self.live_slot_from(0)
    }

    /// Next live record after `rid`, or `None` when the page is exhausted.
    ///
    /// `rid` itself may have been deleted in the meantime.
    pub fn next_record(&self, rid: Rid) -> Option<Rid> {
        self.live_slot_from(rid.slot_no.checked_add(1)?)
    }

    /// Bytes of the record named by `rid`.
    ///
    /// # Errors
    /// - `Error::InvalidSlot` if the RID names another page, a slot past the
    ///   end, or a deleted slot
    pub fn record(&self, rid: Rid) -> Result<&[u8]> {
        if rid.page_no != self.page_no() {
            return Err(Error::InvalidSlot(rid));
        }
        match self.slot(rid.slot_no) {
            Some(slot) if !slot.is_deleted() => {
                let start = slot.offset as usize;
                Ok(&self.bytes()[start..start + slot.length as usize])
            }
            _ => Err(Error::InvalidSlot(rid)),
        }
    }

    /// Number of live records on the page.
    pub fn record_count(&self) -> usize {
        (0..self.slot_count())
            .filter(|&s| self.slot(s).is_some_and(|slot| !slot.is_deleted()))
            .count()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> DataPage<B> {
    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    fn write_u16(&mut self, offset: usize, value: u16) {
        self.bytes_mut()[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        self.bytes_mut()[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn set_slot(&mut self, slot_no: u16, slot: Slot) {
        let at = DATA_HEADER_SIZE + slot_no as usize * SLOT_SIZE;
        self.write_u16(at, slot.offset);
        self.write_u16(at + 2, slot.length);
    }

    fn set_slot_count(&mut self, count: u16) {
        self.write_u16(OFFSET_SLOT_COUNT, count);
    }

    fn set_free_end(&mut self, free_end: usize) {
        self.write_u16(OFFSET_FREE_END, free_end as u16);
    }

    /// Format the page as an empty, chain-terminal data page.
    pub fn init(&mut self, page_no: PageId) {
        self.bytes_mut().fill(0);
        PageHeader::new(PageType::HeapData).write_to(self.bytes_mut());
        self.write_u32(OFFSET_PAGE_NO, page_no.0);
        self.write_u32(OFFSET_NEXT_PAGE, PageId::INVALID.0);
        self.set_slot_count(0);
        self.set_free_end(PAGE_SIZE);
    }

    /// Link this page to `next`.
    pub fn set_next_page(&mut self, next: PageId) {
        self.write_u32(OFFSET_NEXT_PAGE, next.0);
    }

    /// Store `record` on the page.
    ///
    /// # Errors
    /// - `Error::InvalidRecordLength` if no page could ever hold the record
    /// - `Error::NoSpace` if this page is too full
    pub fn insert_record(&mut self, record: &[u8]) -> Result<Rid> {
        if record.len() > MAX_RECORD_LEN {
            return Err(Error::InvalidRecordLength(record.len()));
        }

        let reuse = (0..self.slot_count()).find(|&s| self.slot(s).is_some_and(|x| x.is_deleted()));
        let needed = record.len() + if reuse.is_some() { 0 } else { SLOT_SIZE };
        if needed > self.free_space() {
            return Err(Error::NoSpace);
        }

        let slot_no = match reuse {
            Some(s) => s,
            None => {
                let s = self.slot_count();
                self.set_slot_count(s + 1);
                s
            }
        };

        let offset = self.free_end() - record.len();
        self.bytes_mut()[offset..offset + record.len()].copy_from_slice(record);
        self.set_free_end(offset);
        self.set_slot(
            slot_no,
            Slot {
                offset: offset as u16,
                length: record.len() as u16,
            },
        );

        Ok(Rid::new(self.page_no(), slot_no))
    }

    /// Remove the record named by `rid` and compact the record area.
    ///
    /// # Errors
    /// - `Error::InvalidSlot` if the RID does not name a live record here
    pub fn delete_record(&mut self, rid: Rid) -> Result<()> {
        if rid.page_no != self.page_no() {
            return Err(Error::InvalidSlot(rid));
        }
        let slot = match self.slot(rid.slot_no) {
            Some(slot) if !slot.is_deleted() => slot,
            _ => return Err(Error::InvalidSlot(rid)),
        };

        // Slide every record stored below the victim up by its length.
        let start = slot.offset as usize;
        let len = slot.length as usize;
        let free_end = self.free_end();
        self.bytes_mut().copy_within(free_end..start, free_end + len);
        self.set_free_end(free_end + len);

        for s in 0..self.slot_count() {
            if let Some(other) = self.slot(s) {
                if !other.is_deleted() && (other.offset as usize) < start {
                    self.set_slot(
                        s,
                        Slot {
                            offset: other.offset + slot.length,
                            length: other.length,
                        },
                    );
                }
            }
        }

        self.set_slot(
            rid.slot_no,
            Slot {
                offset: SLOT_DELETED,
                length: 0,
            },
        );

        let mut count = self.slot_count();
        while count > 0 && self.slot(count - 1).is_some_and(|s| s.is_deleted()) {
            count -= 1;
        }
        self.set_slot_count(count);

        Ok(())
    }
}
