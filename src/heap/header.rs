//! Heap file header page.
//!
//! ```text
//! +----------------------+  0
//! |    PageHeader        |  5 bytes
//! |    name_len  (u8)    |
//! |    name      [50]    |
//! |    first_page (u32)  |  56
//! |    last_page  (u32)  |  60
//! |    page_cnt   (u32)  |  64
//! |    rec_cnt    (u32)  |  68
//! +----------------------+
//! ```

use crate::common::config::MAX_FILE_NAME_LEN;
use crate::common::{Error, PageId, Result};
use crate::storage::page::{PageHeader, PageType};

const OFFSET_NAME_LEN: usize = PageHeader::SIZE;
const OFFSET_NAME: usize = OFFSET_NAME_LEN + 1;
const OFFSET_FIRST_PAGE: usize = OFFSET_NAME + MAX_FILE_NAME_LEN;
const OFFSET_LAST_PAGE: usize = OFFSET_FIRST_PAGE + 4;
const OFFSET_PAGE_CNT: usize = OFFSET_LAST_PAGE + 4;
const OFFSET_REC_CNT: usize = OFFSET_PAGE_CNT + 4;

fn get_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

fn put_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Decoded contents of a heap file's header page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub file_name: String,
    pub first_page: PageId,
    pub last_page: PageId,
    pub page_cnt: u32,
    pub rec_cnt: u32,
}

impl FileHeader {
    /// Header of a fresh file whose only data page is `data_page`.
    pub fn new(file_name: &str, data_page: PageId) -> Self {
        Self {
            file_name: file_name.to_string(),
            first_page: data_page,
            last_page: data_page,
            page_cnt: 1,
            rec_cnt: 0,
        }
    }

    /// Decode the header stored in page `page_no`.
    ///
    /// # Errors
    /// `Error::Corrupted` if the page is not a heap header page.
    pub fn read_from(page_no: PageId, data: &[u8]) -> Result<Self> {
        if PageHeader::from_bytes(data).page_type != PageType::HeapHeader {
            return Err(Error::Corrupted(page_no));
        }
        let name_len = data[OFFSET_NAME_LEN] as usize;
        if name_len > MAX_FILE_NAME_LEN {
            return Err(Error::Corrupted(page_no));
        }
        let name = &data[OFFSET_NAME..OFFSET_NAME + name_len];

        Ok(Self {
            file_name: String::from_utf8_lossy(name).into_owned(),
            first_page: PageId(get_u32(data, OFFSET_FIRST_PAGE)),
            last_page: PageId(get_u32(data, OFFSET_LAST_PAGE)),
            page_cnt: get_u32(data, OFFSET_PAGE_CNT),
            rec_cnt: get_u32(data, OFFSET_REC_CNT),
        })
    }

    /// Encode into page bytes, marking the page as a heap header.
    ///
    /// Names longer than the reserved field are truncated; file names are
    /// validated to fit when the file is created.
    pub fn write_to(&self, data: &mut [u8]) {
        PageHeader::new(PageType::HeapHeader).write_to(data);

        let name = self.file_name.as_bytes();
        let name_len = name.len().min(MAX_FILE_NAME_LEN);
        data[OFFSET_NAME_LEN] = name_len as u8;
        data[OFFSET_NAME..OFFSET_NAME + MAX_FILE_NAME_LEN].fill(0);
        data[OFFSET_NAME..OFFSET_NAME + name_len].copy_from_slice(&name[..name_len]);

        put_u32(data, OFFSET_FIRST_PAGE, self.first_page.0);
        put_u32(data, OFFSET_LAST_PAGE, self.last_page.0);
        put_u32(data, OFFSET_PAGE_CNT, self.page_cnt);
        put_u32(data, OFFSET_REC_CNT, self.rec_cnt);
    }
}
