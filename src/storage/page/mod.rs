//! Page types and layout.
//!
//! This module contains:
//! - [`Page`] - The raw 4KB data container
//! - [`PageHeader`] - Type and checksum at the start of every page
//! - [`DataPage`] - Slotted record layout used by heap data pages

mod data_page;
#[allow(clippy::module_inception)]
mod page;
mod page_header;

pub use data_page::{DataPage, DATA_HEADER_SIZE, DPFIXED, MAX_RECORD_LEN, SLOT_SIZE};
pub use page::Page;
pub use page_header::{PageHeader, PageType};
