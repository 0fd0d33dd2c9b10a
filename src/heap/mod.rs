//! Heap files: unordered records on a linked chain of slotted pages.
//!
//! - [`HeapFile`] - an open file holding its header page pinned
//! - [`HeapFileScan`] - filtered sequential read cursor
//! - [`InsertFileScan`] - append cursor
//! - [`create_heap_file`] / [`destroy_heap_file`]

mod header;
mod heap_file;
mod insert;
mod predicate;
mod scan;

pub use header::FileHeader;
pub use heap_file::{create_heap_file, destroy_heap_file, CloseError, HeapFile};
pub use insert::InsertFileScan;
pub use predicate::{Datatype, Operator, ScanFilter};
pub use scan::HeapFileScan;
