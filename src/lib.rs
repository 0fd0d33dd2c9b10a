//! heapstore - the storage core of a small relational database.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           heapstore                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                 Heap Files (heap/)                       │   │
//! │  │      HeapFile + HeapFileScan + InsertFileScan            │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                 Buffer Pool (buffer/)                    │   │
//! │  │   BufferPoolManager + FrameDirectory + ClockReplacer     │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                 Storage Layer (storage/)                 │   │
//! │  │      FileManager + DiskManager + Page + DataPage         │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, Rid, Error, config)
//! - [`buffer`] - Buffer pool and clock eviction
//! - [`storage`] - Files, disk I/O and page formats
//! - [`heap`] - Heap files and their cursors
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use heapstore::heap::{create_heap_file, HeapFileScan, InsertFileScan};
//! use heapstore::{BufferPoolManager, FileManager};
//!
//! let pool = Arc::new(BufferPoolManager::new(heapstore::common::config::DEFAULT_POOL_SIZE));
//! let files = Arc::new(FileManager::new("/tmp/db", pool));
//!
//! create_heap_file(&files, "emp").unwrap();
//! let mut ins = InsertFileScan::open(&files, "emp").unwrap();
//! let rid = ins.insert_record(b"alice").unwrap();
//! ins.close().unwrap();
//!
//! let mut scan = HeapFileScan::open(&files, "emp").unwrap();
//! assert_eq!(scan.scan_next().unwrap(), rid);
//! scan.close().unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod heap;
pub mod storage;

pub use common::config::PAGE_SIZE;
pub use common::{Error, FileId, FrameId, PageId, Result, Rid};

pub use buffer::{BufferPoolManager, BufferPoolStats, PinnedPage, StatsSnapshot};
pub use heap::{HeapFile, HeapFileScan, InsertFileScan};
pub use storage::page::{Page, PageHeader, PageType};
pub use storage::{DiskManager, FileManager};
