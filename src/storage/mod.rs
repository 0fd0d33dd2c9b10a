//! Storage layer - disk I/O, files, and page formats.
//!
//! This module handles persistent storage:
//! - [`DiskManager`] - Low-level page I/O for one file
//! - [`FileManager`] - Named files and the open-file table
//! - [`page`] - Page types and layouts

mod disk_manager;
mod file_manager;
pub mod page;

pub use disk_manager::DiskManager;
pub use file_manager::{FileHandle, FileManager, PagedFile};
