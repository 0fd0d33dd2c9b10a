//! Common types and utilities shared across heapstore.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants
//! - Error types
//! - Identifiers (PageId, FrameId, FileId, Rid)

pub mod config;
pub mod error;
mod frame_id;
mod page_id;
mod rid;

pub use error::{Error, Result};
pub use frame_id::{FileId, FrameId};
pub use page_id::PageId;
pub use rid::Rid;
