//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache between the heap file layer and
//! disk. It manages a fixed pool of frames, each holding one page.
//!
//! # Components
//! - [`BufferPoolManager`] - The main page cache
//! - [`Frame`] / [`FrameDescriptor`] - A slot's bytes and its bookkeeping
//! - [`FrameDirectory`] - (file, page) to frame index
//! - [`PinnedPage`] - Handle to one pin on a cached page
//! - [`BufferPoolStats`] - Performance statistics
//! - [`replacer`] - Clock eviction

mod buffer_pool_manager;
mod frame;
mod frame_directory;
mod pinned_page;
pub mod replacer;
mod stats;

pub use buffer_pool_manager::BufferPoolManager;
pub use frame::{Frame, FrameDescriptor, FrameInfo, FrameState, ResidentPage};
pub use frame_directory::{FrameDirectory, FrameKey};
pub use pinned_page::PinnedPage;
pub use stats::{BufferPoolStats, StatsSnapshot};
