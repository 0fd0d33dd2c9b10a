//! Error types for heapstore.
//!
//! Every operation in the crate returns [`Result`]. The variants mirror the
//! status taxonomy of the storage core one-to-one, so a failing call can be
//! matched against the exact condition that stopped it.

use thiserror::Error;

use super::{PageId, Rid};

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in heapstore.
#[derive(Debug, Error)]
pub enum Error {
    /// Every frame in the buffer pool is pinned.
    #[error("buffer pool exceeded: all frames are pinned")]
    BufferExceeded,

    /// The frame directory is inconsistent (duplicate insert or missing remove).
    #[error("frame directory error: {0}")]
    HashTableError(String),

    /// Lookup miss in the frame directory. Absorbed inside the buffer pool.
    #[error("page not found in frame directory")]
    HashNotFound,

    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unpin of a page that is not resident or whose pin count is already zero.
    #[error("{0} is not pinned")]
    PageNotPinned(PageId),

    /// Flush of a file while one of its pages is still pinned.
    #[error("{0} is still pinned")]
    PagePinned(PageId),

    /// Create of a file that already exists.
    #[error("file '{0}' already exists")]
    FileExists(String),

    /// Open or destroy of a file that does not exist.
    #[error("file '{0}' not found")]
    FileNotFound(String),

    /// The file cannot be opened, closed, or destroyed in its current state.
    #[error("file '{name}' cannot be used: {reason}")]
    FileOpenError { name: String, reason: String },

    /// Invalid scan parameters passed to `start_scan`.
    #[error("bad scan parameter: {0}")]
    BadScanParam(String),

    /// Record larger than the payload a single data page can hold.
    #[error("invalid record length {0}")]
    InvalidRecordLength(usize),

    /// Data page is full. Absorbed by the insert path.
    #[error("no space left on page")]
    NoSpace,

    /// Scan ran past the last record of the file.
    #[error("end of file")]
    EndOfFile,

    /// Page number outside the file, on the free list, or otherwise unusable.
    #[error("bad page number {0}")]
    BadPageNo(PageId),

    /// RID names no live record.
    #[error("invalid slot {0}")]
    InvalidSlot(Rid),

    /// Cursor operation issued without a current record.
    #[error("cursor has no current record")]
    NoCurrentRecord,

    /// Page checksum did not match its contents on read.
    #[error("{0} is corrupted (checksum mismatch)")]
    Corrupted(PageId),
}

impl Error {
    /// Builds a [`Error::FileOpenError`].
    pub fn file_open(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::FileOpenError {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for signals that are handled inside the crate and never
    /// reach a well-behaved caller.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::HashNotFound | Error::NoSpace)
    }
}
