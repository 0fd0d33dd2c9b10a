//! Frame directory - hash index from (file, page) to frame.

use std::collections::HashMap;

use crate::common::config::directory_capacity;
use crate::common::{Error, FileId, FrameId, PageId, Result};

/// Directory key: which page of which open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameKey {
    pub file: FileId,
    pub page_no: PageId,
}

impl FrameKey {
    #[inline]
    pub fn new(file: FileId, page_no: PageId) -> Self {
        Self { file, page_no }
    }
}

/// Maps every resident page to the frame caching it.
///
/// An entry exists exactly when some frame is resident with that key; the
/// buffer pool keeps the two in step.
#[derive(Debug)]
pub struct FrameDirectory {
    entries: HashMap<FrameKey, FrameId>,
}

impl FrameDirectory {
    /// Directory sized for a pool of `pool_size` frames.
    pub fn new(pool_size: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(directory_capacity(pool_size)),
        }
    }

    /// Register `key` as cached in `frame_id`.
    ///
    /// # Errors
    /// `Error::HashTableError` if the key is already present.
    pub fn insert(&mut self, key: FrameKey, frame_id: FrameId) -> Result<()> {
        if let Some(existing) = self.entries.get(&key) {
            return Err(Error::HashTableError(format!(
                "{}/{} already mapped to {}",
                key.file, key.page_no, existing
            )));
        }
        self.entries.insert(key, frame_id);
        Ok(())
    }

    /// Frame caching `key`.
    ///
    /// # Errors
    /// `Error::HashNotFound` if the page is not resident.
    pub fn lookup(&self, key: FrameKey) -> Result<FrameId> {
        self.entries.get(&key).copied().ok_or(Error::HashNotFound)
    }

    /// Forget `key`.
    ///
    /// # Errors
    /// `Error::HashTableError` if the key is absent.
    pub fn remove(&mut self, key: FrameKey) -> Result<FrameId> {
        self.entries.remove(&key).ok_or_else(|| {
            Error::HashTableError(format!("{}/{} not in directory", key.file, key.page_no))
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FrameKey, FrameId)> + '_ {
        self.entries.iter().map(|(&k, &f)| (k, f))
    }
}
