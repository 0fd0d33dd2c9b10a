//! File manager - names, opens, and closes database files.
//!
//! The [`FileManager`] is rooted at a directory and keeps a table of open
//! files. Opening a file that is already open returns the same
//! [`FileHandle`], so every user of one file shares one identity in the
//! buffer pool. The last close flushes the file's frames.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::buffer::BufferPoolManager;
use crate::common::config::MAX_FILE_NAME_LEN;
use crate::common::{Error, FileId, PageId, Result};
use crate::storage::page::Page;
use crate::storage::DiskManager;

/// Shared handle to an open file.
pub type FileHandle = Arc<PagedFile>;

/// An open file: its identity plus the disk manager doing its I/O.
pub struct PagedFile {
    id: FileId,
    name: String,
    disk: Mutex<DiskManager>,
}

impl PagedFile {
    /// Wrap a disk manager under a fresh [`FileId`].
    pub fn new(name: impl Into<String>, disk: DiskManager) -> FileHandle {
        Arc::new(Self {
            id: FileId::next(),
            name: name.into(),
            disk: Mutex::new(disk),
        })
    }

    #[inline]
    pub fn id(&self) -> FileId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn read_page(&self, page_no: PageId, page: &mut Page) -> Result<()> {
        self.disk.lock().read_page(page_no, page)
    }

    pub fn write_page(&self, page_no: PageId, page: &Page) -> Result<()> {
        self.disk.lock().write_page(page_no, page)
    }

    pub fn allocate_page(&self) -> Result<PageId> {
        self.disk.lock().allocate_page()
    }

    pub fn dispose_page(&self, page_no: PageId) -> Result<()> {
        self.disk.lock().dispose_page(page_no)
    }

    pub fn first_page(&self) -> Result<PageId> {
        self.disk.lock().first_page()
    }

    pub fn sync(&self) -> Result<()> {
        self.disk.lock().sync()
    }
}

impl std::fmt::Debug for PagedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedFile")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

struct OpenFile {
    handle: FileHandle,
    open_count: usize,
}

/// Creates, opens, closes, and destroys files under one root directory.
///
/// # Usage
/// ```no_run
/// use std::sync::Arc;
/// use heapstore::{BufferPoolManager, FileManager};
///
/// let pool = Arc::new(BufferPoolManager::new(64));
/// let files = FileManager::new("/tmp/db", pool);
///
/// files.create_file("emp").unwrap();
/// let emp = files.open_file("emp").unwrap();
/// files.close_file(&emp).unwrap();
/// ```
pub struct FileManager {
    root: PathBuf,
    pool: Arc<BufferPoolManager>,
    open: Mutex<HashMap<String, OpenFile>>,
}

impl FileManager {
    pub fn new<P: AsRef<Path>>(root: P, pool: Arc<BufferPoolManager>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            pool,
            open: Mutex::new(HashMap::new()),
        }
    }

    /// The buffer pool all files go through.
    #[inline]
    pub fn pool(&self) -> &Arc<BufferPoolManager> {
        &self.pool
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.len() > MAX_FILE_NAME_LEN {
            return Err(Error::file_open(name, "name must be 1..=50 bytes"));
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(Error::file_open(name, "name must not contain a path"));
        }
        Ok(self.root.join(name))
    }

    /// Create an empty file.
    ///
    /// # Errors
    /// - `Error::FileExists` if a file with this name exists
    /// - `Error::FileOpenError` for an unusable name
    pub fn create_file(&self, name: &str) -> Result<()> {
        let path = self.path_for(name)?;
        if path.exists() {
            return Err(Error::FileExists(name.to_string()));
        }
        DiskManager::create(&path)?;
        debug!(file = name, "created file");
        Ok(())
    }

    /// Open a file, sharing the handle if it is already open.
    ///
    /// # Errors
    /// - `Error::FileNotFound` if no such file exists
    pub fn open_file(&self, name: &str) -> Result<FileHandle> {
        let path = self.path_for(name)?;
        let mut open = self.open.lock();

        if let Some(entry) = open.get_mut(name) {
            entry.open_count += 1;
            return Ok(Arc::clone(&entry.handle));
        }

        if !path.exists() {
            return Err(Error::FileNotFound(name.to_string()));
        }

        let handle = PagedFile::new(name, DiskManager::open(&path)?);
        open.insert(
            name.to_string(),
            OpenFile {
                handle: Arc::clone(&handle),
                open_count: 1,
            },
        );
        debug!(file = name, id = %handle.id(), "opened file");
        Ok(handle)
    }

    /// Drop one open reference. The last close flushes the file's frames
    /// out of the buffer pool and syncs the file.
    ///
    /// # Errors
    /// - `Error::FileOpenError` if `file` is not an open handle
    /// - `Error::PagePinned` if the last close finds a page still pinned;
    ///   the file then stays open
    pub fn close_file(&self, file: &FileHandle) -> Result<()> {
        let mut open = self.open.lock();

        let entry = match open.get_mut(file.name()) {
            Some(entry) if Arc::ptr_eq(&entry.handle, file) => entry,
            _ => return Err(Error::file_open(file.name(), "file is not open")),
        };

        if entry.open_count > 1 {
            entry.open_count -= 1;
            return Ok(());
        }

        if let Err(e) = self.pool.flush_file(file) {
            warn!(file = file.name(), error = %e, "flush on close failed, file left open");
            return Err(e);
        }
        file.sync()?;
        open.remove(file.name());
        debug!(file = file.name(), "closed file");
        Ok(())
    }

    /// Delete a file from disk.
    ///
    /// # Errors
    /// - `Error::FileOpenError` if the file is open
    /// - `Error::FileNotFound` if it does not exist
    pub fn destroy_file(&self, name: &str) -> Result<()> {
        let path = self.path_for(name)?;
        if self.open.lock().contains_key(name) {
            return Err(Error::file_open(name, "file is open"));
        }
        if !path.exists() {
            return Err(Error::FileNotFound(name.to_string()));
        }
        std::fs::remove_file(&path)?;
        debug!(file = name, "destroyed file");
        Ok(())
    }

    /// Whether a file with this name exists on disk.
    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.exists()).unwrap_or(false)
    }

    /// Number of outstanding opens of `name`.
    pub fn open_count(&self, name: &str) -> usize {
        self.open.lock().get(name).map_or(0, |e| e.open_count)
    }
}
