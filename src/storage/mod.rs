//! Removable storage capability.
//!
//! Capture code only ever needs five operations on storage, captured by
//! the [`Storage`] trait. [`LocalStorage`] maps them onto a directory of
//! the host file system; [`MemoryStorage`] keeps everything in memory for
//! tests.

mod local;
mod memory;

pub use local::LocalStorage;
pub use memory::MemoryStorage;

use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage operation failures.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Nothing exists at `path`.
    #[error("{path}: not found")]
    NotFound {
        /// Storage path.
        path: PathBuf,
    },
    /// A directory could not be listed.
    #[error("failed to list {path}: {source}")]
    List {
        /// Storage path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A directory could not be created.
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        /// Storage path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A file could not be created.
    #[error("failed to create file {path}: {source}")]
    CreateFile {
        /// Storage path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Writing a file failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Storage path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Reading a file failed.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Storage path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Name of one directory entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntryName {
    /// File or directory name, without any path.
    pub name: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

impl EntryName {
    /// A file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }

    /// A directory entry.
    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }
}

/// The storage operations the capture code relies on.
pub trait Storage {
    /// Handle returned by [`Storage::create_writable_file`].
    type File: Write;

    /// Returns true if `path` names an existing file or directory.
    fn exists(&self, path: &Path) -> bool;

    /// Creates a single directory. The parent must exist.
    fn make_directory(&mut self, path: &Path) -> Result<(), StorageError>;

    /// Lists the immediate entries of a directory.
    fn list_entry_names(&self, path: &Path) -> Result<Vec<EntryName>, StorageError>;

    /// Creates or truncates a file for writing.
    fn create_writable_file(&mut self, path: &Path) -> Result<Self::File, StorageError>;

    /// Reads a whole file.
    fn read_whole(&self, path: &Path) -> Result<Vec<u8>, StorageError>;
}

/// Creates `path` and any missing parents.
pub fn ensure_directory<S: Storage>(storage: &mut S, path: &Path) -> Result<(), StorageError> {
    if storage.exists(path) {
        return Ok(());
    }
    let mut missing: Vec<&Path> = path
        .ancestors()
        .take_while(|dir| !dir.as_os_str().is_empty() && !storage.exists(dir))
        .collect();
    while let Some(dir) = missing.pop() {
        storage.make_directory(dir)?;
    }
    Ok(())
}

/// Writes `bytes` to a new file at `path`.
pub fn write_file<S: Storage>(storage: &mut S, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let mut file = storage.create_writable_file(path)?;
    file.write_all(bytes)
        .and_then(|()| file.flush())
        .map_err(|source| StorageError::Write {
            path: path.to_path_buf(),
            source,
        })
}
