//! Storage on a host directory.

use super::{EntryName, Storage, StorageError};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Maps storage paths onto a root directory of the host file system.
///
/// Storage paths are relative to the root; a leading `/` is ignored so
/// device-style absolute paths such as `/images` work unchanged.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Uses `root` as the storage root. The directory must exist.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        let relative = path.strip_prefix("/").unwrap_or(path);
        self.root.join(relative)
    }
}

impl Storage for LocalStorage {
    type File = BufWriter<File>;

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }

    fn make_directory(&mut self, path: &Path) -> Result<(), StorageError> {
        fs::create_dir(self.resolve(path)).map_err(|source| StorageError::CreateDir {
            path: path.to_path_buf(),
            source,
        })
    }

    fn list_entry_names(&self, path: &Path) -> Result<Vec<EntryName>, StorageError> {
        let list_err = |source| StorageError::List {
            path: path.to_path_buf(),
            source,
        };

        let mut names = Vec::new();
        for entry in fs::read_dir(self.resolve(path)).map_err(list_err)? {
            let entry = entry.map_err(list_err)?;
            let is_dir = entry.file_type().map_err(list_err)?.is_dir();
            names.push(EntryName {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
            });
        }
        names.sort();
        Ok(names)
    }

    fn create_writable_file(&mut self, path: &Path) -> Result<Self::File, StorageError> {
        let file = File::create(self.resolve(path)).map_err(|source| StorageError::CreateFile {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(BufWriter::new(file))
    }

    fn read_whole(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        fs::read(self.resolve(path)).map_err(|source| StorageError::Read {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ensure_directory, write_file};
    use tempfile::TempDir;

    #[test]
    fn test_round_trip_on_disk() {
        let root = TempDir::new().unwrap();
        let mut storage = LocalStorage::new(root.path());
        let dir = Path::new("/images");

        ensure_directory(&mut storage, dir).unwrap();
        ensure_directory(&mut storage, dir).unwrap();
        storage.make_directory(&dir.join("3")).unwrap();
        write_file(&mut storage, &dir.join("IMG_1.jpg"), &[0xFF, 0xD8]).unwrap();

        let names = storage.list_entry_names(dir).unwrap();
        assert_eq!(names, vec![EntryName::dir("3"), EntryName::file("IMG_1.jpg")]);
        assert_eq!(storage.read_whole(&dir.join("IMG_1.jpg")).unwrap(), vec![0xFF, 0xD8]);
        assert!(root.path().join("images/IMG_1.jpg").is_file());
    }

    #[test]
    fn test_missing_parent_fails() {
        let root = TempDir::new().unwrap();
        let mut storage = LocalStorage::new(root.path());
        assert!(matches!(
            storage.make_directory(Path::new("a/b")),
            Err(StorageError::CreateDir { .. })
        ));
        assert!(matches!(
            storage.list_entry_names(Path::new("nope")),
            Err(StorageError::List { .. })
        ));
    }
}
