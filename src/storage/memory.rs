//! In-memory storage.

use super::{EntryName, Storage, StorageError};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

type Tree = Rc<RefCell<BTreeMap<PathBuf, Node>>>;

/// Storage kept in a shared map.
///
/// Clones share the same tree, so a test can keep one handle to inspect
/// what the code under test wrote through another. The root `/` always
/// exists.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    tree: Tree,
}

/// Writer returned by [`MemoryStorage::create_writable_file`]. Bytes land
/// in the tree as soon as they are written.
#[derive(Debug)]
pub struct MemoryFile {
    tree: Tree,
    path: PathBuf,
}

impl MemoryStorage {
    /// An empty tree holding only the root directory.
    pub fn new() -> Self {
        let mut tree = BTreeMap::new();
        tree.insert(PathBuf::from("/"), Node::Dir);
        Self {
            tree: Rc::new(RefCell::new(tree)),
        }
    }

    /// Creates a directory and any missing parents.
    pub fn create_dir_all(&self, path: &Path) {
        let mut tree = self.tree.borrow_mut();
        let mut current = PathBuf::from("/");
        for component in normalize(path).components().skip(1) {
            current.push(component);
            tree.entry(current.clone()).or_insert(Node::Dir);
        }
    }

    /// Paths of every file in the tree, sorted.
    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.tree
            .borrow()
            .iter()
            .filter(|(_, node)| matches!(node, Node::File(_)))
            .map(|(path, _)| path.clone())
            .collect()
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.tree.borrow().get(path), Some(Node::Dir))
    }

    fn parent_exists(&self, path: &Path) -> bool {
        path.parent().map_or(false, |parent| self.is_dir(parent))
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// Anchors `path` at the root and drops `.` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::from("/");
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::ParentDir => {
                out.pop();
            }
            _ => {}
        }
    }
    out
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{} does not exist", path.display()))
}

impl Storage for MemoryStorage {
    type File = MemoryFile;

    fn exists(&self, path: &Path) -> bool {
        self.tree.borrow().contains_key(&normalize(path))
    }

    fn make_directory(&mut self, path: &Path) -> Result<(), StorageError> {
        let path = normalize(path);
        if !self.parent_exists(&path) {
            return Err(StorageError::CreateDir {
                source: not_found(path.parent().unwrap_or(&path)),
                path,
            });
        }
        if self.tree.borrow().contains_key(&path) {
            return Err(StorageError::CreateDir {
                source: io::Error::new(io::ErrorKind::AlreadyExists, "entry exists"),
                path,
            });
        }
        self.tree.borrow_mut().insert(path, Node::Dir);
        Ok(())
    }

    fn list_entry_names(&self, path: &Path) -> Result<Vec<EntryName>, StorageError> {
        let path = normalize(path);
        if !self.is_dir(&path) {
            return Err(StorageError::List {
                source: not_found(&path),
                path,
            });
        }
        let tree = self.tree.borrow();
        let names = tree
            .iter()
            .filter(|(entry, _)| entry.parent() == Some(path.as_path()))
            .filter_map(|(entry, node)| {
                let name = entry.file_name()?.to_string_lossy().into_owned();
                Some(EntryName {
                    name,
                    is_dir: matches!(node, Node::Dir),
                })
            })
            .collect();
        Ok(names)
    }

    fn create_writable_file(&mut self, path: &Path) -> Result<Self::File, StorageError> {
        let path = normalize(path);
        if !self.parent_exists(&path) || self.is_dir(&path) {
            return Err(StorageError::CreateFile {
                source: not_found(&path),
                path,
            });
        }
        self.tree
            .borrow_mut()
            .insert(path.clone(), Node::File(Vec::new()));
        Ok(MemoryFile {
            tree: Rc::clone(&self.tree),
            path,
        })
    }

    fn read_whole(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        let path = normalize(path);
        match self.tree.borrow().get(&path) {
            Some(Node::File(bytes)) => Ok(bytes.clone()),
            _ => Err(StorageError::NotFound { path }),
        }
    }
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.tree.borrow_mut().get_mut(&self.path) {
            Some(Node::File(bytes)) => {
                bytes.extend_from_slice(buf);
                Ok(buf.len())
            }
            _ => Err(not_found(&self.path)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
