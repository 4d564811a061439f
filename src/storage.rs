use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::models::file::{is_plain_component, FileDescriptor, StoredName};

/// Regenerations allowed when a freshly generated name is already taken.
const MAX_NAME_ATTEMPTS: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid file path")]
    OutsideRoot,
    #[error("file not found")]
    NotFound,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The directory holding every uploaded file.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    canonical_root: PathBuf,
}

impl Storage {
    /// Creates the root if needed. Fails if it cannot be created or resolved.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root)?;
            log::info!("Created uploads directory at: {}", root.display());
        }
        let canonical_root = root.canonicalize()?;
        if !canonical_root.is_dir() {
            return Err(io::Error::other(format!(
                "uploads path {} is not a directory",
                root.display()
            )));
        }
        Ok(Self {
            root,
            canonical_root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `data` under a new unique name derived from the current time.
    pub fn store(&self, original_name: &str, data: &[u8]) -> Result<FileDescriptor, StorageError> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let stored_name = StoredName::generate(original_name);
            let path = self.root.join(stored_name.as_str());
            let mut f = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(f) => f,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };
            if let Err(e) = f.write_all(data).and_then(|_| f.sync_all()) {
                drop(f);
                let _ = fs::remove_file(&path);
                return Err(e.into());
            }
            return Ok(FileDescriptor {
                id: stored_name.id(),
                original_name: original_name.to_string(),
                stored_name,
                path: path.display().to_string(),
                size: data.len() as u64,
                uploaded_at: Utc::now(),
            });
        }
        Err(io::Error::new(io::ErrorKind::AlreadyExists, "no unique file name available").into())
    }

    /// Resolves `name` to a canonical path strictly inside the root.
    ///
    /// Anything but a single plain component is refused before the filesystem
    /// is consulted; symlinks are followed and must still land inside.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        if !is_plain_component(name) {
            return Err(StorageError::OutsideRoot);
        }
        let resolved = match self.canonical_root.join(name).canonicalize() {
            Ok(p) => p,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StorageError::NotFound),
            Err(e) => return Err(e.into()),
        };
        if resolved == self.canonical_root || !resolved.starts_with(&self.canonical_root) {
            return Err(StorageError::OutsideRoot);
        }
        Ok(resolved)
    }

    pub fn delete(&self, name: &str) -> Result<(), StorageError> {
        let resolved = self.resolve(name)?;
        if !resolved.is_file() {
            return Err(StorageError::NotFound);
        }
        // unlink the entry itself, not a symlink target
        match fs::remove_file(self.canonical_root.join(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}
