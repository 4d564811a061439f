use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::backend::{BackendError, DocumentBackend};
use super::UploadFile;
use crate::config::Config;
use crate::models::{FileDescriptor, StoredName};

/// In-memory stand-in for the upload service.
///
/// Applies the same count, type and size rules and the same naming scheme,
/// but keeps file bodies in memory. Can be switched offline to exercise
/// failure handling.
#[derive(Debug)]
pub struct SimulatedBackend {
    cfg: Config,
    files: Mutex<HashMap<StoredName, Vec<u8>>>,
    offline: AtomicBool,
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::from_config(Config::default())
    }
}

impl SimulatedBackend {
    pub fn from_config(cfg: Config) -> Self {
        Self {
            cfg,
            files: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// While offline every call fails with a 503.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn contains(&self, stored_name: &StoredName) -> bool {
        self.files().contains_key(stored_name)
    }

    pub fn len(&self) -> usize {
        self.files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn files(&self) -> MutexGuard<'_, HashMap<StoredName, Vec<u8>>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_online(&self) -> Result<(), BackendError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(rejected(503, "service unavailable"));
        }
        Ok(())
    }

    fn validate(&self, files: &[UploadFile]) -> Result<(), BackendError> {
        if files.is_empty() {
            return Err(rejected(400, "no files uploaded"));
        }
        if files.len() > self.cfg.max_files {
            return Err(rejected(400, &format!("too many files, maximum is {}", self.cfg.max_files)));
        }
        for f in files {
            if !self.cfg.is_allowed_mime(&f.content_type) {
                return Err(rejected(400, "only PDF files are allowed"));
            }
            if f.data.len() > self.cfg.max_upload_size {
                return Err(rejected(
                    400,
                    &format!("file too large, maximum size is {} MiB", self.cfg.max_upload_size_mib()),
                ));
            }
        }
        Ok(())
    }
}

fn rejected(status: u16, message: &str) -> BackendError {
    BackendError::Status {
        status,
        message: message.to_string(),
    }
}

impl DocumentBackend for SimulatedBackend {
    async fn upload(&self, files: Vec<UploadFile>) -> Result<Vec<FileDescriptor>, BackendError> {
        self.check_online()?;
        self.validate(&files)?;

        let mut stored = self.files();
        let mut out = Vec::with_capacity(files.len());
        for f in files {
            let mut stored_name = StoredName::generate(&f.name);
            while stored.contains_key(&stored_name) {
                stored_name = StoredName::generate(&f.name);
            }
            out.push(FileDescriptor {
                id: stored_name.id(),
                original_name: f.name,
                path: format!("memory:{stored_name}"),
                stored_name: stored_name.clone(),
                size: f.data.len() as u64,
                uploaded_at: Utc::now(),
            });
            stored.insert(stored_name, f.data);
        }
        Ok(out)
    }

    async fn delete(&self, stored_name: &StoredName) -> Result<(), BackendError> {
        self.check_online()?;
        match self.files().remove(stored_name) {
            Some(_) => Ok(()),
            None => Err(rejected(404, "file not found")),
        }
    }
}
