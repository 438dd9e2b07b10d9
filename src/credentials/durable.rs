//! Durable key/value backends for the credential copy that survives restarts.
//!
//! The keychain backend stores secrets in the OS credential manager via the
//! `keyring` crate. The file backend keeps a small JSON map on disk and is
//! used where no keychain daemon is available.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use keyring::Entry;

use crate::error::StorageFault;

/// A synchronous key/value store with no expiry.
pub trait DurableStore: Send + Sync {
    /// Short backend name used in logs and storage faults.
    fn name(&self) -> &'static str;

    /// Returns `None` if no entry exists.
    fn get(&self, key: &str) -> Result<Option<String>, StorageFault>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageFault>;

    /// Idempotent: removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<(), StorageFault>;
}

/// OS keychain backend. Each key is its own entry under one service name.
pub struct KeychainStore {
    service: String,
}

impl KeychainStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StorageFault> {
        Ok(Entry::new(&self.service, key)?)
    }
}

/// A missing keychain entry is absence, not a fault.
fn present<T>(result: keyring::Result<T>) -> Result<Option<T>, StorageFault> {
    match result {
        Err(keyring::Error::NoEntry) => Ok(None),
        other => Ok(Some(other?)),
    }
}

impl DurableStore for KeychainStore {
    fn name(&self) -> &'static str {
        "keychain"
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageFault> {
        present(self.entry(key)?.get_password())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageFault> {
        Ok(self.entry(key)?.set_password(value)?)
    }

    fn remove(&self, key: &str) -> Result<(), StorageFault> {
        if present(self.entry(key)?.delete_credential())?.is_none() {
            log::debug!("Keychain entry {} already absent", key);
        }
        Ok(())
    }
}

/// JSON file backend. Writes go through a temp file and a rename.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, StorageFault> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(err) => {
                return Err(self.fault(format!("failed reading {}: {err}", self.path.display())))
            }
        };
        serde_json::from_str(&raw)
            .map_err(|err| self.fault(format!("failed parsing {}: {err}", self.path.display())))
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<(), StorageFault> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                self.fault(format!("failed creating {}: {err}", parent.display()))
            })?;
        }

        let encoded = serde_json::to_vec(entries).map_err(|err| self.fault(err.to_string()))?;
        let mut temp_path = self.path.clone().into_os_string();
        temp_path.push(".tmp");
        let temp_path = PathBuf::from(temp_path);

        fs::write(&temp_path, encoded).map_err(|err| {
            self.fault(format!("failed writing {}: {err}", temp_path.display()))
        })?;

        if let Err(rename_err) = fs::rename(&temp_path, &self.path) {
            // Windows refuses to rename over an existing file.
            match fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    let _ = fs::remove_file(&temp_path);
                    return Err(self.fault(format!(
                        "failed replacing {} after rename error {rename_err}: {err}",
                        self.path.display()
                    )));
                }
            }
            fs::rename(&temp_path, &self.path).map_err(|err| {
                let _ = fs::remove_file(&temp_path);
                self.fault(format!("failed persisting {}: {err}", self.path.display()))
            })?;
        }
        Ok(())
    }

    fn fault(&self, message: String) -> StorageFault {
        StorageFault::new(self.name(), message)
    }
}

impl DurableStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageFault> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageFault> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageFault> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load()?;
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.save(&entries)
    }
}

/// In-process backend.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageFault> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageFault> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageFault> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}
