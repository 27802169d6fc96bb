//! Durable key-value slots for install-scoped state.
//!
//! Two slots matter to the gate pipeline: the per-install device identifier
//! and the last successfully resolved final URL. Writes are fire-and-forget;
//! a failed write is logged and swallowed, never surfaced to the caller.

use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

/// Slot holding the persisted per-install device identifier.
pub const DEVICE_ID_KEY: &str = "device_id";

/// Slot holding the last successfully resolved final URL.
pub const FINAL_URL_KEY: &str = "final_url";

/// Install-scoped durable string storage.
///
/// `set` never reports failure; readers must tolerate a missing value on
/// first run.
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

#[derive(Debug, Error)]
enum StateFileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk file format.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    slots: HashMap<String, String>,
    #[serde(default = "default_version")]
    version: u32,
}

fn default_version() -> u32 {
    1
}

/// [`StateStore`] backed by a single JSON file.
pub struct FileStateStore {
    file_path: PathBuf,
    // Serializes the read-modify-write cycle within this process.
    write_lock: Mutex<()>,
}

impl FileStateStore {
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            file_path: path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn read_file(&self) -> Result<StateFile, StateFileError> {
        if !self.file_path.exists() {
            return Ok(StateFile::default());
        }
        let content = fs::read_to_string(&self.file_path)?;
        let file: StateFile = serde_json::from_str(&content)?;
        Ok(file)
    }

    fn write_file(&self, file: &StateFile) -> Result<(), StateFileError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(file)?;
        fs::write(&self.file_path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.file_path, permissions)?;
        }

        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.read_file() {
            Ok(file) => file.slots.get(key).cloned(),
            Err(err) => {
                warn!(key, "state read failed: {err}");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = match self.read_file() {
            Ok(file) => file,
            // A corrupt file is replaced rather than kept around.
            Err(err) => {
                warn!(key, "state file unreadable, starting fresh: {err}");
                StateFile::default()
            }
        };
        file.slots.insert(key.to_string(), value.to_string());
        if let Err(err) = self.write_file(&file) {
            warn!(key, "state write failed: {err}");
        }
    }
}

/// In-memory [`StateStore`] for tests and embedders without durable storage.
#[derive(Default)]
pub struct MemoryStateStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Option<String> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.insert(key.to_string(), value.to_string());
    }
}
