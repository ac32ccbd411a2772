//! Position id to notification message id mapping.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::LedgerResult;

/// JSON file mapping position ids to external notification message
/// ids, so a restarted process can keep editing the same message.
///
/// The file is reset daily by an external process; a missing or
/// corrupt file simply loads empty. `set` persists immediately.
pub struct CorrelationStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, u64>>,
}

impl CorrelationStore {
    /// Load the store from disk, tolerating a missing file.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Corrupt correlation store, starting empty");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, position_id: &str) -> Option<u64> {
        self.entries.lock().get(position_id).copied()
    }

    /// Record a mapping and write the whole store back to disk.
    pub fn set(&self, position_id: &str, message_id: u64) -> LedgerResult<()> {
        let mut entries = self.entries.lock();
        entries.insert(position_id.to_string(), message_id);
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(&*entries)?;
        std::fs::write(&self.path, payload)?;
        Ok(())
    }
}
