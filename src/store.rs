//! File-backed settings store.
//!
//! Provides:
//! - Committed and draft `GatewayConfig` slots as JSON files
//! - File locking so concurrent CLI invocations never interleave writes
//! - Atomic replace (temp file + rename) for every write
//!
//! A missing or unreadable slot is reported as "unconfigured" (`None`),
//! never as an error.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::gateway::GatewayConfig;
use crate::{Error, Result};

pub const COMMITTED_FILE: &str = "gateway_config.json";
pub const DRAFT_FILE: &str = "gateway_config_draft.json";
pub const HISTORY_FILE: &str = "analysis_history.json";
const LOCK_FILE: &str = "settings.lock";

/// Exclusive lock on the storage directory; released on drop.
struct StoreLock {
    file: File,
}

impl StoreLock {
    fn acquire(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    dir: PathBuf,
}

impl SettingsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.storage_dir.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    fn committed_path(&self) -> PathBuf {
        self.dir.join(COMMITTED_FILE)
    }

    fn draft_path(&self) -> PathBuf {
        self.dir.join(DRAFT_FILE)
    }

    /// Active configuration, if any.
    pub fn load_committed(&self) -> Option<GatewayConfig> {
        read_json(&self.committed_path())
    }

    pub fn load_draft(&self) -> Option<GatewayConfig> {
        read_json(&self.draft_path())
    }

    /// Overwrite the draft slot. The committed slot is untouched.
    pub fn save_draft(&self, draft: &GatewayConfig) -> Result<()> {
        let _lock = StoreLock::acquire(&self.dir)?;
        write_json_atomic(&self.draft_path(), draft)
    }

    /// Apply `edit` to the current draft (or the committed config, or an
    /// empty one) and persist the result as the new draft.
    pub fn edit_draft<F>(&self, edit: F) -> Result<GatewayConfig>
    where
        F: FnOnce(&mut GatewayConfig),
    {
        let _lock = StoreLock::acquire(&self.dir)?;
        let mut draft = self
            .load_draft()
            .or_else(|| self.load_committed())
            .unwrap_or_default();
        edit(&mut draft);
        write_json_atomic(&self.draft_path(), &draft)?;
        Ok(draft)
    }

    /// Promote the draft to the committed slot after validating it.
    ///
    /// The draft stays in place so further edits start from it.
    pub fn commit(&self) -> Result<GatewayConfig> {
        let _lock = StoreLock::acquire(&self.dir)?;
        let draft = self
            .load_draft()
            .ok_or_else(|| Error::InvalidInput("no draft to commit".to_string()))?;
        draft.validate()?;
        write_json_atomic(&self.committed_path(), &draft)?;
        info!(channel = %draft.channel_id, "Gateway configuration committed");
        Ok(draft)
    }

    /// Returns whether a draft existed.
    pub fn discard_draft(&self) -> Result<bool> {
        let _lock = StoreLock::acquire(&self.dir)?;
        remove_if_exists(&self.draft_path())
    }

    /// Remove the committed configuration. Returns whether one existed.
    pub fn clear(&self) -> Result<bool> {
        let _lock = StoreLock::acquire(&self.dir)?;
        let removed = remove_if_exists(&self.committed_path())?;
        if removed {
            info!("Gateway configuration cleared");
        }
        Ok(removed)
    }
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Read and parse a JSON file; absence or corruption yields `None`.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No stored file");
            return None;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read stored file");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unparsable stored file");
            None
        }
    }
}

/// Serialize to a sibling temp file, then rename over `path`.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
