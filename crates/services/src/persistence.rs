//! Durable JSON storage for [`AppState`].

use chrono::Local;
use shared::AppState;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

pub const STATE_FILE_NAME: &str = "bovicheck_data.json";

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl PersistenceError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Anything that can commit the whole state. The orchestrator only needs this.
pub trait StateSaver {
    fn save(&self, state: &AppState) -> Result<(), PersistenceError>;
}

/// Single-file JSON store. Saves write a sibling temp file and rename it over
/// the target so a crash never leaves a truncated blob.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(STATE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when nothing has been saved yet.
    pub fn try_load(&self) -> Result<Option<AppState>, PersistenceError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PersistenceError::io(&self.path, e)),
        };
        Ok(Some(AppState::from_json(&raw)?))
    }

    /// Never fails: a missing or unreadable file yields the default state.
    /// An unreadable file is renamed aside first so the next save cannot
    /// overwrite it.
    pub fn load(&self) -> AppState {
        match self.try_load() {
            Ok(Some(state)) => {
                info!(
                    path = %self.path.display(),
                    indices = state.calculated_indices.len(),
                    chats = state.chat_history.len(),
                    "loaded state"
                );
                state
            }
            Ok(None) => AppState::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "falling back to empty state");
                match self.quarantine() {
                    Ok(moved) => warn!(to = %moved.display(), "moved unreadable state aside"),
                    Err(e) => warn!(error = %e, "could not move unreadable state aside"),
                }
                AppState::default()
            }
        }
    }

    /// `bovicheck_data.json.corrupt-YYYYMMDDHHMMSS` next to the original.
    fn quarantine(&self) -> Result<PathBuf, PersistenceError> {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| STATE_FILE_NAME.into());
        name.push(format!(".corrupt-{}", Local::now().format("%Y%m%d%H%M%S")));
        let target = self.path.with_file_name(name);
        fs::rename(&self.path, &target).map_err(|e| PersistenceError::io(&self.path, e))?;
        Ok(target)
    }

    fn write_atomic(&self, contents: &[u8]) -> Result<(), PersistenceError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| PersistenceError::io(&dir, e))?;
        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| PersistenceError::io(&dir, e))?;
        tmp.write_all(contents)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| PersistenceError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| PersistenceError::io(&self.path, e.error))?;
        Ok(())
    }
}

impl StateSaver for JsonStore {
    fn save(&self, state: &AppState) -> Result<(), PersistenceError> {
        let json = state.to_json()?;
        self.write_atomic(json.as_bytes())
    }
}
