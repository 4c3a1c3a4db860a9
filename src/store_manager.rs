use crate::storage::CommandRecord;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Owns the single on-disk history slot. Every failure is logged and
/// swallowed; once the slot proves unusable the store keeps working in
/// memory-only mode for the rest of the process.
pub struct HistoryStore {
    path: Option<PathBuf>,
    // Cleared after a failed write; `path` is kept so `clear` still reaches
    // the file written before the failure.
    persisting: bool,
}

impl HistoryStore {
    pub fn new(path: PathBuf) -> Self {
        let usable = path
            .parent()
            .map(|dir| dir.as_os_str().is_empty() || fs::create_dir_all(dir).is_ok())
            .unwrap_or(true);

        if usable {
            Self {
                path: Some(path),
                persisting: true,
            }
        } else {
            tracing::warn!(path = %path.display(), "history directory unavailable, keeping history in memory only");
            Self::in_memory()
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            persisting: false,
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.persisting
    }

    /// Missing or corrupt data yields an empty history.
    pub fn load(&self) -> Vec<CommandRecord> {
        let Some(path) = self.path.as_ref().filter(|_| self.persisting) else {
            return Vec::new();
        };
        if !path.exists() {
            return Vec::new();
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Vec<CommandRecord>>(&content) {
                Ok(records) => records,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "ignoring corrupt history file");
                    Vec::new()
                }
            },
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to read history file");
                Vec::new()
            }
        }
    }

    pub fn save(&mut self, records: &[CommandRecord]) {
        let Some(path) = self.path.as_ref().filter(|_| self.persisting) else {
            return;
        };
        if let Err(err) = write_atomically(path, records) {
            tracing::warn!(path = %path.display(), error = %err, "failed to persist history, continuing in memory only");
            self.persisting = false;
        }
    }

    pub fn clear(&mut self) {
        let Some(path) = &self.path else {
            return;
        };
        if path.exists() {
            if let Err(err) = fs::remove_file(path) {
                tracing::warn!(path = %path.display(), error = %err, "failed to remove history file");
            }
        }
    }
}

fn write_atomically(path: &Path, records: &[CommandRecord]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = NamedTempFile::new_in(&dir).context("failed to create temp history file")?;
    serde_json::to_writer_pretty(&mut tmp, records).context("failed to serialize history")?;
    tmp.write_all(b"\n")?;
    tmp.persist(path).context("failed to replace history file")?;
    Ok(())
}
