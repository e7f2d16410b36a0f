//! Checkpoint persistence for incremental scans.
//!
//! A checkpoint is a single opaque cursor string stored under a stable
//! path keyed by plugin and account identity. It is read once at the start
//! of an incremental scan and overwritten only after the scan's directives
//! have all been emitted; a missing checkpoint is a cold start, not an
//! error.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::{PluginError, PluginResult};

/// Filesystem-backed store for one cursor value.
#[derive(Clone, Debug)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Create a store keyed by plugin and account identity.
    pub fn new(dir: impl Into<PathBuf>, plugin: &str, account: &str) -> Self {
        let path = dir.into().join(format!("{plugin}-{account}.cursor"));
        Self { path }
    }

    /// Read the persisted cursor, `None` on cold start.
    pub fn load(&self) -> PluginResult<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => {
                let cursor = raw.trim().to_string();
                if cursor.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(cursor))
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(PluginError::Checkpoint(format!(
                "failed reading {}: {err}",
                self.path.display()
            ))),
        }
    }

    /// Overwrite the persisted cursor.
    ///
    /// Writes through a sibling temp file and renames it into place, so a
    /// crash mid-write leaves the previous cursor intact.
    pub fn store(&self, cursor: &str) -> PluginResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                PluginError::Checkpoint(format!("failed creating {}: {err}", parent.display()))
            })?;
        }

        let tmp = self.path.with_extension("cursor.tmp");
        fs::write(&tmp, cursor).map_err(|err| {
            PluginError::Checkpoint(format!("failed writing {}: {err}", tmp.display()))
        })?;
        fs::rename(&tmp, &self.path).map_err(|err| {
            PluginError::Checkpoint(format!("failed renaming into {}: {err}", self.path.display()))
        })?;
        Ok(())
    }
}
