//! Persisted snapshot of what a seeding run found and created.
//!
//! The file is advisory: everything in it can be rebuilt by re-querying the
//! service, so a missing or unreadable file just means "start empty".

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Name (or title, or username) to remote id.
pub type IdMap = BTreeMap<String, i64>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Couldn't write state file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Couldn't serialize state: {0}")]
    Json(#[from] serde_json::Error),
}

/// Final counts of a run, also printed to stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub categories: usize,
    pub authors: usize,
    pub books: usize,
    pub users: usize,
    pub created_borrows: usize,
    pub returned_borrows: usize,
    pub created_reviews: usize,
    pub queue_joins: usize,
    pub queue_scenarios: usize,
}

/// Contents of the state file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedState {
    pub categories: IdMap,
    pub authors: IdMap,
    pub books: IdMap,
    pub users: IdMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_password_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    /// Keys this tool doesn't know, kept as found.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SeedState {
    /// Reads `path`, treating a missing or corrupt file as empty.
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!("No previous state at {}: {}", path.display(), e);
                return Self::default();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(state) => state,
            Err(e) => {
                warn!("Ignoring unreadable state file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Writes the state as pretty JSON, replacing `path` atomically.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, &json).map_err(|source| StateError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Writes to a sibling temp file, then renames it over `path`.
fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "state path must be a file")
        })?;
    let tmp = path.with_file_name(format!(".{}.tmp.{}", file_name, std::process::id()));

    std::fs::write(&tmp, contents)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        std::fs::remove_file(&tmp).ok();
        return Err(e);
    }
    Ok(())
}
