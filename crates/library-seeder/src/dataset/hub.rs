//! Dataset-hub resolution.
//!
//! Datasets are cached as `<root>/datasets/<owner>/<name>/versions/<n>`, the
//! layout the Kaggle hub client uses. Missing datasets are fetched with the
//! external `kaggle` CLI.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::info;

use super::DatasetError;

/// Local cache of hub datasets plus the CLI used to fill it.
#[derive(Debug, Clone)]
pub struct DatasetHub {
    cache_root: PathBuf,
    cli: String,
}

impl DatasetHub {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            cli: "kaggle".to_string(),
        }
    }

    /// Uses `$KAGGLEHUB_CACHE`, else `~/.cache/kagglehub`.
    pub fn from_env() -> Self {
        let root = std::env::var_os("KAGGLEHUB_CACHE")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME")
                    .map(|home| PathBuf::from(home).join(".cache").join("kagglehub"))
            })
            .unwrap_or_else(|| PathBuf::from(".kagglehub"));
        Self::new(root)
    }

    /// Overrides the download command.
    pub fn with_cli(mut self, cli: impl Into<String>) -> Self {
        self.cli = cli.into();
        self
    }

    /// Cached directory for `dataset_id`, downloading it first if needed.
    pub async fn resolve(&self, dataset_id: &str) -> Result<PathBuf, DatasetError> {
        if let Some(dir) = self.cached(dataset_id)? {
            info!("Using cached dataset {} at {}", dataset_id, dir.display());
            return Ok(dir);
        }
        self.download(dataset_id).await
    }

    /// Highest cached version of `dataset_id`, if any.
    pub fn cached(&self, dataset_id: &str) -> Result<Option<PathBuf>, DatasetError> {
        let versions = self.dataset_root(dataset_id)?.join("versions");
        let Ok(entries) = std::fs::read_dir(&versions) else {
            return Ok(None);
        };

        let latest = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let version = entry.file_name().to_str()?.parse::<u32>().ok()?;
                Some((version, entry.path()))
            })
            .max_by_key(|(version, _)| *version)
            .map(|(_, path)| path);
        Ok(latest)
    }

    async fn download(&self, dataset_id: &str) -> Result<PathBuf, DatasetError> {
        let target = self.dataset_root(dataset_id)?.join("versions").join("1");
        std::fs::create_dir_all(&target)?;
        info!(
            "Downloading dataset {} into {}",
            dataset_id,
            target.display()
        );

        let result = Command::new(&self.cli)
            .args(["datasets", "download", "-d", dataset_id, "-p"])
            .arg(&target)
            .arg("--unzip")
            .output()
            .await;

        // An empty version directory would be picked up by the next cache lookup.
        match result {
            Ok(output) if output.status.success() => {}
            Ok(output) => {
                remove_if_empty(&target);
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(download_error(
                    dataset_id,
                    format!(
                        "{} exited with {}: {}",
                        self.cli,
                        output.status,
                        stderr.trim()
                    ),
                ));
            }
            Err(e) => {
                remove_if_empty(&target);
                return Err(download_error(
                    dataset_id,
                    format!("couldn't run {}: {e}", self.cli),
                ));
            }
        }

        if !target.is_dir() {
            return Err(download_error(
                dataset_id,
                format!("hub returned a non-directory path: {}", target.display()),
            ));
        }
        Ok(target)
    }

    fn dataset_root(&self, dataset_id: &str) -> Result<PathBuf, DatasetError> {
        match dataset_id.split('/').collect::<Vec<_>>().as_slice() {
            [owner, name] if valid_segment(owner) && valid_segment(name) => {
                Ok(self.cache_root.join("datasets").join(owner).join(name))
            }
            _ => Err(download_error(
                dataset_id,
                "dataset id must look like <owner>/<name>".to_string(),
            )),
        }
    }
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".."
}

fn remove_if_empty(dir: &Path) {
    if std::fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_none()) {
        std::fs::remove_dir(dir).ok();
    }
}

fn download_error(dataset_id: &str, message: String) -> DatasetError {
    DatasetError::Download {
        dataset_id: dataset_id.to_string(),
        message,
    }
}
