use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{candidate::DeploymentCandidate, error::CheckpointError};

/// Durable record of the candidates found so far, one JSON file per key.
///
/// Every save rewrites the whole file through a temporary sibling and a rename, so a crash in
/// the middle of a write leaves the previous complete list in place. A single writer per key is
/// assumed.
#[derive(Debug, Clone)]
pub(crate) struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Opens the store rooted at `dir`, creating the directory and a `.gitignore` that keeps
    /// its contents out of version control.
    pub(crate) fn open(dir: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| CheckpointError::Write {
            path: dir.clone(),
            source,
        })?;

        let gitignore = dir.join(".gitignore");
        if !gitignore.exists() {
            fs::write(&gitignore, "*").map_err(|source| CheckpointError::Write {
                path: gitignore.clone(),
                source,
            })?;
        }

        Ok(Self { dir })
    }

    pub(crate) fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Reads the candidates stored under `key`. A missing or unreadable file yields an empty
    /// list.
    pub(crate) fn load(&self, key: &str) -> Vec<DeploymentCandidate> {
        let path = self.path(key);
        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(err) => {
                debug!(target: "checkpoint", path = %path.display(), %err, "no checkpoint to load");
                return Vec::new();
            }
        };

        match serde_json::from_slice(&contents) {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(target: "checkpoint", path = %path.display(), %err, "ignoring malformed checkpoint");
                Vec::new()
            }
        }
    }

    /// Replaces the candidates stored under `key`.
    pub(crate) fn save(&self, key: &str, candidates: &[DeploymentCandidate]) -> Result<(), CheckpointError> {
        let path = self.path(key);
        let staging = staging_path(&path);
        let json = serde_json::to_vec_pretty(candidates)?;

        write_synced(&staging, &json).map_err(|source| CheckpointError::Write {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| CheckpointError::Write {
            path: path.clone(),
            source,
        })?;

        debug!(target: "checkpoint", path = %path.display(), count = candidates.len(), "checkpoint saved");
        Ok(())
    }
}

/// Writes `contents` to `path` and flushes them to disk before returning.
fn write_synced(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
