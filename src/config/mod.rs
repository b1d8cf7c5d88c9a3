// ABOUTME: Host inventory loading for scpe.
// ABOUTME: Discovers the YAML inventory under the home directory, then the working directory.

mod deserialize;
mod host;

pub use host::{CallbackCommand, DEFAULT_PORT, DEFAULT_USER, HostDescriptor};

use crate::error::{Error, Result};
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAMES: [&str; 3] = [".scpe", ".scpe.yml", ".scpe.yaml"];

/// Ordered forest of host descriptors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
    hosts: Vec<HostDescriptor>,
}

impl Inventory {
    pub fn new(hosts: Vec<HostDescriptor>) -> Self {
        Self { hosts }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load the first readable inventory file.
    ///
    /// Every candidate name is tried under `home` before any is tried under `cwd`.
    pub fn discover(home: Option<&Path>, cwd: &Path) -> Result<Self> {
        let dirs: Vec<PathBuf> = home
            .into_iter()
            .chain(std::iter::once(cwd))
            .map(Path::to_path_buf)
            .collect();

        for dir in &dirs {
            for name in CONFIG_FILENAMES {
                let path = dir.join(name);
                match std::fs::read_to_string(&path) {
                    Ok(content) => {
                        tracing::debug!(path = %path.display(), "loading host inventory");
                        return Self::from_yaml(&content);
                    }
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => {
                        tracing::debug!(path = %path.display(), error = %e, "skipping unreadable inventory");
                    }
                }
            }
        }

        Err(Error::ConfigNotFound(dirs))
    }

    pub fn hosts(&self) -> &[HostDescriptor] {
        &self.hosts
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// The user's home directory from `HOME`.
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}
