use std::path::{Path, PathBuf};
use anyhow::{anyhow, Result};
use directories::ProjectDirs;

/// brewlet's per-user directories on this platform.
///
/// These only supply defaults; every one of them can be replaced through
/// [`Config`](crate::global::config::Config).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalDirs {
    config: PathBuf,
    cache: PathBuf,
    data: PathBuf,
}

impl GlobalDirs {
    /// Looks up the platform directories for brewlet.
    pub fn locate() -> Result<GlobalDirs> {
        let dirs = ProjectDirs::from("org", "brewlet", "brewlet")
            .ok_or_else(|| anyhow!("Could not determine a home directory"))?;
        Ok(GlobalDirs {
            config: dirs.config_dir().to_path_buf(),
            cache: dirs.cache_dir().to_path_buf(),
            data: dirs.data_dir().to_path_buf(),
        })
    }

    /// Default location of `config.toml`.
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.toml")
    }

    /// Default directory searched for `<name>.toml` formulas.
    pub fn formula_dir(&self) -> PathBuf {
        self.config.join("formulas")
    }

    /// Default archive cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache
    }

    /// Default installation prefix.
    pub fn prefix(&self) -> &Path {
        &self.data
    }
}
