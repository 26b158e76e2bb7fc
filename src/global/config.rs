use std::ffi::OsString;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use crate::global::utils::GlobalDirs;
use crate::prefix::Prefix;
use crate::shims::DEFAULT_PREFIX_COMMAND;

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "BREWLET_CONFIG";
pub const PREFIX_ENV: &str = "BREWLET_PREFIX";
pub const CACHE_ENV: &str = "BREWLET_CACHE";
pub const FORMULA_DIR_ENV: &str = "BREWLET_FORMULA_DIR";
pub const PREFIX_COMMAND_ENV: &str = "BREWLET_PREFIX_COMMAND";

/// Settings read from `config.toml`, overridable from the environment.
///
/// Every key is optional; unset keys fall back to the platform's standard
/// directories.
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root of the installation prefix.
    pub prefix: Option<PathBuf>,
    /// Where verified archives are cached.
    pub cache_dir: Option<PathBuf>,
    /// Where `<name>.toml` formulas are looked up.
    pub formula_dir: Option<PathBuf>,
    /// Shell command a shim runs to resolve the prefix.
    pub prefix_command: Option<String>,
}

impl Config {
    /// Loads the config file and applies environment overrides.
    pub fn load() -> Result<Config> {
        let path = Config::config_path()?;
        Ok(Config::load_from(&path)?.with_env(|key| std::env::var_os(key)))
    }

    /// Path of the config file: `$BREWLET_CONFIG` or `<config_dir>/config.toml`.
    pub fn config_path() -> Result<PathBuf> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Ok(PathBuf::from(path)),
            None => Ok(GlobalDirs::locate()?.config_file()),
        }
    }

    /// Reads a config file. A missing file yields the default config.
    pub fn load_from(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Applies overrides found through `lookup` (normally the process environment).
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<OsString>) -> Config {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());
        if let Some(prefix) = non_empty(PREFIX_ENV) {
            self.prefix = Some(PathBuf::from(prefix));
        }
        if let Some(cache) = non_empty(CACHE_ENV) {
            self.cache_dir = Some(PathBuf::from(cache));
        }
        if let Some(dir) = non_empty(FORMULA_DIR_ENV) {
            self.formula_dir = Some(PathBuf::from(dir));
        }
        if let Some(command) = non_empty(PREFIX_COMMAND_ENV) {
            self.prefix_command = Some(command.to_string_lossy().into_owned());
        }
        self
    }

    pub fn prefix(&self) -> Result<Prefix> {
        match &self.prefix {
            Some(prefix) => Ok(Prefix::new(prefix)),
            None => Ok(Prefix::new(GlobalDirs::locate()?.prefix())),
        }
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(GlobalDirs::locate()?.cache_dir().to_path_buf()),
        }
    }

    pub fn formula_dir(&self) -> Result<PathBuf> {
        match &self.formula_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(GlobalDirs::locate()?.formula_dir()),
        }
    }

    pub fn prefix_command(&self) -> String {
        self.prefix_command
            .clone()
            .unwrap_or_else(|| DEFAULT_PREFIX_COMMAND.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.prefix_command(), DEFAULT_PREFIX_COMMAND);
    }

    #[test]
    fn test_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "prefix = \"/tmp/brewlet\"\nprefix_command = \"echo /tmp/brewlet\"\n")
            .unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.prefix().unwrap().root(), Path::new("/tmp/brewlet"));
        assert_eq!(config.prefix_command(), "echo /tmp/brewlet");
    }

    #[test]
    fn test_unknown_key_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "prefx = \"/tmp\"\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            (PREFIX_ENV, "/env/prefix"),
            (CACHE_ENV, "/env/cache"),
            (FORMULA_DIR_ENV, ""),
        ]);
        let config = Config {
            prefix: Some(PathBuf::from("/file/prefix")),
            formula_dir: Some(PathBuf::from("/file/formulas")),
            ..Config::default()
        }
        .with_env(|key| env.get(key).map(|value| OsString::from(*value)));
        assert_eq!(config.prefix, Some(PathBuf::from("/env/prefix")));
        assert_eq!(config.cache_dir().unwrap(), PathBuf::from("/env/cache"));
        assert_eq!(config.formula_dir().unwrap(), PathBuf::from("/file/formulas"));
    }
}
