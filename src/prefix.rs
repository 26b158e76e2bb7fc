use std::path::{Path, PathBuf};
use crate::error::{InstallError, Result};

/// File name of the install receipt kept next to `libexec`.
pub const RECEIPT_FILE: &str = "INSTALL_RECEIPT.json";

/// The root under which every package is installed.
///
/// ```text
/// <root>/bin/<name>                          shim
/// <root>/opt/<name>/libexec/                 extracted archive
/// <root>/opt/<name>/INSTALL_RECEIPT.json     receipt
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
    root: PathBuf,
}

impl Prefix {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn opt_dir(&self) -> PathBuf {
        self.root.join("opt")
    }

    /// Directory owned exclusively by one package.
    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.opt_dir().join(name)
    }

    pub fn libexec_dir(&self, name: &str) -> PathBuf {
        self.package_dir(name).join("libexec")
    }

    /// The real binary the shim forwards to.
    pub fn executable(&self, name: &str) -> PathBuf {
        self.libexec_dir(name).join(name)
    }

    pub fn shim_path(&self, name: &str) -> PathBuf {
        self.bin_dir().join(name)
    }

    pub fn receipt_path(&self, name: &str) -> PathBuf {
        self.package_dir(name).join(RECEIPT_FILE)
    }

    /// Ensures `bin/` and `opt/` exist under the root.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.bin_dir(), self.opt_dir()] {
            std::fs::create_dir_all(&dir).map_err(InstallError::fs("create directory", &dir))?;
        }
        Ok(())
    }
}
