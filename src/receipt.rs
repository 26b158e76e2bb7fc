use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::error::{InstallError, Result};
use crate::formula::{Formula, Source};

/// What was installed for one package, stored as `INSTALL_RECEIPT.json`.
///
/// The receipt carries no timestamps so that reinstalling the same formula
/// writes the same bytes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub name: String,
    pub version: String,
    pub url: String,
    pub sha256: String,
    pub license: String,
}

impl Receipt {
    pub fn new(formula: &Formula, source: &Source) -> Self {
        Self {
            name: formula.name().to_string(),
            version: formula.version().to_string(),
            url: source.url.clone(),
            sha256: source.sha256.clone(),
            license: formula.license().to_string(),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Receipt> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(InstallError::fs("read receipt", path))?;
        serde_json::from_str(&content).map_err(|e| InstallError::Filesystem {
            action: "parse receipt",
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut content = serde_json::to_string_pretty(self).map_err(|e| InstallError::Filesystem {
            action: "serialize receipt for",
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
        content.push('\n');
        std::fs::write(path, content).map_err(InstallError::fs("write receipt", path))
    }
}
