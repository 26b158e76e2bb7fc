use std::collections::BTreeMap;
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::error::{InstallError, Result};
use crate::util::{current_os, format_hash, is_valid_name, is_valid_sha256, is_valid_version};

/// Formulas compiled into the binary, as `(name, toml)` pairs.
const BUILTIN_FORMULAS: &[(&str, &str)] = &[
    ("open-codex", include_str!("../formulas/open-codex.toml")),
];

/// A package descriptor: everything needed to install one release of a tool.
///
/// A `Formula` is validated when it is parsed and never mutated afterwards.
/// A new release is a new descriptor, see [`Formula::with_release`].
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    name: String,
    desc: String,
    homepage: String,
    version: String,
    url: String,
    sha256: String,
    license: String,
    /// Per-OS overrides of `url` and `sha256`, keyed by `std::env::consts::OS`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    platforms: BTreeMap<String, Source>,
}

/// Where to download an archive and the digest it must hash to.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub url: String,
    pub sha256: String,
}

impl Formula {
    /// Parses and validates a formula from TOML text.
    ///
    /// # Errors
    /// Returns [`InstallError::InvalidFormula`] if the text is not valid TOML,
    /// a field is missing, or a field fails validation.
    pub fn parse(text: &str) -> Result<Formula> {
        let formula: Formula = toml::from_str(text)
            .map_err(|e| InstallError::InvalidFormula(e.message().to_string()))?;
        formula.validated()
    }

    /// Loads a formula from a `.toml` file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Formula> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(InstallError::fs("read formula", path))?;
        Formula::parse(&text).map_err(|e| match e {
            InstallError::InvalidFormula(msg) => {
                InstallError::InvalidFormula(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Saves the formula to the given file path in pretty TOML format.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let text = toml::to_string_pretty(self)
            .map_err(|e| InstallError::InvalidFormula(e.to_string()))?;
        std::fs::write(path, text).map_err(InstallError::fs("write formula", path))
    }

    /// Returns the built-in formula with the given name, if any.
    pub fn builtin(name: &str) -> Option<Formula> {
        BUILTIN_FORMULAS
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .and_then(|(_, text)| Formula::parse(text).ok())
    }

    /// Names of all built-in formulas.
    pub fn builtin_names() -> impl Iterator<Item = &'static str> {
        BUILTIN_FORMULAS.iter().map(|(name, _)| *name)
    }

    /// Resolves a formula argument as given on the command line.
    ///
    /// In order: an existing file path, `<formula_dir>/<query>.toml`, then a
    /// built-in formula.
    pub fn resolve(query: &str, formula_dir: &Path) -> Result<Formula> {
        let as_path = Path::new(query);
        if as_path.is_file() {
            return Formula::load(as_path);
        }
        if is_valid_name(query) {
            let in_dir = formula_dir.join(format!("{query}.toml"));
            if in_dir.is_file() {
                return Formula::load(in_dir);
            }
            if let Some(formula) = Formula::builtin(query) {
                return Ok(formula);
            }
        }
        let builtins: Vec<&str> = Formula::builtin_names().collect();
        Err(InstallError::InvalidFormula(format!(
            "no formula named {query} (built-in: {})",
            builtins.join(", ")
        )))
    }

    /// Returns a new descriptor for another release of the same tool.
    ///
    /// Platform overrides belong to the old release and are dropped.
    pub fn with_release(&self, version: &str, url: &str, sha256: &str) -> Result<Formula> {
        Formula {
            version: version.to_string(),
            url: url.to_string(),
            sha256: sha256.to_string(),
            platforms: BTreeMap::new(),
            ..self.clone()
        }
        .validated()
    }

    /// The download source for the current operating system.
    pub fn source(&self) -> Source {
        self.source_for(current_os())
    }

    /// The download source for `os`: its override if present, else the default.
    pub fn source_for(&self, os: &str) -> Source {
        self.platforms.get(os).cloned().unwrap_or_else(|| Source {
            url: self.url.clone(),
            sha256: self.sha256.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn homepage(&self) -> &str {
        &self.homepage
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn license(&self) -> &str {
        &self.license
    }

    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.platforms.keys().map(String::as_str)
    }

    fn validated(mut self) -> Result<Formula> {
        let invalid = |msg: String| Err(InstallError::InvalidFormula(msg));
        if !is_valid_name(&self.name) {
            return invalid(format!("invalid name `{}`", self.name));
        }
        if !is_valid_version(&self.version) {
            return invalid(format!("{}: invalid version `{}`", self.name, self.version));
        }
        validate_source(&self.name, &self.url, &self.sha256)?;
        self.sha256 = format_hash(&self.sha256);
        for (os, source) in self.platforms.iter_mut() {
            validate_source(&format!("{} ({os})", self.name), &source.url, &source.sha256)?;
            source.sha256 = format_hash(&source.sha256);
        }
        Ok(self)
    }
}

fn validate_source(what: &str, url: &str, sha256: &str) -> Result<()> {
    let scheme_ok = ["https://", "http://", "file://"]
        .iter()
        .any(|scheme| url.starts_with(scheme));
    if !scheme_ok {
        return Err(InstallError::InvalidFormula(format!(
            "{what}: unsupported url `{url}`"
        )));
    }
    if !is_valid_sha256(sha256) {
        return Err(InstallError::InvalidFormula(format!(
            "{what}: sha256 must be 64 hex digits, got `{sha256}`"
        )));
    }
    Ok(())
}
