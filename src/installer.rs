use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use crate::error::{InstallError, Result};
use crate::extract::{content_root, extract_archive};
use crate::fetch::{Fetcher, UrlFetcher};
use crate::formula::{Formula, Source};
use crate::global::cache::{cache_archive, get_cached_archive};
use crate::prefix::Prefix;
use crate::receipt::Receipt;
use crate::shims::{check_shim_path, create_shim, remove_shim, DEFAULT_PREFIX_COMMAND};
use crate::util::{format_hash, is_valid_name, sha256_hex};

/// Length of the random suffix on staging directory names.
const STAGING_SUFFIX_LEN: usize = 6;

/// Knobs for an installation that do not belong to the formula itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    /// Shell command the generated shim runs to find the prefix.
    pub prefix_command: String,
    /// Where verified archives are cached. `None` disables the cache.
    pub cache_dir: Option<PathBuf>,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            prefix_command: DEFAULT_PREFIX_COMMAND.to_string(),
            cache_dir: None,
        }
    }
}

/// The result of a successful installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
    /// `<prefix>/opt/<name>/libexec`
    pub libexec: PathBuf,
    /// `<prefix>/opt/<name>/libexec/<name>`
    pub executable: PathBuf,
    /// `<prefix>/bin/<name>`
    pub shim: PathBuf,
    pub sha256: String,
}

/// Installs `formula` into `prefix`, downloading with the default [`UrlFetcher`].
///
/// See [`install_with`].
pub fn install(formula: &Formula, prefix: &Prefix, options: &InstallOptions) -> Result<InstalledPackage> {
    install_with(formula, prefix, options, &UrlFetcher)
}

/// Installs `formula` into `prefix`.
///
/// 1. Fetch the archive (or take it from the cache).
/// 2. Verify its SHA-256 against the formula. Nothing under the prefix is
///    touched before this succeeds.
/// 3. Extract into a staging directory under `<prefix>/opt` and move it into
///    place as `<prefix>/opt/<name>/libexec`, replacing earlier content.
/// 4. Write the shim at `<prefix>/bin/<name>` with mode `0755`.
/// 5. Write the install receipt, which marks the package as installed.
///
/// A directory at the shim path is detected before anything is written. If a
/// later step fails, a fresh package is removed again and a reinstalled one
/// loses its receipt.
///
/// # Errors
///
/// [`InstallError::Network`], [`InstallError::Integrity`],
/// [`InstallError::Extraction`] or [`InstallError::Filesystem`], depending on
/// the step that failed.
pub fn install_with(
    formula: &Formula,
    prefix: &Prefix,
    options: &InstallOptions,
    fetcher: &dyn Fetcher,
) -> Result<InstalledPackage> {
    let name = formula.name();
    let source = formula.source();
    info!(name, version = formula.version(), url = %source.url, "installing");

    let bytes = fetch_verified_with(&source, options, fetcher)?;

    let shim = prefix.shim_path(name);
    check_shim_path(&shim)?;
    prefix.ensure_dirs()?;
    remove_stale_staging(prefix, Some(name))?;
    let was_installed = is_installed(name, prefix);
    let libexec = populate_libexec(name, &source.url, &bytes, prefix)?;

    let registered = create_shim(name, &options.prefix_command, &shim)
        .and_then(|()| Receipt::new(formula, &source).save(prefix.receipt_path(name)));
    if let Err(e) = registered {
        discard_failed_install(name, prefix, was_installed);
        return Err(e);
    }
    info!(name, shim = %shim.display(), "installed");

    Ok(InstalledPackage {
        name: name.to_string(),
        version: formula.version().to_string(),
        executable: libexec.join(name),
        libexec,
        shim,
        sha256: source.sha256,
    })
}

/// Downloads and verifies the archive for `formula` without installing it.
///
/// With a cache directory configured, the verified archive is stored there.
pub fn fetch_verified(formula: &Formula, options: &InstallOptions) -> Result<Vec<u8>> {
    fetch_verified_with(&formula.source(), options, &UrlFetcher)
}

/// Like [`fetch_verified`] with an injected fetcher.
pub fn fetch_verified_with(
    source: &Source,
    options: &InstallOptions,
    fetcher: &dyn Fetcher,
) -> Result<Vec<u8>> {
    if let Some(cache_dir) = &options.cache_dir {
        match get_cached_archive(cache_dir, &source.url, &source.sha256) {
            Ok(Some(bytes)) => return Ok(bytes),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "ignoring archive cache"),
        }
    }

    let bytes = fetcher.fetch(&source.url).map_err(|e| InstallError::Network {
        url: source.url.clone(),
        reason: e.to_string(),
    })?;
    debug!(url = %source.url, size = bytes.len(), "fetched");
    verify_checksum(&source.url, &bytes, &source.sha256)?;

    if let Some(cache_dir) = &options.cache_dir {
        if let Err(e) = cache_archive(cache_dir, &source.url, &source.sha256, &bytes) {
            warn!(error = %e, "could not cache archive");
        }
    }
    Ok(bytes)
}

/// Compares the SHA-256 of `bytes` with `expected`.
pub fn verify_checksum(url: &str, bytes: &[u8], expected: &str) -> Result<()> {
    let actual = sha256_hex(bytes);
    let expected = format_hash(expected);
    if actual != expected {
        return Err(InstallError::Integrity {
            url: url.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Undoes a partial installation so it is not listed as installed.
fn discard_failed_install(name: &str, prefix: &Prefix, was_installed: bool) {
    let cleanup = if was_installed {
        remove_path(&prefix.receipt_path(name)).map(|_| ())
    } else {
        remove_path(&prefix.package_dir(name))
            .and_then(|_| remove_shim(prefix.shim_path(name)))
            .map(|_| ())
    };
    if let Err(e) = cleanup {
        warn!(name, error = %e, "could not clean up after failed install");
    }
}

/// Removes staging directories left in `<prefix>/opt` by interrupted installs
/// of `name`, or of any package when `name` is `None`.
///
/// Returns how many directories were removed.
pub fn remove_stale_staging(prefix: &Prefix, name: Option<&str>) -> Result<usize> {
    let opt_dir = prefix.opt_dir();
    if !opt_dir.is_dir() {
        return Ok(0);
    }
    let entries = std::fs::read_dir(&opt_dir).map_err(InstallError::fs("read", &opt_dir))?;
    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(InstallError::fs("read", &opt_dir))?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let Some(owner) = staging_owner(&file_name) else {
            continue;
        };
        if name.is_some_and(|name| name != owner) {
            continue;
        }
        debug!(path = %entry.path().display(), "removing stale staging directory");
        if remove_path(&entry.path())? {
            removed += 1;
        }
    }
    Ok(removed)
}

/// The package a staging directory name (`.<name>-XXXXXX`) belongs to.
fn staging_owner(file_name: &str) -> Option<&str> {
    let (owner, suffix) = file_name.strip_prefix('.')?.rsplit_once('-')?;
    let random = suffix.len() == STAGING_SUFFIX_LEN && suffix.chars().all(|c| c.is_ascii_alphanumeric());
    (random && is_valid_name(owner)).then_some(owner)
}

fn populate_libexec(name: &str, url: &str, bytes: &[u8], prefix: &Prefix) -> Result<PathBuf> {
    let extraction = |reason: String| InstallError::Extraction {
        archive: url.to_string(),
        reason,
    };
    let opt_dir = prefix.opt_dir();
    let staging = tempfile::Builder::new()
        .prefix(&format!(".{name}-"))
        .rand_bytes(STAGING_SUFFIX_LEN)
        .tempdir_in(&opt_dir)
        .map_err(InstallError::fs("create staging directory in", &opt_dir))?;
    let unpacked = staging.path().join("unpacked");
    std::fs::create_dir(&unpacked).map_err(InstallError::fs("create directory", &unpacked))?;

    let count = extract_archive(bytes, &unpacked).map_err(|e| extraction(e.to_string()))?;
    debug!(name, entries = count, "extracted");
    let root = content_root(&unpacked).map_err(|e| extraction(e.to_string()))?;

    let executable = root.join(name);
    if !executable.is_file() {
        return Err(extraction(format!("archive does not contain an executable named `{name}`")));
    }
    ensure_executable(&executable)?;

    let package_dir = prefix.package_dir(name);
    std::fs::create_dir_all(&package_dir).map_err(InstallError::fs("create directory", &package_dir))?;
    let libexec = prefix.libexec_dir(name);
    remove_path(&libexec)?;
    std::fs::rename(&root, &libexec).map_err(InstallError::fs("move into place", &libexec))?;
    Ok(libexec)
}

#[cfg(unix)]
fn ensure_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = std::fs::metadata(path)
        .map_err(InstallError::fs("read permissions of", path))?
        .permissions()
        .mode();
    if mode & 0o111 == 0 {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .map_err(InstallError::fs("set permissions on", path))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Removes whatever sits at `path`. Returns whether something was removed.
fn remove_path(path: &Path) -> Result<bool> {
    let Ok(meta) = path.symlink_metadata() else {
        return Ok(false);
    };
    if meta.is_dir() {
        std::fs::remove_dir_all(path).map_err(InstallError::fs("remove", path))?;
    } else {
        std::fs::remove_file(path).map_err(InstallError::fs("remove", path))?;
    }
    Ok(true)
}

/// Removes exactly `<prefix>/opt/<name>` and `<prefix>/bin/<name>`, along
/// with any staging directories an interrupted install of `name` left behind.
///
/// # Errors
///
/// [`InstallError::NotInstalled`] if neither exists.
pub fn uninstall(name: &str, prefix: &Prefix) -> Result<()> {
    if !is_valid_name(name) {
        return Err(InstallError::NotInstalled(name.to_string()));
    }
    remove_stale_staging(prefix, Some(name))?;
    let removed_dir = remove_path(&prefix.package_dir(name))?;
    let removed_shim = remove_shim(prefix.shim_path(name))?;
    if !removed_dir && !removed_shim {
        return Err(InstallError::NotInstalled(name.to_string()));
    }
    info!(name, "uninstalled");
    Ok(())
}

/// Receipts of all installed packages, sorted by name.
pub fn installed_packages(prefix: &Prefix) -> Result<Vec<Receipt>> {
    let opt_dir = prefix.opt_dir();
    if !opt_dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(&opt_dir).map_err(InstallError::fs("read", &opt_dir))?;
    let mut receipts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(InstallError::fs("read", &opt_dir))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_valid_name(&name) {
            continue;
        }
        let receipt_path = prefix.receipt_path(&name);
        if receipt_path.is_file() {
            receipts.push(Receipt::load(receipt_path)?);
        }
    }
    receipts.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(receipts)
}

/// Finds the installed executable and shim for `name`, if they exist.
pub fn find_installed_paths(name: &str, prefix: &Prefix) -> (Option<PathBuf>, Option<PathBuf>) {
    if !is_valid_name(name) {
        return (None, None);
    }
    let executable = Some(prefix.executable(name)).filter(|p| p.is_file());
    let shim = Some(prefix.shim_path(name)).filter(|p| p.is_file());
    (executable, shim)
}

/// Checks whether a package is installed by verifying the receipt exists.
pub fn is_installed(name: &str, prefix: &Prefix) -> bool {
    is_valid_name(name) && prefix.receipt_path(name).is_file()
}
