use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;
use regex::Regex;
use semver::Version;
use sha2::{Digest, Sha256};

const BUF_SIZE: usize = 64 * 1024;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9._+-]*$").expect("formula name pattern is valid")
});

/// Strips the `sha256:` prefix from a hash if present and lowercases it.
/// This is useful for comparing hashes uniformly.
pub fn format_hash(hash: &str) -> String {
    let hash = hash.trim();
    hash.strip_prefix("sha256:")
        .unwrap_or(hash)
        .to_ascii_lowercase()
}

/// Returns true if `hash` (after [`format_hash`]) is 64 hex digits.
pub fn is_valid_sha256(hash: &str) -> bool {
    let hash = format_hash(hash);
    hash.len() == 64 && hash.chars().all(|c| c.is_ascii_hexdigit())
}

/// Validates whether a version string is a valid SemVer version.
/// Ignores anything after the first `-`.
pub fn is_valid_version(version: &str) -> bool {
    let version = version.split('-').next().unwrap_or_default();
    Version::parse(version).is_ok()
}

/// Validates a formula name: lowercase, starting with a letter or digit,
/// and safe to use as a single path component.
pub fn is_valid_name(name: &str) -> bool {
    NAME_RE.is_match(name) && name != "." && name != ".."
}

/// SHA-256 of an in-memory buffer as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// SHA-256 of a file as lowercase hex, read in chunks.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// The operating system name used to select per-platform formula sources
/// (`macos`, `linux`, `windows`, ...).
pub fn current_os() -> &'static str {
    std::env::consts::OS
}

/// Last path segment of a URL with any query or fragment removed.
pub fn url_file_name(url: &str) -> Option<&str> {
    let url = url.split(['?', '#']).next().unwrap_or(url);
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && !name.contains(':'))
}

/// Checks if a given path is an executable file on Unix.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Checks if a given path is an existing file on non-Unix targets.
#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}
