use std::path::{Path, PathBuf};
use anyhow::{anyhow, Context, Result};
use tracing::{debug, warn};
use walkdir::WalkDir;
use crate::util::{sha256_hex, url_file_name};

/// Path under `cache_dir` where the archive for `url` with digest `sha256` lives.
pub fn cached_archive_path(cache_dir: &Path, url: &str, sha256: &str) -> Result<PathBuf> {
    let file_name = url_file_name(url).ok_or(anyhow!("Could not determine archive name for {url}"))?;
    Ok(cache_dir.join(format!("{sha256}--{file_name}")))
}

/// Returns the cached archive bytes if present and still matching `sha256`.
///
/// A cached file whose digest no longer matches is deleted.
pub fn get_cached_archive(cache_dir: &Path, url: &str, sha256: &str) -> Result<Option<Vec<u8>>> {
    let path = cached_archive_path(cache_dir, url, sha256)?;
    if !path.is_file() {
        return Ok(None);
    }
    let bytes = std::fs::read(&path)
        .with_context(|| format!("Could not read cached archive {}", path.display()))?;
    if sha256_hex(&bytes) != sha256 {
        warn!(path = %path.display(), "discarding cached archive with wrong checksum");
        std::fs::remove_file(&path)?;
        return Ok(None);
    }
    debug!(path = %path.display(), "using cached archive");
    Ok(Some(bytes))
}

/// Stores verified archive bytes in the cache.
pub fn cache_archive(cache_dir: &Path, url: &str, sha256: &str, bytes: &[u8]) -> Result<PathBuf> {
    if !cache_dir.exists() {
        std::fs::create_dir_all(cache_dir)
            .with_context(|| format!("Could not create cache dir {:?}", cache_dir))?;
        debug!(path = %cache_dir.display(), "cache directory created");
    }
    let path = cached_archive_path(cache_dir, url, sha256)?;
    std::fs::write(&path, bytes)
        .with_context(|| format!("Could not write cache file {:?}", path))?;
    Ok(path)
}

/// Removes every cached archive. Returns how many files were deleted.
pub fn clean_cache(cache_dir: &Path) -> Result<usize> {
    if !cache_dir.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in WalkDir::new(cache_dir).min_depth(1).contents_first(true) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            std::fs::remove_dir(entry.path())?;
        } else {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}
