//! Archive extraction for downloaded packages.
//!
//! Supports zip, gzip-compressed tar and plain tar archives, detected from
//! their leading bytes. Entry paths are checked so nothing lands outside the
//! destination directory.

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use flate2::read::GzDecoder;
use zip::ZipArchive;

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A path in the archive attempts to escape the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal { path: String },

    #[error("unrecognised archive format")]
    UnknownFormat,

    #[error("archive is empty")]
    EmptyArchive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
    Tar,
}

impl ArchiveKind {
    /// Detects the archive format from magic bytes.
    pub fn detect(bytes: &[u8]) -> Option<ArchiveKind> {
        if bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(b"PK\x05\x06") {
            Some(ArchiveKind::Zip)
        } else if bytes.starts_with(&[0x1f, 0x8b]) {
            Some(ArchiveKind::TarGz)
        } else if bytes.len() >= 262 && &bytes[257..262] == b"ustar" {
            Some(ArchiveKind::Tar)
        } else {
            None
        }
    }
}

/// Unpacks `bytes` into `dest`, which must already exist.
///
/// Returns the number of entries written.
pub fn extract_archive(bytes: &[u8], dest: &Path) -> Result<usize, ExtractionError> {
    let count = match ArchiveKind::detect(bytes).ok_or(ExtractionError::UnknownFormat)? {
        ArchiveKind::Zip => extract_zip(bytes, dest)?,
        ArchiveKind::TarGz => extract_tar(GzDecoder::new(bytes), dest)?,
        ArchiveKind::Tar => extract_tar(bytes, dest)?,
    };
    if count == 0 {
        return Err(ExtractionError::EmptyArchive);
    }
    Ok(count)
}

/// Returns the directory whose contents should be installed.
///
/// An archive that unpacks to a single top-level directory is entered;
/// anything else is installed as-is.
pub fn content_root(dir: &Path) -> std::io::Result<PathBuf> {
    let mut entries = std::fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    if entries.len() == 1 && entries[0].file_type()?.is_dir() {
        return Ok(entries.remove(0).path());
    }
    Ok(dir.to_path_buf())
}

fn extract_zip(bytes: &[u8], dest: &Path) -> Result<usize, ExtractionError> {
    let mut zip = ZipArchive::new(Cursor::new(bytes))?;
    for i in 0..zip.len() {
        let mut file = zip.by_index(i)?;
        let rel = file
            .enclosed_name()
            .ok_or_else(|| ExtractionError::PathTraversal {
                path: file.name().to_string(),
            })?;
        let out = dest.join(&rel);
        if file.is_dir() {
            std::fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        #[cfg(unix)]
        {
            if file.is_symlink() {
                let mut target = String::new();
                file.read_to_string(&mut target)?;
                validate_link_target(&rel, Path::new(&target))?;
                if out.symlink_metadata().is_ok() {
                    std::fs::remove_file(&out)?;
                }
                std::os::unix::fs::symlink(&target, &out)?;
                continue;
            }
        }
        let mut writer = File::create(&out)?;
        std::io::copy(&mut file, &mut writer)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                std::fs::set_permissions(&out, std::fs::Permissions::from_mode(mode & 0o777))?;
            }
        }
    }
    Ok(zip.len())
}

fn extract_tar<R: Read>(reader: R, dest: &Path) -> Result<usize, ExtractionError> {
    let mut archive = tar::Archive::new(reader);
    let mut count = 0;
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        validate_entry_path(&path)?;
        if entry.header().entry_type().is_symlink() {
            let target = entry.link_name()?.ok_or_else(|| ExtractionError::PathTraversal {
                path: format!("{} -> ?", path.display()),
            })?;
            validate_link_target(&path, &target)?;
        }
        entry.unpack_in(dest)?;
        count += 1;
    }
    Ok(count)
}

/// Rejects absolute paths and `..` components.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

/// A symlink at `link` (relative to the destination) may only point at
/// something inside the destination.
fn validate_link_target(link: &Path, target: &Path) -> Result<(), ExtractionError> {
    let traversal = || ExtractionError::PathTraversal {
        path: format!("{} -> {}", link.display(), target.display()),
    };
    let mut depth = link.parent().map_or(0, |p| p.components().count());
    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => depth = depth.checked_sub(1).ok_or_else(traversal)?,
            Component::RootDir | Component::Prefix(_) => return Err(traversal()),
        }
    }
    Ok(())
}
