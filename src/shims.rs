use std::path::Path;
use crate::error::{InstallError, Result};

/// Command a shim runs to find the prefix when no other is configured.
pub const DEFAULT_PREFIX_COMMAND: &str = "brewlet --prefix";

/// Renders the bash shim for package `name`.
///
/// The prefix is resolved by running `prefix_command` each time the shim is
/// invoked, so moving the prefix does not break installed shims. All
/// arguments are forwarded and the process is replaced via `exec`, so the
/// exit status is the wrapped binary's.
///
/// # Examples
///
/// ```
/// use brewlet::render_shim;
///
/// let shim = render_shim("open-codex", "brewlet --prefix");
/// assert!(shim.starts_with("#!/bin/bash\n"));
/// assert!(shim.contains(r#"exec "$BREWLET_PREFIX/opt/open-codex/libexec/open-codex" "$@""#));
/// ```
pub fn render_shim(name: &str, prefix_command: &str) -> String {
    format!(
        r#"#!/bin/bash
BREWLET_PREFIX="$({prefix_command})"
exec "$BREWLET_PREFIX/opt/{name}/libexec/{name}" "$@"
"#
    )
}

/// Checks that `shim_path` can hold a shim without touching anything else.
///
/// A regular file or a symlink may be replaced; anything else is a conflict.
pub fn check_shim_path(shim_path: &Path) -> Result<()> {
    let Ok(meta) = shim_path.symlink_metadata() else {
        return Ok(());
    };
    if meta.is_file() || meta.file_type().is_symlink() {
        return Ok(());
    }
    Err(InstallError::Filesystem {
        action: "write shim",
        path: shim_path.to_path_buf(),
        source: std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            if meta.is_dir() { "a directory is in the way" } else { "not a regular file" },
        ),
    })
}

/// Writes the shim for `name` to `shim_path` and marks it executable (`0755`).
///
/// An existing shim is overwritten, so repeated calls leave identical bytes
/// and permissions behind. A symlink at `shim_path` is replaced by the shim;
/// its target is never written.
///
/// # Errors
///
/// Returns [`InstallError::Filesystem`] if the path is occupied by a
/// directory, or the write or permission change fails.
pub fn create_shim<P: AsRef<Path>>(name: &str, prefix_command: &str, shim_path: P) -> Result<()> {
    let shim_path = shim_path.as_ref();
    check_shim_path(shim_path)?;
    if shim_path.symlink_metadata().is_ok_and(|meta| meta.file_type().is_symlink()) {
        std::fs::remove_file(shim_path).map_err(InstallError::fs("remove link", shim_path))?;
    }
    if let Some(parent) = shim_path.parent() {
        std::fs::create_dir_all(parent).map_err(InstallError::fs("create directory", parent))?;
    }
    std::fs::write(shim_path, render_shim(name, prefix_command))
        .map_err(InstallError::fs("write shim", shim_path))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(shim_path, std::fs::Permissions::from_mode(0o755))
            .map_err(InstallError::fs("set permissions on", shim_path))?;
    }
    Ok(())
}

/// Removes a shim. Returns whether a file was removed.
pub fn remove_shim<P: AsRef<Path>>(shim_path: P) -> Result<bool> {
    let shim_path = shim_path.as_ref();
    if shim_path.symlink_metadata().is_err() {
        return Ok(false);
    }
    std::fs::remove_file(shim_path).map_err(InstallError::fs("remove shim", shim_path))?;
    Ok(true)
}
