use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use brewlet::*;

const TOOL_SCRIPT: &[u8] = b"#!/bin/bash\n\
echo \"usage: tool [options] $*\"\n\
echo \"tool: warning on stderr\" >&2\n\
exit 3\n";

/// Shims in these tests find the prefix through `$TOOL_PREFIX`.
const PREFIX_COMMAND: &str = "printf %s \"$TOOL_PREFIX\"";

fn tool_zip() -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("tool", SimpleFileOptions::default().unix_permissions(0o755))
        .unwrap();
    writer.write_all(TOOL_SCRIPT).unwrap();
    writer
        .start_file("share/data.txt", SimpleFileOptions::default().unix_permissions(0o644))
        .unwrap();
    writer.write_all(b"payload").unwrap();
    writer.finish().unwrap().into_inner()
}

fn tool_tar_gz() -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let mut header = tar::Header::new_gnu();
    header.set_size(TOOL_SCRIPT.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();
    builder.append_data(&mut header, "tool-2.0.0/tool", TOOL_SCRIPT).unwrap();
    builder.into_inner().unwrap().finish().unwrap()
}

fn write_archive(dir: &Path, file_name: &str, bytes: &[u8]) -> String {
    let path = dir.join(file_name);
    std::fs::write(&path, bytes).unwrap();
    format!("file://{}", path.display())
}

fn formula(url: &str, sha256: &str, extra: &str) -> Formula {
    Formula::parse(&format!(
        r#"
name = "tool"
desc = "A fixture tool"
homepage = "https://example.com/tool"
version = "1.0.0"
url = "{url}"
sha256 = "{sha256}"
license = "MIT"
{extra}
"#
    ))
    .unwrap()
}

fn setup() -> (TempDir, Formula) {
    let dir = TempDir::new().unwrap();
    let bytes = tool_zip();
    let url = write_archive(dir.path(), "tool.zip", &bytes);
    let formula = formula(&url, &sha256_hex(&bytes), "");
    (dir, formula)
}

fn options() -> InstallOptions {
    InstallOptions {
        prefix_command: PREFIX_COMMAND.to_string(),
        cache_dir: None,
    }
}

/// Every path under `root` with its kind, permission bits and file content.
fn snapshot(root: &Path) -> Vec<(PathBuf, bool, u32, Vec<u8>)> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| {
            let entry = entry.unwrap();
            let meta = entry.metadata().unwrap();
            let content = if meta.is_file() {
                std::fs::read(entry.path()).unwrap()
            } else {
                Vec::new()
            };
            (
                entry.path().strip_prefix(root).unwrap().to_path_buf(),
                meta.is_dir(),
                mode(&meta),
                content,
            )
        })
        .collect()
}

#[cfg(unix)]
fn mode(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode(_meta: &std::fs::Metadata) -> u32 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_lays_out_prefix() {
        let (dir, formula) = setup();
        let prefix = Prefix::new(dir.path().join("prefix"));
        let installed = install(&formula, &prefix, &options()).unwrap();

        assert_eq!(installed.libexec, dir.path().join("prefix/opt/tool/libexec"));
        assert_eq!(installed.shim, dir.path().join("prefix/bin/tool"));
        assert_eq!(std::fs::read(&installed.executable).unwrap(), TOOL_SCRIPT);
        assert_eq!(
            std::fs::read(installed.libexec.join("share/data.txt")).unwrap(),
            b"payload"
        );
        assert_eq!(
            std::fs::read_to_string(&installed.shim).unwrap(),
            render_shim("tool", PREFIX_COMMAND)
        );
        let receipt = Receipt::load(prefix.receipt_path("tool")).unwrap();
        assert_eq!(receipt.version, "1.0.0");
        assert_eq!(receipt.sha256, installed.sha256);
        #[cfg(unix)]
        assert_eq!(mode(&std::fs::metadata(&installed.shim).unwrap()), 0o755);
    }

    #[test]
    fn test_checksum_mismatch_aborts_before_shim() {
        let (dir, good) = setup();
        let url = good.source().url;
        let bad = formula(&url, &sha256_hex(b"something else"), "");
        let prefix = Prefix::new(dir.path().join("prefix"));

        let err = install(&bad, &prefix, &options()).unwrap_err();
        assert!(matches!(err, InstallError::Integrity { .. }));
        assert!(!prefix.shim_path("tool").exists());
        assert!(!prefix.libexec_dir("tool").exists());
    }

    #[test]
    fn test_checksum_mismatch_keeps_previous_install() {
        let (dir, good) = setup();
        let prefix = Prefix::new(dir.path().join("prefix"));
        install(&good, &prefix, &options()).unwrap();
        let before = snapshot(prefix.root());

        let bad = formula(&good.source().url, &"0".repeat(64), "");
        assert!(install(&bad, &prefix, &options()).is_err());
        assert_eq!(snapshot(prefix.root()), before);
    }

    #[test]
    fn test_reinstall_is_byte_identical() {
        let (dir, formula) = setup();
        let prefix = Prefix::new(dir.path().join("prefix"));
        install(&formula, &prefix, &options()).unwrap();
        let first = snapshot(prefix.root());
        install(&formula, &prefix, &options()).unwrap();
        assert_eq!(snapshot(prefix.root()), first);
    }

    #[test]
    fn test_uninstall_removes_exactly_package_and_shim() {
        let (dir, formula) = setup();
        let prefix = Prefix::new(dir.path().join("prefix"));
        prefix.ensure_dirs().unwrap();
        std::fs::write(prefix.bin_dir().join("other"), b"unrelated").unwrap();
        let before = snapshot(prefix.root());

        install(&formula, &prefix, &options()).unwrap();
        uninstall("tool", &prefix).unwrap();

        assert_eq!(snapshot(prefix.root()), before);
        assert!(matches!(
            uninstall("tool", &prefix),
            Err(InstallError::NotInstalled(_))
        ));
    }

    #[test]
    fn test_shim_path_conflict_leaves_nothing_registered() {
        let (dir, formula) = setup();
        let prefix = Prefix::new(dir.path().join("prefix"));
        std::fs::create_dir_all(prefix.shim_path("tool")).unwrap();

        let err = install(&formula, &prefix, &options()).unwrap_err();
        assert!(matches!(err, InstallError::Filesystem { .. }));
        assert!(!is_installed("tool", &prefix));
        assert!(installed_packages(&prefix).unwrap().is_empty());
        assert!(!prefix.package_dir("tool").exists());
    }

    #[test]
    fn test_shim_path_conflict_keeps_previous_install() {
        let (dir, formula) = setup();
        let prefix = Prefix::new(dir.path().join("prefix"));
        install(&formula, &prefix, &options()).unwrap();
        std::fs::remove_file(prefix.shim_path("tool")).unwrap();
        std::fs::create_dir(prefix.shim_path("tool")).unwrap();
        let before = snapshot(prefix.root());

        assert!(install(&formula, &prefix, &options()).is_err());
        assert_eq!(snapshot(prefix.root()), before);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_at_shim_path_is_replaced_not_followed() {
        let (dir, formula) = setup();
        let prefix = Prefix::new(dir.path().join("prefix"));
        let outside = dir.path().join("precious.txt");
        std::fs::write(&outside, b"keep me").unwrap();
        prefix.ensure_dirs().unwrap();
        std::os::unix::fs::symlink(&outside, prefix.shim_path("tool")).unwrap();

        let installed = install(&formula, &prefix, &options()).unwrap();

        assert_eq!(std::fs::read(&outside).unwrap(), b"keep me");
        assert_eq!(mode(&std::fs::metadata(&outside).unwrap()) & 0o111, 0);
        let meta = installed.shim.symlink_metadata().unwrap();
        assert!(meta.file_type().is_file());
        assert_eq!(
            std::fs::read_to_string(&installed.shim).unwrap(),
            render_shim("tool", PREFIX_COMMAND)
        );
    }

    #[test]
    fn test_tar_gz_with_platform_override() {
        let dir = TempDir::new().unwrap();
        let bytes = tool_tar_gz();
        let url = write_archive(dir.path(), "tool-2.0.0.tar.gz", &bytes);
        let formula = formula(
            "https://invalid.example/never-fetched.zip",
            &"f".repeat(64),
            &format!(
                "[platforms.{}]\nurl = \"{url}\"\nsha256 = \"{}\"\n",
                current_os(),
                sha256_hex(&bytes)
            ),
        );
        let prefix = Prefix::new(dir.path().join("prefix"));
        let installed = install(&formula, &prefix, &options()).unwrap();
        assert_eq!(std::fs::read(installed.executable).unwrap(), TOOL_SCRIPT);
    }

    #[test]
    fn test_corrupt_archive_is_extraction_error() {
        let dir = TempDir::new().unwrap();
        let mut bytes = tool_zip();
        bytes.truncate(bytes.len() / 2);
        let url = write_archive(dir.path(), "tool.zip", &bytes);
        let formula = formula(&url, &sha256_hex(&bytes), "");
        let prefix = Prefix::new(dir.path().join("prefix"));
        let err = install(&formula, &prefix, &options()).unwrap_err();
        assert!(matches!(err, InstallError::Extraction { .. }));
        assert!(!prefix.shim_path("tool").exists());
    }

    #[test]
    fn test_missing_archive_is_network_error() {
        let dir = TempDir::new().unwrap();
        let url = format!("file://{}", dir.path().join("gone.zip").display());
        let formula = formula(&url, &"a".repeat(64), "");
        let prefix = Prefix::new(dir.path().join("prefix"));
        assert!(matches!(
            install(&formula, &prefix, &options()),
            Err(InstallError::Network { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_shim_is_transparent() {
        use std::process::Command;
        let (dir, formula) = setup();
        let prefix = Prefix::new(dir.path().join("prefix"));
        let installed = install(&formula, &prefix, &options()).unwrap();

        let direct = Command::new(&installed.executable).arg("--help").output().unwrap();
        let shimmed = Command::new(&installed.shim)
            .arg("--help")
            .env("TOOL_PREFIX", prefix.root())
            .output()
            .unwrap();

        assert_eq!(shimmed.stdout, direct.stdout);
        assert_eq!(shimmed.stderr, direct.stderr);
        assert_eq!(shimmed.status.code(), direct.status.code());
        assert_eq!(direct.status.code(), Some(3));
        assert_eq!(String::from_utf8_lossy(&direct.stdout), "usage: tool [options] --help\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_shim_follows_relocated_prefix() {
        use std::process::Command;
        let (dir, formula) = setup();
        let old_root = dir.path().join("old");
        let new_root = dir.path().join("new");
        install(&formula, &Prefix::new(&old_root), &options()).unwrap();

        std::fs::rename(&old_root, &new_root).unwrap();
        let moved = Prefix::new(&new_root);
        let output = Command::new(moved.shim_path("tool"))
            .args(["a b", "c"])
            .env("TOOL_PREFIX", moved.root())
            .output()
            .unwrap();

        assert_eq!(output.status.code(), Some(3));
        assert_eq!(String::from_utf8_lossy(&output.stdout), "usage: tool [options] a b c\n");
    }
}
