//! Unix implementations of platform helpers.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;
use std::process::Command;

use crate::audit::ListingDialect;

/// Listing format produced by [`listing_command`].
pub const LISTING_DIALECT: ListingDialect = ListingDialect::LongRecursive;

/// Open log file for appending; set 0600 only when creating a new file.
/// If the file already exists, we preserve its existing permissions to avoid
/// clobbering administrator adjustments (e.g. group-readable for log shipping).
pub fn open_log_file_secure_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let existed = path.exists();
    let f = OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o600) // applies on create
        .open(path)?;
    if !existed {
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
    Ok(f)
}

/// Atomically write `contents` to `path` with 0600 permissions:
/// temp sibling (O_EXCL, 0600) + fsync + rename + fsync parent dir.
/// The temp file is removed best-effort if the rename fails.
pub fn write_config_secure_new_0600(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "config path has no parent"))?;
    fs::create_dir_all(parent).with_context(|| format!("create parent '{}'", parent.display()))?;

    let tmp = super::tmp_sibling_name(path, "config");
    let mut f = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(&tmp)
        .with_context(|| format!("create temp '{}'", tmp.display()))?;
    f.write_all(contents).context("write temp")?;
    f.sync_all().context("fsync temp")?;
    drop(f);

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e)
            .with_context(|| format!("rename '{}' -> '{}'", tmp.display(), path.display()));
    }

    let dir_file =
        File::open(parent).with_context(|| format!("open dir '{}'", parent.display()))?;
    dir_file.sync_all().context("fsync parent dir")?;
    Ok(())
}

/// POSIX chmod 0700 for directories.
pub fn set_dir_mode_0700(path: &Path) -> io::Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
}

/// POSIX chmod 0600 for files.
pub fn set_file_mode_0600(path: &Path) -> io::Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

/// Raw errno values meaning "another process holds this file right now".
pub fn is_busy_os_error(code: i32) -> bool {
    code == libc::EBUSY || code == libc::ETXTBSY
}

/// EXDEV: rename across filesystems.
pub fn is_cross_device_os_error(code: i32) -> bool {
    code == libc::EXDEV
}

/// `ln -s -- TARGET LINK`
pub fn link_command(link: &Path, target: &Path) -> Command {
    let mut cmd = Command::new("ln");
    cmd.arg("-s").arg("--").arg(target).arg(link);
    cmd
}

/// `ls -lR -- ROOT` in the C locale so headers and dates parse predictably.
pub fn listing_command(root: &Path) -> Command {
    let mut cmd = Command::new("ls");
    cmd.arg("-lR").arg("--").arg(root).env("LC_ALL", "C");
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn preserve_existing_log_file_mode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        fs::write(&path, b"hello").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();
        let _f = open_log_file_secure_append(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640, "existing permissions should be preserved");
    }

    #[test]
    fn new_log_file_gets_0600() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("new_log.txt");
        let _f = open_log_file_secure_append(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn config_write_replaces_and_leaves_no_temp() {
        let dir = tempdir().unwrap();
        let cfg = dir.path().join("config.xml");
        write_config_secure_new_0600(&cfg, b"<a/>").unwrap();
        write_config_secure_new_0600(&cfg, b"<b/>").unwrap();
        assert_eq!(fs::read(&cfg).unwrap(), b"<b/>");
        let mode = fs::metadata(&cfg).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        for entry in fs::read_dir(dir.path()).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().into_owned();
            assert!(!name.starts_with(".relocator.config.tmp."), "leftover temp: {name}");
        }
    }

    #[test]
    fn busy_and_cross_device_codes() {
        assert!(is_busy_os_error(libc::EBUSY));
        assert!(is_busy_os_error(libc::ETXTBSY));
        assert!(!is_busy_os_error(libc::EACCES));
        assert!(is_cross_device_os_error(libc::EXDEV));
        assert!(!is_cross_device_os_error(libc::ENOENT));
    }
}
