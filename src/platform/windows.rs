//! Windows implementations of platform helpers (best-effort, no ACL management).
//!
//! Notes:
//! - Windows lacks POSIX mode semantics; the mode setters are no-ops.
//! - Links and listings go through `cmd` builtins (`mklink`, `dir`).

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::process::Command;

use crate::audit::ListingDialect;

/// Listing format produced by [`listing_command`].
pub const LISTING_DIALECT: ListingDialect = ListingDialect::DirCommand;

const ERROR_ACCESS_DENIED: i32 = 5;
const ERROR_NOT_SAME_DEVICE: i32 = 17;
const ERROR_SHARING_VIOLATION: i32 = 32;
const ERROR_LOCK_VIOLATION: i32 = 33;

/// Open log file for appending (no symlink defense available via std on Windows).
pub fn open_log_file_secure_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Write config via a unique temp sibling + rename, replacing any existing file.
pub fn write_config_secure_new_0600(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "config path has no parent"))?;
    fs::create_dir_all(parent).with_context(|| format!("create parent '{}'", parent.display()))?;

    let tmp = super::tmp_sibling_name(path, "config");
    let mut f = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp)
        .with_context(|| format!("create temp '{}'", tmp.display()))?;
    f.write_all(contents).context("write temp")?;
    f.sync_all().context("fsync temp")?;
    drop(f);

    // rename does not overwrite on Windows
    if path.exists() {
        let _ = fs::remove_file(path);
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e)
            .with_context(|| format!("rename '{}' -> '{}'", tmp.display(), path.display()));
    }
    Ok(())
}

pub fn set_dir_mode_0700(_path: &Path) -> io::Result<()> {
    Ok(())
}

pub fn set_file_mode_0600(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Sharing/lock violations, plus access denied which Windows reports for
/// files held open by another process during a move.
pub fn is_busy_os_error(code: i32) -> bool {
    matches!(
        code,
        ERROR_SHARING_VIOLATION | ERROR_LOCK_VIOLATION | ERROR_ACCESS_DENIED
    )
}

pub fn is_cross_device_os_error(code: i32) -> bool {
    code == ERROR_NOT_SAME_DEVICE
}

/// `cmd /C mklink /D LINK TARGET`
pub fn link_command(link: &Path, target: &Path) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg("mklink").arg("/D").arg(link).arg(target);
    cmd
}

/// `cmd /C dir ROOT /AL /S`: every reparse-point entry, recursively.
pub fn listing_command(root: &Path) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg("dir").arg(root).arg("/AL").arg("/S");
    cmd
}
