//! Default path helpers and symlink checks.
//! Determines OS-appropriate config/log paths and detects symlinked ancestors for safety.

use anyhow::{Result, anyhow};
use dirs::{config_dir, data_dir};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::CONFIG_ENV;

/// Config file location.
///
/// `$RELOCATOR_CONFIG` wins when set: a relative value is resolved against the
/// current directory, and a directory value means `<dir>/config.xml`.
/// Otherwise the OS config dir is used (`~/.config/relocator/config.xml` on Linux).
pub fn default_config_path() -> Result<PathBuf> {
    if let Some(raw) = env::var_os(CONFIG_ENV) {
        let mut p = PathBuf::from(raw);
        if p.is_relative() {
            p = env::current_dir()?.join(p);
        }
        if p.is_dir() {
            p.push("config.xml");
        }
        return Ok(p);
    }
    if let Some(mut base) = config_dir() {
        base.push("relocator");
        base.push("config.xml");
        return Ok(base);
    }
    env::var("HOME")
        .map(|h| {
            PathBuf::from(h)
                .join(".config")
                .join("relocator")
                .join("config.xml")
        })
        .map_err(|_| anyhow!("cannot determine a config directory (no config dir and no HOME)"))
}

/// Directory for relocator's own data (diagnostic log, transfer logs).
fn data_home() -> Option<PathBuf> {
    data_dir()
        .map(|d| d.join("relocator"))
        .or_else(|| {
            env::var("HOME").ok().map(|h| {
                PathBuf::from(h)
                    .join(".local")
                    .join("share")
                    .join("relocator")
            })
        })
}

/// OS-appropriate default diagnostic log file path.
pub fn default_log_path() -> Result<PathBuf> {
    data_home()
        .map(|d| d.join("relocator.log"))
        .ok_or_else(|| anyhow!("cannot determine a data directory for the log file"))
}

/// Default directory for per-execution transfer logs.
/// Falls back to the system temp dir when no data dir can be determined.
pub fn default_transfer_log_dir() -> PathBuf {
    data_home()
        .map(|d| d.join("transfers"))
        .unwrap_or_else(|| env::temp_dir().join("relocator-transfers"))
}

/// Return true if any existing ancestor of `path` is a symlink.
pub fn path_has_symlink_ancestor(path: &Path) -> io::Result<bool> {
    let mut p = path.parent();
    while let Some(anc) = p {
        if anc.exists() {
            let meta = fs::symlink_metadata(anc)?;
            if meta.file_type().is_symlink() {
                return Ok(true);
            }
        }
        p = anc.parent();
    }
    Ok(false)
}
