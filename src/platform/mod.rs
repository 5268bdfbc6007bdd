//! Platform-specific helpers.
//! This module hides OS differences (Unix/Windows) behind a uniform API so
//! the engine can stay platform-agnostic: secure file creation, error-code
//! classification, and the native commands used for links and listings.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(unix)]
mod unix;
#[cfg(not(unix))]
mod windows;

#[cfg(unix)]
pub use unix::{
    LISTING_DIALECT, is_busy_os_error, is_cross_device_os_error, link_command, listing_command,
    open_log_file_secure_append, set_dir_mode_0700, set_file_mode_0600,
    write_config_secure_new_0600,
};

#[cfg(not(unix))]
pub use windows::{
    LISTING_DIALECT, is_busy_os_error, is_cross_device_os_error, link_command, listing_command,
    open_log_file_secure_append, set_dir_mode_0700, set_file_mode_0600,
    write_config_secure_new_0600,
};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique hidden sibling name used for atomic writes and cross-device copies.
/// Pattern: .relocator.<tag>.tmp.<pid>.<nanos>.<seq>
pub(crate) fn tmp_sibling_name(target: &Path, tag: &str) -> PathBuf {
    let pid = std::process::id();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = format!(".relocator.{tag}.tmp.{pid}.{nanos}.{seq}");
    target.parent().unwrap_or_else(|| Path::new(".")).join(name)
}
