//! Disk space checks.
//! Sums the size of the source tree and compares it to the space available at
//! the destination before anything is touched. Best-effort: the numbers can be
//! stale by the time the transfer runs.

use std::io;
use std::path::Path;
use tracing::{debug, error};
use walkdir::WalkDir;

use crate::errors::RelocateError;

/// Size and file count of a tree, as seen by one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeScan {
    pub files: u64,
    pub bytes: u64,
}

/// Signature of a free-space probe; swapped out in tests.
pub type FreeSpaceFn = fn(&Path) -> io::Result<u64>;

/// Walk `root` and total every non-directory entry. Entries that vanish or
/// cannot be stat'ed mid-walk are skipped.
pub fn scan_tree(root: &Path) -> TreeScan {
    let mut scan = TreeScan::default();
    for entry in WalkDir::new(root).min_depth(1).into_iter().filter_map(Result::ok) {
        if entry.file_type().is_dir() {
            continue;
        }
        match entry.metadata() {
            Ok(meta) => {
                scan.files += 1;
                scan.bytes = scan.bytes.saturating_add(meta.len());
            }
            Err(e) => debug!(path = %entry.path().display(), error = %e, "skipping entry during size scan"),
        }
    }
    scan
}

/// Free bytes available to this user at `path`, or at its nearest existing ancestor.
pub fn available_space(path: &Path) -> io::Result<u64> {
    let mut probe = path;
    while !probe.exists() {
        match probe.parent() {
            Some(parent) => probe = parent,
            None => break,
        }
    }
    fs2::available_space(probe)
}

/// Reject when `available < required`.
pub fn check_space(dest: &Path, required: u64, available: u64) -> Result<(), RelocateError> {
    if available < required {
        error!(
            dest = %dest.display(),
            required = %format_bytes(required),
            available = %format_bytes(available),
            "not enough free space at destination"
        );
        return Err(RelocateError::InsufficientSpace {
            required,
            available,
            dest: dest.to_path_buf(),
        });
    }
    Ok(())
}

pub fn format_bytes(n: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    let f = n as f64;
    if f >= GB {
        format!("{:.2} GiB", f / GB)
    } else if f >= MB {
        format!("{:.1} MiB", f / MB)
    } else if f >= KB {
        format!("{:.1} KiB", f / KB)
    } else {
        format!("{n} B")
    }
}
