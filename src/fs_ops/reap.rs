//! Empty-directory cleanup after a transfer.
//!
//! Removes empty directories under the source deepest-first, retrying a few
//! times because handles on just-moved files can linger (antivirus, indexers).
//! The source root itself is left for the link publisher, unless stray entries
//! remain and forced removal is permitted.

use std::fs;
use std::path::Path;
use std::thread::sleep;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::retry::RetryPolicy;
use super::tree::has_files;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Directories removed by the deepest-first passes.
    pub removed_dirs: usize,
    /// The root had to be deleted recursively.
    pub forced: bool,
    /// Entries are still present under the root.
    pub remaining: bool,
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut rd| rd.next().is_none())
        .unwrap_or(false)
}

/// One deepest-first pass. Returns the number of directories removed.
fn remove_empty_descendants(root: &Path) -> usize {
    let mut removed = 0;
    let dirs = WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir());
    for d in dirs {
        match fs::remove_dir(d.path()) {
            Ok(()) => {
                removed += 1;
                debug!(path = %d.path().display(), "removed empty dir");
            }
            // Non-empty or still held open; a later pass may succeed.
            Err(e) => debug!(path = %d.path().display(), error = %e, "dir not removed"),
        }
    }
    removed
}

/// Clean up `root` after a successful transfer.
///
/// `allow_force` permits `remove_dir_all` on the root when files (not just
/// directories) are still inside after all attempts. Directory-only remnants
/// are always force-removed as a last resort.
pub fn reap_empty_dirs(root: &Path, policy: &RetryPolicy, allow_force: bool) -> ReapReport {
    let mut report = ReapReport::default();
    if !root.exists() {
        return report;
    }

    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        report.removed_dirs += remove_empty_descendants(root);
        if is_empty_dir(root) {
            info!(root = %root.display(), removed = report.removed_dirs, "source tree emptied");
            return report;
        }
        warn!(attempt, max = attempts, root = %root.display(), "source not empty yet");
        if attempt < attempts {
            sleep(policy.delay);
        }
    }

    let stray_files = has_files(root);
    if stray_files && !allow_force {
        warn!(root = %root.display(), "files remain in source; leaving them in place");
        report.remaining = true;
        return report;
    }

    warn!(root = %root.display(), stray_files, "forcing recursive removal of source remnants");
    match fs::remove_dir_all(root) {
        Ok(()) => report.forced = true,
        Err(e) => {
            warn!(root = %root.display(), error = %e, "forced removal failed");
            report.remaining = true;
        }
    }
    report
}
