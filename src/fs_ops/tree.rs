//! Tree inspection helpers shared by the planner, movers and the reaper.
//! A "file" here is any non-directory entry (regular files and symlinks alike);
//! links inside the tree are never followed.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Every non-directory entry under `root`, in a stable (name-sorted) order.
/// Unreadable entries are skipped.
pub fn list_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| !e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect()
}

/// Number of non-directory entries under `root` (0 when `root` is missing).
pub fn count_files(root: &Path) -> u64 {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| !e.file_type().is_dir())
        .count() as u64
}

/// True if at least one non-directory entry exists under `root`.
pub fn has_files(root: &Path) -> bool {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .any(|e| !e.file_type().is_dir())
}
