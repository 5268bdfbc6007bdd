//! Filesystem operations used by the engine: tree scans, the free-space
//! guard, the retrying single-file mover and the empty-directory reaper.

mod helpers;
mod reap;
mod retry;
mod space;
mod tree;

pub use helpers::{
    describe_io_error, io_error_with_help, io_error_with_help_io, is_busy, is_cross_device,
};
pub use reap::{ReapReport, reap_empty_dirs};
pub use retry::{FileMove, RetryPolicy, move_file, retry_busy};
pub use space::{FreeSpaceFn, TreeScan, available_space, check_space, format_bytes, scan_tree};
pub use tree::{count_files, has_files, list_files};
