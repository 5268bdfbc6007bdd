//! External bulk-copy tools.
//!
//! The engine treats a tool as an opaque process it can start, poll and
//! terminate. Progress is inferred from side effects (the tool's log file, or
//! the growing destination tree), never from the tool's output stream.

mod robocopy;
mod rsync;

pub use robocopy::{Robocopy, classify_log};
pub use rsync::Rsync;

use std::io;
use std::path::PathBuf;
use std::process::{Child, ExitStatus};

use crate::fs_ops::RetryPolicy;
use crate::progress::FileCounts;

/// Upper bound on tool worker threads regardless of core count.
pub const MAX_TOOL_THREADS: usize = 128;

/// Everything a tool needs to run one relocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolJob {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Where the tool writes its log (robocopy) or its stderr (rsync).
    pub log_path: PathBuf,
    pub retry: RetryPolicy,
    pub threads: usize,
}

/// One observation of a running tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolPoll {
    pub counts: FileCounts,
    /// Set once the process has exited. `-1` when killed by a signal.
    pub exit: Option<i32>,
}

/// A launched tool process.
pub trait ToolRun: Send {
    fn poll(&mut self) -> io::Result<ToolPoll>;
    fn terminate(&mut self) -> io::Result<()>;
}

/// A tool that can move a tree.
pub trait BulkCopyTool: Send + Sync {
    fn name(&self) -> &str;
    fn launch(&self, job: &ToolJob) -> io::Result<Box<dyn ToolRun>>;
    /// Whether `code` means the transfer failed, per the tool's own convention.
    fn is_failure(&self, code: i32) -> bool;
}

/// Robocopy on Windows, rsync everywhere else.
pub fn default_tool() -> Box<dyn BulkCopyTool> {
    #[cfg(windows)]
    {
        Box::new(Robocopy)
    }
    #[cfg(not(windows))]
    {
        Box::new(Rsync)
    }
}

/// Clamp a requested thread count to `1..=min(4 × cores, 128)`.
/// `None` picks the upper bound.
pub fn thread_count(requested: Option<usize>) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let cap = (cores * 4).min(MAX_TOOL_THREADS);
    requested.unwrap_or(cap).clamp(1, cap)
}

pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Kill and reap a child; a child that already exited is not an error.
pub(crate) fn kill_child(child: &mut Child) -> io::Result<()> {
    match child.kill() {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::InvalidInput => {}
        Err(e) => return Err(e),
    }
    child.wait().map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_count_is_bounded() {
        assert_eq!(thread_count(Some(0)), 1);
        assert!(thread_count(Some(10_000)) <= MAX_TOOL_THREADS);
        assert!(thread_count(None) >= 1);
        assert_eq!(thread_count(Some(1)), 1);
    }

    #[test]
    fn failure_thresholds() {
        assert!(!Robocopy.is_failure(0));
        assert!(!Robocopy.is_failure(7));
        assert!(Robocopy.is_failure(8));
        assert!(Robocopy.is_failure(16));

        assert!(!Rsync.is_failure(0));
        assert!(!Rsync.is_failure(24));
        assert!(Rsync.is_failure(23));
        assert!(Rsync.is_failure(-1));
    }
}
