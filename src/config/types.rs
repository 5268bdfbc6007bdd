//! Core configuration types.
//! - Config holds runtime settings with sensible defaults.
//! - LogLevel represents verbosity with simple parsing helpers.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::paths;
use super::{
    POLL_INTERVAL_MS_DEFAULT, REAP_ATTEMPTS_DEFAULT, REAP_DELAY_MS_DEFAULT,
    RETRY_ATTEMPTS_DEFAULT, RETRY_DELAY_MS_DEFAULT,
};
use crate::fs_ops::RetryPolicy;
use crate::plan::Strategy;

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Informational output (default)
    #[default]
    Normal,
    /// Per-file detail
    Info,
    /// Debug/trace
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" => Some(LogLevel::Normal),
            "info" | "verbose" | "detailed" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// Runtime configuration for the relocation engine and the CLI around it.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default destination root when the CLI does not name one
    pub destination_root: Option<PathBuf>,
    /// How files get moved
    pub strategy: Strategy,
    /// Console verbosity
    pub log_level: LogLevel,
    /// Optional path to a diagnostic log file
    pub log_file: Option<PathBuf>,
    /// Where per-execution transfer logs (and tool logs) are written
    pub transfer_log_dir: PathBuf,
    /// Per-file retry on "file busy"
    pub retry: RetryPolicy,
    /// Empty-directory cleanup retry
    pub reap: RetryPolicy,
    /// How often an external tool is polled for progress
    pub poll_interval: Duration,
    /// Thread count handed to the external tool (None = tool default)
    pub tool_threads: Option<usize>,
    /// If true, log intended actions but do not modify the filesystem
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            destination_root: None,
            strategy: Strategy::default(),
            log_level: LogLevel::Normal,
            log_file: paths::default_log_path().ok(),
            transfer_log_dir: paths::default_transfer_log_dir(),
            retry: RetryPolicy::new(
                RETRY_ATTEMPTS_DEFAULT,
                Duration::from_millis(RETRY_DELAY_MS_DEFAULT),
            ),
            reap: RetryPolicy::new(
                REAP_ATTEMPTS_DEFAULT,
                Duration::from_millis(REAP_DELAY_MS_DEFAULT),
            ),
            poll_interval: Duration::from_millis(POLL_INTERVAL_MS_DEFAULT),
            tool_threads: None,
            dry_run: false,
        }
    }
}

impl Config {
    /// Config suited to tests and embedding: logs go under `transfer_log_dir`,
    /// retries and polls are fast.
    pub fn with_log_dir(transfer_log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_file: None,
            transfer_log_dir: transfer_log_dir.into(),
            retry: RetryPolicy::new(3, Duration::from_millis(10)),
            reap: RetryPolicy::new(REAP_ATTEMPTS_DEFAULT, Duration::from_millis(10)),
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        }
    }
}
