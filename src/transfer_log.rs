//! Per-execution transfer log.
//!
//! One timestamped file per execution, one line per file outcome, a closing
//! summary line. Kept after the run for post-mortem. Write failures are
//! logged and otherwise ignored; the log never fails a transfer.

use chrono::{DateTime, Local};
use std::fs::File;
use std::io::{self, LineWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::fs_ops::{format_bytes, io_error_with_help_io};
use crate::platform::open_log_file_secure_append;

const STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

#[derive(Debug)]
pub struct TransferLog {
    path: PathBuf,
    out: LineWriter<File>,
    write_failed: bool,
}

impl TransferLog {
    /// Create `relocation-YYYYMMDD-HHMMSS.log` in `dir`. A second execution in
    /// the same second gets a numeric suffix instead of sharing the file.
    pub fn create(dir: &Path, started: DateTime<Local>) -> io::Result<Self> {
        std::fs::create_dir_all(dir).map_err(io_error_with_help_io("create transfer log dir", dir))?;
        let stamp = started.format(STAMP_FORMAT).to_string();
        let mut path = dir.join(format!("relocation-{stamp}.log"));
        let mut n = 1;
        while path.exists() {
            path = dir.join(format!("relocation-{stamp}-{n}.log"));
            n += 1;
        }
        let file = open_log_file_secure_append(&path)
            .map_err(io_error_with_help_io("open transfer log", &path))?;
        let mut log = Self {
            path,
            out: LineWriter::new(file),
            write_failed: false,
        };
        log.line(format_args!(
            "# relocation started {}",
            started.format("%Y-%m-%d %H:%M:%S")
        ));
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path for a tool's own log next to this one: `relocation-<stamp>.<tool>.log`.
    pub fn sibling(&self, tool: &str) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "relocation".to_string());
        self.path.with_file_name(format!("{stem}.{tool}.log"))
    }

    pub fn moved(&mut self, src: &Path, dst: &Path, bytes: u64) {
        self.line(format_args!(
            "MOVED {} -> {} ({})",
            src.display(),
            dst.display(),
            format_bytes(bytes)
        ));
    }

    pub fn skipped(&mut self, src: &Path, dst: &Path) {
        self.line(format_args!(
            "SKIPPED {} -> {} (identical file already present)",
            src.display(),
            dst.display()
        ));
    }

    pub fn failed(&mut self, src: &Path, reason: &str) {
        self.line(format_args!("FAILED {} ({reason})", src.display()));
    }

    pub fn would_move(&mut self, src: &Path, dst: &Path, bytes: u64) {
        self.line(format_args!(
            "WOULD-MOVE {} -> {} ({})",
            src.display(),
            dst.display(),
            format_bytes(bytes)
        ));
    }

    /// Free-form comment line.
    pub fn note(&mut self, msg: &str) {
        self.line(format_args!("# {msg}"));
    }

    pub fn summary(&mut self, outcome: &str, text: &str) {
        self.line(format_args!("SUMMARY {outcome}: {text}"));
    }

    fn line(&mut self, args: std::fmt::Arguments<'_>) {
        let ts = Local::now().format("%H:%M:%S");
        if let Err(e) = writeln!(self.out, "{ts} {args}")
            && !self.write_failed
        {
            self.write_failed = true;
            warn!(path = %self.path.display(), error = %e, "cannot write transfer log");
        }
    }
}
