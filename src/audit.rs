//! Volume-wide link audit.
//!
//! Runs the platform's recursive listing command and reads its output line
//! by line. Header lines set the current directory; link lines become
//! entries unless they are junctions or sit inside a recycle bin / trash
//! folder.

use std::fmt;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::thread;
use tracing::{debug, info, warn};

use crate::errors::RelocateError;
use crate::platform::{LISTING_DIALECT, listing_command};

const TRASH_MARKERS: &[&str] = &["$recycle.bin", "/.trash", "/.local/share/trash"];

/// Output format of the listing command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingDialect {
    /// `ls -lR`: `dir:` headers, `lrwxrwxrwx ... name -> target` entries.
    LongRecursive,
    /// `dir /AL /S`: ` Directory of X` headers, `<SYMLINKD> name [target]` entries.
    DirCommand,
}

impl ListingDialect {
    fn separator(self) -> char {
        match self {
            ListingDialect::LongRecursive => '/',
            ListingDialect::DirCommand => '\\',
        }
    }

    /// Directory named by a header line. `ls -lR` only prints a header as the
    /// first line or right after a blank line, so `block_start` must be set.
    fn header<'a>(self, line: &'a str, block_start: bool) -> Option<&'a str> {
        match self {
            ListingDialect::LongRecursive => {
                let t = line.trim_end();
                (block_start
                    && t.ends_with(':')
                    && t.len() > 1
                    && !line.starts_with(char::is_whitespace)
                    && !starts_with_mode(line))
                .then(|| &t[..t.len() - 1])
            }
            ListingDialect::DirCommand => line.trim().strip_prefix("Directory of ").map(str::trim),
        }
    }

    fn is_link_line(self, line: &str) -> bool {
        match self {
            ListingDialect::LongRecursive => line.starts_with('l') && line.contains(" -> "),
            ListingDialect::DirCommand => line.contains("<SYMLINK"),
        }
    }

    /// `(name, target)` from a link line.
    fn split_entry(self, line: &str) -> Option<(String, Option<String>)> {
        match self {
            ListingDialect::LongRecursive => {
                let rest = skip_fields(line, 8)?;
                match rest.split_once(" -> ") {
                    Some((name, target)) => Some((name.to_string(), Some(target.to_string()))),
                    None => Some((rest.to_string(), None)),
                }
            }
            ListingDialect::DirCommand => {
                let after = &line[line.find('>')? + 1..];
                let after = after.trim();
                if let Some(open) = after.rfind(" [")
                    && after.ends_with(']')
                {
                    let name = after[..open].trim().to_string();
                    let target = after[open + 2..after.len() - 1].to_string();
                    return Some((name, Some(target)));
                }
                Some((after.to_string(), None))
            }
        }
    }

    /// Whether a failed listing only complained about unreadable or vanished subpaths.
    fn is_benign_failure(self, code: i32, stderr: &str) -> bool {
        match self {
            ListingDialect::LongRecursive => {
                code == 1
                    && (stderr.contains("Permission denied")
                        || stderr.contains("No such file or directory"))
            }
            ListingDialect::DirCommand => stderr.contains("File Not Found"),
        }
    }
}

/// `drwxr-xr-x`, `lrwxrwxrwx`, `-rw-r--r--` and friends.
fn starts_with_mode(line: &str) -> bool {
    let b = line.as_bytes();
    b.len() >= 10
        && b"-dlcbpsD".contains(&b[0])
        && b[1..10].iter().all(|c| b"rwxsStTl-".contains(c))
}

/// Skip `n` whitespace-separated fields, returning the remainder verbatim.
fn skip_fields(line: &str, n: usize) -> Option<&str> {
    let mut rest = line.trim_start();
    for _ in 0..n {
        let end = rest.find(char::is_whitespace)?;
        rest = rest[end..].trim_start();
    }
    (!rest.is_empty()).then_some(rest)
}

fn in_trash(dir: &str) -> bool {
    let lower = dir.to_lowercase().replace('\\', "/");
    TRASH_MARKERS.iter().any(|m| lower.contains(m))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymlinkAuditEntry {
    pub path: PathBuf,
    pub target: Option<PathBuf>,
}

impl fmt::Display for SymlinkAuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(t) => write!(f, "{} -> {}", self.path.display(), t.display()),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditReport {
    pub root: PathBuf,
    pub entries: Vec<SymlinkAuditEntry>,
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return f.write_str("No links found.");
        }
        for e in &self.entries {
            writeln!(f, "{e}")?;
        }
        write!(f, "{} link(s) found under {}", self.entries.len(), self.root.display())
    }
}

/// Parse listing output, calling `on_entry` as each link is accepted.
pub fn scan_listing<R: BufRead>(
    mut reader: R,
    dialect: ListingDialect,
    mut on_entry: impl FnMut(&SymlinkAuditEntry),
) -> io::Result<Vec<SymlinkAuditEntry>> {
    let mut entries = Vec::new();
    let mut current_dir = String::new();
    let mut block_start = true;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&buf);
        let line = text.trim_end_matches(['\r', '\n']);
        let at_block_start = block_start;
        block_start = line.trim().is_empty();

        if let Some(dir) = dialect.header(line, at_block_start) {
            current_dir = dir.to_string();
            continue;
        }
        if !dialect.is_link_line(line) || line.contains("JUNCTION") {
            continue;
        }
        if in_trash(&current_dir) {
            debug!(dir = %current_dir, "skipping link in trash");
            continue;
        }
        let Some((name, target)) = dialect.split_entry(line) else {
            continue;
        };
        let path = if current_dir.is_empty() {
            PathBuf::from(name)
        } else {
            let sep = dialect.separator();
            let base = current_dir.trim_end_matches(sep);
            PathBuf::from(format!("{base}{sep}{name}"))
        };
        let entry = SymlinkAuditEntry {
            path,
            target: target.map(PathBuf::from),
        };
        on_entry(&entry);
        entries.push(entry);
    }
    Ok(entries)
}

/// List every link under `root`, reporting each through `on_entry` as it is found.
pub fn audit_volume(
    root: &Path,
    on_entry: impl FnMut(&SymlinkAuditEntry),
) -> Result<AuditReport, RelocateError> {
    if !root.is_dir() {
        return Err(RelocateError::invalid_path(root, "audit root is not a directory"));
    }
    info!(root = %root.display(), "scanning for links");

    let mut child = listing_command(root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| RelocateError::io("start listing command", &e))?;

    let stderr_reader = child.stderr.take().map(|mut err| {
        thread::spawn(move || {
            let mut s = String::new();
            let _ = err.read_to_string(&mut s);
            s
        })
    });

    let scanned = match child.stdout.take() {
        Some(out) => scan_listing(BufReader::new(out), LISTING_DIALECT, on_entry),
        None => Ok(Vec::new()),
    };
    let status = child
        .wait()
        .map_err(|e| RelocateError::io("wait for listing command", &e))?;
    let stderr = stderr_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    let entries = scanned.map_err(|e| RelocateError::io("read listing output", &e))?;

    if !status.success() {
        let code = status.code().unwrap_or(-1);
        if LISTING_DIALECT.is_benign_failure(code, &stderr) {
            warn!(code, stderr = %stderr.trim(), "listing reported unreadable paths; results may be partial");
        } else {
            return Err(RelocateError::AuditFailed {
                root: root.to_path_buf(),
                code,
                stderr: stderr.trim().to_string(),
            });
        }
    }

    info!(root = %root.display(), found = entries.len(), "link scan finished");
    Ok(AuditReport {
        root: root.to_path_buf(),
        entries,
    })
}
