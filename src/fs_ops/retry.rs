//! Single-file move with bounded retries.
//!
//! A file held open by another process ("busy") is retried up to
//! `RetryPolicy::max_attempts` times with a fixed delay; any other error ends
//! the move for that file immediately. The destination directory is created
//! before every attempt. Renames that cross filesystems fall back to
//! copy-to-temp + rename + remove source.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;
use tracing::{debug, warn};

use super::helpers::{describe_io_error, is_busy, is_cross_device};
use crate::errors::RelocateError;
use crate::platform::tmp_sibling_name;

/// How many times to try, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

/// What happened to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMove {
    /// The file now lives at the destination.
    Moved { bytes: u64 },
    /// An identical copy was already at the destination; the source copy was dropped.
    Skipped,
}

/// Run `op` until it succeeds, fails with a non-busy error, or attempts run out.
pub fn retry_busy<T>(
    policy: &RetryPolicy,
    path: &Path,
    mut op: impl FnMut() -> io::Result<T>,
) -> Result<T, RelocateError> {
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if is_busy(&e) => {
                warn!(attempt, max = attempts, path = %path.display(), error = %e, "file in use");
                if attempt < attempts {
                    sleep(policy.delay);
                }
            }
            Err(e) => {
                return Err(RelocateError::PermanentFileError {
                    path: path.to_path_buf(),
                    reason: describe_io_error("move", path, &e),
                });
            }
        }
    }
    Err(RelocateError::TransientFileBusy {
        path: path.to_path_buf(),
        attempts,
    })
}

/// Move one file (or symlink) from `src` to `dst`, retrying while it is busy.
pub fn move_file(src: &Path, dst: &Path, policy: &RetryPolicy) -> Result<FileMove, RelocateError> {
    retry_busy(policy, src, || move_once(src, dst))
}

fn move_once(src: &Path, dst: &Path) -> io::Result<FileMove> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    let src_meta = fs::symlink_metadata(src)?;

    match fs::symlink_metadata(dst) {
        Ok(dst_meta) => {
            if same_content(src, &src_meta, dst, &dst_meta)? {
                fs::remove_file(src)?;
                debug!(src = %src.display(), dst = %dst.display(), "identical file already at destination");
                return Ok(FileMove::Skipped);
            }
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("'{}' exists with different content", dst.display()),
            ));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    match fs::rename(src, dst) {
        Ok(()) => Ok(FileMove::Moved {
            bytes: src_meta.len(),
        }),
        Err(e) if is_cross_device(&e) => {
            copy_across(src, dst, &src_meta)?;
            fs::remove_file(src)?;
            Ok(FileMove::Moved {
                bytes: src_meta.len(),
            })
        }
        Err(e) => Err(e),
    }
}

/// Copy into a hidden temp sibling, then rename into place so a half-written
/// file never appears under the final name.
fn copy_across(src: &Path, dst: &Path, src_meta: &fs::Metadata) -> io::Result<()> {
    if src_meta.file_type().is_symlink() {
        return recreate_symlink(src, dst);
    }
    let tmp = tmp_sibling_name(dst, "copy");
    let result = (|| -> io::Result<()> {
        fs::copy(src, &tmp)?;
        let f = File::options().write(true).open(&tmp)?;
        if let Ok(mtime) = src_meta.modified() {
            f.set_modified(mtime)?;
        }
        f.sync_all()?;
        fs::rename(&tmp, dst)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

#[cfg(unix)]
fn recreate_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    let target = fs::read_link(src)?;
    std::os::unix::fs::symlink(target, dst)
}

#[cfg(not(unix))]
fn recreate_symlink(src: &Path, _dst: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("cannot recreate link '{}' across volumes", src.display()),
    ))
}

fn same_content(
    src: &Path,
    src_meta: &fs::Metadata,
    dst: &Path,
    dst_meta: &fs::Metadata,
) -> io::Result<bool> {
    let (st, dt) = (src_meta.file_type(), dst_meta.file_type());
    if st.is_symlink() || dt.is_symlink() {
        return Ok(st.is_symlink() && dt.is_symlink() && fs::read_link(src)? == fs::read_link(dst)?);
    }
    if !dt.is_file() || src_meta.len() != dst_meta.len() {
        return Ok(false);
    }
    let mut a = BufReader::new(File::open(src)?);
    let mut b = BufReader::new(File::open(dst)?);
    let mut buf_a = vec![0u8; 64 * 1024];
    let mut buf_b = vec![0u8; 64 * 1024];
    loop {
        let n = a.read(&mut buf_a)?;
        if n == 0 {
            return Ok(true);
        }
        b.read_exact(&mut buf_b[..n])?;
        if buf_a[..n] != buf_b[..n] {
            return Ok(false);
        }
    }
}
