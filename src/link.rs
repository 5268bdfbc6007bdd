//! Publishing the directory link at the old source path.
//!
//! The link is created with the platform's own command (`ln -s` or
//! `mklink /D`) and then checked, since a zero exit code alone is not proof
//! that a link exists.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::errors::RelocateError;
use crate::plan::strip_volume_prefix;
use crate::platform::link_command;

/// A published link: `link_path` now redirects to `target_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub link_path: PathBuf,
    pub target_path: PathBuf,
}

/// Remove what is left of the source (it must be an empty directory, or
/// already gone) and create a directory link there pointing at `target`.
pub fn publish_link(link: &Path, target: &Path) -> Result<LinkRecord, RelocateError> {
    clear_source(link)?;

    let output = link_command(link, target)
        .output()
        .map_err(|e| RelocateError::LinkCreationFailed {
            link: link.to_path_buf(),
            stderr: format!("could not run link command: {e}"),
        })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(RelocateError::LinkCreationFailed {
            link: link.to_path_buf(),
            stderr,
        });
    }

    verify_link(link, target);
    info!(link = %link.display(), target = %target.display(), "link published");
    Ok(LinkRecord {
        link_path: link.to_path_buf(),
        target_path: target.to_path_buf(),
    })
}

/// Link `source` to its derived location under `destination_root` without
/// moving anything. Used when the data was already copied by other means.
/// The destination directory is created if missing; the source must be
/// absent or an empty directory.
pub fn link_only(source: &Path, destination_root: &Path) -> Result<LinkRecord, RelocateError> {
    let absolute = canonical_source(source)?;
    let relative = strip_volume_prefix(&absolute);
    if relative.as_os_str().is_empty() {
        return Err(RelocateError::invalid_path(source, "cannot link a volume root"));
    }
    let target = destination_root.join(relative);
    if target == absolute {
        return Err(RelocateError::invalid_path(
            source,
            "source and destination are the same location",
        ));
    }
    fs::create_dir_all(&target).map_err(|e| {
        RelocateError::invalid_path(&target, format!("cannot create destination: {e}"))
    })?;
    let target = dunce::canonicalize(&target).map_err(|e| {
        RelocateError::invalid_path(&target, format!("cannot resolve destination: {e}"))
    })?;
    publish_link(&absolute, &target)
}

/// Canonical source path, matching what the planner derives for `move`.
/// The source itself may be missing, so only its parent has to resolve.
fn canonical_source(source: &Path) -> Result<PathBuf, RelocateError> {
    let resolve = |p: &Path| {
        dunce::canonicalize(p)
            .map_err(|e| RelocateError::invalid_path(source, format!("cannot resolve source: {e}")))
    };
    if fs::symlink_metadata(source).is_ok_and(|m| m.is_dir()) {
        return resolve(source);
    }
    let Some(name) = source.file_name() else {
        return Err(RelocateError::invalid_path(source, "source has no final path component"));
    };
    let parent = match source.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    Ok(resolve(parent)?.join(name))
}

fn clear_source(link: &Path) -> Result<(), RelocateError> {
    let removal_failed = |reason: String| RelocateError::SourceRemovalFailed {
        path: link.to_path_buf(),
        reason,
    };
    let meta = match fs::symlink_metadata(link) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(removal_failed(e.to_string())),
    };
    if !meta.is_dir() {
        return Err(removal_failed("path exists and is not a directory".into()));
    }
    fs::remove_dir(link).map_err(|e| removal_failed(format!("directory is not empty or in use: {e}")))?;
    info!(path = %link.display(), "removed emptied source directory");
    Ok(())
}

/// Whether `link` is a link that resolves to `target`. A miss is only
/// warned about; the link command already reported success.
fn verify_link(link: &Path, target: &Path) -> bool {
    let is_link = fs::symlink_metadata(link)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false);
    if !is_link {
        warn!(link = %link.display(), "link command succeeded but path is not a link");
        return false;
    }
    let resolves = match (dunce::canonicalize(link), dunce::canonicalize(target)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    if !resolves {
        warn!(link = %link.display(), target = %target.display(), "link does not resolve to the expected target");
    }
    resolves
}
