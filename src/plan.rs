//! Destination derivation and input validation.
//!
//! The destination of a relocation is the destination root plus the full
//! source path with its volume prefix and root stripped, so
//! `/games/steam/Foo` under `/mnt/big` lands at `/mnt/big/games/steam/Foo`
//! and `D:\Games\Foo` under `E:\Archive` lands at `E:\Archive\Games\Foo`.

use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::errors::RelocateError;

/// How files get from the source to the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    /// File-by-file rename (or copy + delete across volumes) in this process.
    #[default]
    NativeMove,
    /// Delegate to robocopy / rsync and watch its side effects.
    ExternalTool,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::NativeMove => "native",
            Strategy::ExternalTool => "external",
        })
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" | "native-move" | "nativemove" => Ok(Strategy::NativeMove),
            "external" | "external-tool" | "externaltool" | "tool" => Ok(Strategy::ExternalTool),
            other => Err(format!(
                "unknown strategy '{other}' (expected 'native' or 'external')"
            )),
        }
    }
}

/// What the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationRequest {
    pub source_path: PathBuf,
    pub destination_root: PathBuf,
    pub strategy: Strategy,
    pub dry_run: bool,
}

impl RelocationRequest {
    pub fn new(source_path: impl Into<PathBuf>, destination_root: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            destination_root: destination_root.into(),
            strategy: Strategy::default(),
            dry_run: false,
        }
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// A validated request. Built once by the engine and never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationPlan {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub estimated_file_count: u64,
    pub estimated_byte_size: u64,
    pub strategy: Strategy,
    pub dry_run: bool,
}

/// Drop the drive/UNC prefix and the root separator, keeping everything else.
pub fn strip_volume_prefix(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::Prefix(_) | Component::RootDir))
        .collect()
}

/// Validate the request and derive the destination path.
///
/// The returned plan carries zero estimates; the engine fills them in after
/// scanning the source. Nothing is created here: a missing destination root
/// is resolved through its nearest existing ancestor and created by the
/// engine once the space check has passed.
pub fn plan_paths(request: &RelocationRequest) -> Result<RelocationPlan, RelocateError> {
    let raw_source = &request.source_path;
    let meta = fs::symlink_metadata(raw_source)
        .map_err(|e| RelocateError::invalid_path(raw_source, format!("cannot access source: {e}")))?;
    if meta.file_type().is_symlink() {
        return Err(RelocateError::invalid_path(
            raw_source,
            "source is already a link",
        ));
    }
    if !meta.is_dir() {
        return Err(RelocateError::invalid_path(raw_source, "source is not a directory"));
    }
    let source = dunce::canonicalize(raw_source)
        .map_err(|e| RelocateError::invalid_path(raw_source, format!("cannot resolve source: {e}")))?;

    let relative = strip_volume_prefix(&source);
    if relative.as_os_str().is_empty() {
        return Err(RelocateError::invalid_path(
            &source,
            "cannot relocate a volume root",
        ));
    }

    let root = resolve_destination_root(&request.destination_root)?;
    let destination = root.join(&relative);
    debug!(source = %source.display(), destination = %destination.display(), "derived destination");

    if destination == source {
        return Err(RelocateError::invalid_path(
            &source,
            "source and destination are the same location",
        ));
    }
    if destination.starts_with(&source) {
        return Err(RelocateError::invalid_path(
            &destination,
            format!("destination lies inside the source '{}'", source.display()),
        ));
    }

    Ok(RelocationPlan {
        source_path: source,
        destination_path: destination,
        estimated_file_count: 0,
        estimated_byte_size: 0,
        strategy: request.strategy,
        dry_run: request.dry_run,
    })
}

/// Canonical form of the destination root. A missing root is resolved
/// through its nearest existing ancestor, so the result is canonical even
/// before the root exists.
fn resolve_destination_root(root: &Path) -> Result<PathBuf, RelocateError> {
    if root.exists() {
        if !root.is_dir() {
            return Err(RelocateError::invalid_path(root, "destination root is not a directory"));
        }
        return dunce::canonicalize(root).map_err(|e| {
            RelocateError::invalid_path(root, format!("cannot resolve destination root: {e}"))
        });
    }
    let mut existing = root;
    let mut tail = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }
    let base = if existing.as_os_str().is_empty() {
        std::env::current_dir().map_err(|e| RelocateError::io("read current dir", &e))?
    } else {
        if !existing.is_dir() {
            return Err(RelocateError::invalid_path(
                root,
                format!("'{}' is not a directory", existing.display()),
            ));
        }
        dunce::canonicalize(existing).map_err(|e| {
            RelocateError::invalid_path(root, format!("cannot resolve destination root: {e}"))
        })?
    };
    Ok(tail.iter().rev().fold(base, |acc, part| acc.join(part)))
}
