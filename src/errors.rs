//! Typed error definitions for relocator.
//! One variant per failure class the engine reports, so callers and logs can
//! branch on the kind instead of parsing messages.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelocateError {
    #[error("Invalid path {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("Insufficient disk space for destination {dest}: need {required} bytes, have {available} bytes")]
    InsufficientSpace {
        required: u64,
        available: u64,
        dest: PathBuf,
    },

    #[error("File still in use after {attempts} attempts: {path}")]
    TransientFileBusy { path: PathBuf, attempts: u32 },

    #[error("Failed to move {path}: {reason}")]
    PermanentFileError { path: PathBuf, reason: String },

    #[error("{tool} failed with exit code {code}; see log at {log}")]
    ExternalToolFailure {
        tool: String,
        code: i32,
        log: PathBuf,
    },

    #[error("Could not create link at {link}: {stderr}")]
    LinkCreationFailed { link: PathBuf, stderr: String },

    #[error("Could not remove source {path} before linking: {reason}")]
    SourceRemovalFailed { path: PathBuf, reason: String },

    #[error("Link scan of {root} failed with exit code {code}: {stderr}")]
    AuditFailed {
        root: PathBuf,
        code: i32,
        stderr: String,
    },

    #[error("A relocation is already running on this engine")]
    EngineBusy,

    #[error("{context}: {message}")]
    Io { context: String, message: String },
}

impl RelocateError {
    /// Stable numeric code for structured logs and process exit status.
    pub fn code(&self) -> i32 {
        match self {
            RelocateError::InvalidPath { .. } => 10,
            RelocateError::InsufficientSpace { .. } => 11,
            RelocateError::TransientFileBusy { .. } => 20,
            RelocateError::PermanentFileError { .. } => 21,
            RelocateError::ExternalToolFailure { .. } => 30,
            RelocateError::LinkCreationFailed { .. } => 50,
            RelocateError::SourceRemovalFailed { .. } => 51,
            RelocateError::AuditFailed { .. } => 60,
            RelocateError::EngineBusy => 70,
            RelocateError::Io { .. } => 80,
        }
    }

    /// Short machine-friendly name used as the `kind` field in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RelocateError::InvalidPath { .. } => "invalid_path",
            RelocateError::InsufficientSpace { .. } => "insufficient_space",
            RelocateError::TransientFileBusy { .. } => "file_busy",
            RelocateError::PermanentFileError { .. } => "file_error",
            RelocateError::ExternalToolFailure { .. } => "tool_failure",
            RelocateError::LinkCreationFailed { .. } => "link_failed",
            RelocateError::SourceRemovalFailed { .. } => "source_removal_failed",
            RelocateError::AuditFailed { .. } => "audit_failed",
            RelocateError::EngineBusy => "engine_busy",
            RelocateError::Io { .. } => "io",
        }
    }

    pub(crate) fn invalid_path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        RelocateError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Wrap an io::Error that has no more specific classification.
    pub(crate) fn io(context: impl Into<String>, err: &io::Error) -> Self {
        RelocateError::Io {
            context: context.into(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_space_message_names_both_sizes() {
        let e = RelocateError::InsufficientSpace {
            required: 2048,
            available: 1024,
            dest: PathBuf::from("/mnt/big"),
        };
        let msg = e.to_string();
        assert!(msg.contains("2048"));
        assert!(msg.contains("1024"));
        assert!(msg.contains("/mnt/big"));
        assert_eq!(e.kind(), "insufficient_space");
    }

    #[test]
    fn codes_are_distinct() {
        let all = [
            RelocateError::invalid_path("/a", "x"),
            RelocateError::LinkCreationFailed {
                link: "/a".into(),
                stderr: "x".into(),
            },
            RelocateError::EngineBusy,
            RelocateError::io("read", &io::Error::from(io::ErrorKind::NotFound)),
        ];
        let mut codes: Vec<i32> = all.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }
}
