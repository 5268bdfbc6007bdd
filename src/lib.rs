//! Core library for `relocator`.
//!
//! Moves a directory tree to another location and leaves a directory link at
//! the old path so anything referring to it keeps working. The entry point is
//! [`RelocationEngine`]: `plan` a [`RelocationRequest`], then `execute` it and
//! read [`EngineEvent`]s until `Finished`. [`audit_volume`] lists existing
//! links under a root.

pub mod audit;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs_ops;
pub mod link;
pub mod output;
pub mod plan;
pub mod platform;
pub mod progress;
pub mod tool;
pub mod transfer_log;

pub use audit::{AuditReport, ListingDialect, SymlinkAuditEntry, audit_volume, scan_listing};
pub use cancel::CancelToken;
pub use config::{Config, LogLevel, default_config_path, default_log_path, path_has_symlink_ancestor};
pub use engine::{
    Canceller, EngineEvent, Execution, RelocationEngine, RelocationOutcome, RelocationState,
    TransferSummary,
};
pub use errors::RelocateError;
pub use fs_ops::RetryPolicy;
pub use link::{LinkRecord, link_only, publish_link};
pub use plan::{RelocationPlan, RelocationRequest, Strategy};
pub use progress::{FileCounts, ProgressEstimator, TransferProgress};
pub use tool::{BulkCopyTool, ToolJob, ToolPoll, ToolRun};
