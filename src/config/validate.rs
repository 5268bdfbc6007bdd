//! Config validation logic.
//! Checks numeric ranges and that the transfer log directory is usable.
//! Source/destination paths are validated per request by the planner, not here.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::Path;
use tracing::{debug, error, info};

use super::types::Config;
use crate::fs_ops::io_error_with_help;
use crate::tool::MAX_TOOL_THREADS;

impl Config {
    /// Validate ranges and make sure the transfer log directory exists and is writable.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            bail!("retry_attempts must be at least 1");
        }
        if self.reap.max_attempts == 0 {
            bail!("reap_attempts must be at least 1");
        }
        if self.poll_interval.is_zero() {
            bail!("poll_interval_ms must be greater than 0");
        }
        if let Some(t) = self.tool_threads
            && (t == 0 || t > MAX_TOOL_THREADS)
        {
            bail!("tool_threads must be between 1 and {MAX_TOOL_THREADS}, got {t}");
        }

        ensure_dir_is_or_create(&self.transfer_log_dir, "transfer_log_dir")?;
        ensure_writable(&self.transfer_log_dir, "transfer_log_dir")?;

        info!(
            strategy = %self.strategy,
            transfer_log_dir = %self.transfer_log_dir.display(),
            log_file = %self
                .log_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<none>".into()),
            "Config validated"
        );
        Ok(())
    }
}

/// Ensure directory exists (create if missing). If it exists, it must be a directory.
fn ensure_dir_is_or_create(path: &Path, name: &str) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            error!("{name} exists but isn't a directory: {}", path.display());
            bail!("{name} exists but isn't a directory: {}", path.display());
        }
    } else {
        fs::create_dir_all(path).map_err(io_error_with_help(&format!("create {name}"), path))?;
        info!("Created {name} directory: {}", path.display());
    }
    Ok(())
}

/// Ensure directory is writable using a non-destructive probe file.
fn ensure_writable(path: &Path, name: &str) -> Result<()> {
    let probe = path.join(format!(".relocator_probe_{}.tmp", std::process::id()));
    fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&probe)
        .with_context(|| format!("Cannot write to {name} '{}'; check permissions", path.display()))?;
    let _ = fs::remove_file(&probe);
    debug!("{name} writable: {}", path.display());
    Ok(())
}
