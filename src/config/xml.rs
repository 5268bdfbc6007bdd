//! XML configuration support.
//! - Loads settings from config.xml (quick_xml + serde).
//! - Creates a commented template if missing (unless RELOCATOR_CONFIG is set).
//!
//! Notes:
//! - This module only reads/writes the config file; range checks happen in `validate`.
//! - Unknown XML fields are rejected so typos surface instead of silently using defaults.

use anyhow::{Context, Result, anyhow};
use quick_xml::de::from_str as from_xml_str;
use serde::{Deserialize, Deserializer};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use super::paths::{default_config_path, default_transfer_log_dir, path_has_symlink_ancestor};
use super::{
    CONFIG_ENV, POLL_INTERVAL_MS_DEFAULT, REAP_ATTEMPTS_DEFAULT, REAP_DELAY_MS_DEFAULT,
    RETRY_ATTEMPTS_DEFAULT, RETRY_DELAY_MS_DEFAULT,
};
use crate::config::types::{Config, LogLevel};
use crate::fs_ops::RetryPolicy;
use crate::plan::Strategy;
use crate::platform::{set_dir_mode_0700, set_file_mode_0600, write_config_secure_new_0600};

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Default, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    destination_root: Option<String>,
    strategy: Option<String>,
    log_level: Option<String>,
    log_file: Option<String>,
    transfer_log_dir: Option<String>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    retry_attempts: Option<u32>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    retry_delay_ms: Option<u64>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    reap_attempts: Option<u32>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    reap_delay_ms: Option<u64>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    poll_interval_ms: Option<u64>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    tool_threads: Option<usize>,
}

/// Outcome of looking for a config file at startup.
#[derive(Debug)]
pub enum LoadResult {
    /// A config file was found and parsed.
    Loaded(Config),
    /// No file existed at the default location; a template was written there.
    CreatedTemplate(PathBuf),
    /// No file and no template (explicit env path missing, or template creation refused).
    Missing,
}

// Numbers in hand-edited XML often carry surrounding whitespace; blank means "unset".
fn de_trimmed_opt<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<T>().map(Some).map_err(serde::de::Error::custom),
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

// Map XmlConfig -> Config, starting from defaults.
fn xml_to_config(parsed: XmlConfig) -> Result<Config> {
    let mut cfg = Config::default();

    cfg.destination_root = non_empty(parsed.destination_root.as_deref()).map(PathBuf::from);
    if let Some(s) = non_empty(parsed.strategy.as_deref()) {
        cfg.strategy = s.parse::<Strategy>().map_err(|e| anyhow!(e))?;
    }
    if let Some(s) = non_empty(parsed.log_level.as_deref()) {
        cfg.log_level = s.parse::<LogLevel>().map_err(|e| anyhow!(e))?;
    }
    if let Some(s) = non_empty(parsed.log_file.as_deref()) {
        cfg.log_file = Some(PathBuf::from(s));
    }
    cfg.transfer_log_dir = non_empty(parsed.transfer_log_dir.as_deref())
        .map(PathBuf::from)
        .unwrap_or_else(default_transfer_log_dir);

    cfg.retry = RetryPolicy::new(
        parsed.retry_attempts.unwrap_or(RETRY_ATTEMPTS_DEFAULT),
        Duration::from_millis(parsed.retry_delay_ms.unwrap_or(RETRY_DELAY_MS_DEFAULT)),
    );
    cfg.reap = RetryPolicy::new(
        parsed.reap_attempts.unwrap_or(REAP_ATTEMPTS_DEFAULT),
        Duration::from_millis(parsed.reap_delay_ms.unwrap_or(REAP_DELAY_MS_DEFAULT)),
    );
    cfg.poll_interval =
        Duration::from_millis(parsed.poll_interval_ms.unwrap_or(POLL_INTERVAL_MS_DEFAULT));
    cfg.tool_threads = parsed.tool_threads;
    Ok(cfg)
}

/// Load a Config from a specific XML file path.
pub fn load_config_from_xml_path(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read config xml '{}'", path.display()))?;
    let parsed: XmlConfig = from_xml_str(&contents)
        .with_context(|| format!("parse config xml '{}'", path.display()))?;
    xml_to_config(parsed).with_context(|| format!("invalid value in '{}'", path.display()))
}

/// Find and load the config file, or write a template when none exists yet.
///
/// A template is only created at the OS default location; an explicit
/// `RELOCATOR_CONFIG` that points nowhere yields `Missing`.
pub fn load_or_init() -> Result<LoadResult> {
    let env_set = env::var_os(CONFIG_ENV).is_some();
    let cfg_path = default_config_path()?;

    if cfg_path.exists() {
        debug!(path = %cfg_path.display(), "loading config");
        return load_config_from_xml_path(&cfg_path).map(LoadResult::Loaded);
    }
    if env_set {
        return Ok(LoadResult::Missing);
    }
    match create_template_config(&cfg_path) {
        Ok(()) => Ok(LoadResult::CreatedTemplate(cfg_path)),
        Err(e) => {
            debug!(error = %e, path = %cfg_path.display(), "template config not created");
            Ok(LoadResult::Missing)
        }
    }
}

/// Create a commented template config file (0600 on Unix, parent 0700).
/// Refuses to write through a symlinked ancestor.
pub fn create_template_config(path: &Path) -> Result<()> {
    if path_has_symlink_ancestor(path)? {
        return Err(anyhow!(
            "Refusing to create config: ancestor of {} is a symlink",
            path.display()
        ));
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
        let _ = set_dir_mode_0700(parent);
    }

    let content = format!(
        "<!--\n  relocator configuration (XML)\n\n    destination_root   -> default destination root when the command line names none\n    strategy           -> native | external (robocopy on Windows, rsync elsewhere)\n    log_level          -> quiet | normal | info | debug\n    log_file           -> diagnostic log file (optional)\n    transfer_log_dir   -> where per-run transfer logs are kept\n    retry_attempts     -> attempts per file while it is locked by another process\n    retry_delay_ms     -> wait between those attempts\n    reap_attempts      -> attempts to remove emptied source directories\n    reap_delay_ms      -> wait between those attempts\n    poll_interval_ms   -> progress polling interval for the external tool\n    tool_threads       -> worker threads for the external tool (blank = tool default)\n\n  Command-line flags override these values.\n-->\n<config>\n  <destination_root></destination_root>\n  <strategy>native</strategy>\n  <log_level>normal</log_level>\n  <log_file></log_file>\n  <transfer_log_dir>{}</transfer_log_dir>\n  <retry_attempts>{}</retry_attempts>\n  <retry_delay_ms>{}</retry_delay_ms>\n  <reap_attempts>{}</reap_attempts>\n  <reap_delay_ms>{}</reap_delay_ms>\n  <poll_interval_ms>{}</poll_interval_ms>\n  <tool_threads></tool_threads>\n</config>\n",
        default_transfer_log_dir().display(),
        RETRY_ATTEMPTS_DEFAULT,
        RETRY_DELAY_MS_DEFAULT,
        REAP_ATTEMPTS_DEFAULT,
        REAP_DELAY_MS_DEFAULT,
        POLL_INTERVAL_MS_DEFAULT,
    );

    write_config_secure_new_0600(path, content.as_bytes())?;
    let _ = set_file_mode_0600(path);

    info!("Created template config at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn template_round_trips_through_loader() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("relocator").join("config.xml");
        create_template_config(&path).unwrap();
        let cfg = load_config_from_xml_path(&path).unwrap();
        assert_eq!(cfg.strategy, Strategy::NativeMove);
        assert_eq!(cfg.retry.max_attempts, RETRY_ATTEMPTS_DEFAULT);
        assert_eq!(cfg.poll_interval, Duration::from_millis(POLL_INTERVAL_MS_DEFAULT));
        assert!(cfg.destination_root.is_none());
        assert!(cfg.tool_threads.is_none());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.xml");
        fs::write(&path, "<config><download_base>/x</download_base></config>").unwrap();
        let err = load_config_from_xml_path(&path).unwrap_err();
        assert!(format!("{err:#}").contains("unknown field"), "{err:#}");
    }

    #[test]
    fn bad_strategy_names_the_value() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.xml");
        fs::write(&path, "<config><strategy>teleport</strategy></config>").unwrap();
        let err = load_config_from_xml_path(&path).unwrap_err();
        assert!(format!("{err:#}").contains("teleport"));
    }
}
