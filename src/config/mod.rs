//! Config module.
//! Provides configuration types, default paths, XML loading, and validation.

pub mod paths;
pub mod types;
mod validate;
pub mod xml;

pub use paths::{
    default_config_path, default_log_path, default_transfer_log_dir, path_has_symlink_ancestor,
};
pub use types::{Config, LogLevel};
pub use xml::{LoadResult, create_template_config, load_config_from_xml_path, load_or_init};

/// Environment variable naming an explicit config file (or a directory holding `config.xml`).
pub const CONFIG_ENV: &str = "RELOCATOR_CONFIG";

/// Defaults shared across submodules.
pub const RETRY_ATTEMPTS_DEFAULT: u32 = 5;
pub const RETRY_DELAY_MS_DEFAULT: u64 = 2_000;
pub const REAP_ATTEMPTS_DEFAULT: u32 = 3;
pub const REAP_DELAY_MS_DEFAULT: u64 = 2_000;
pub const POLL_INTERVAL_MS_DEFAULT: u64 = 1_000;
