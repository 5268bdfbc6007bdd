//! CLI definition and parsing.
//! Defines Args and provides parse() for command-line handling.
//!
//! Notes:
//! - --debug is a shorthand for --log-level debug.
//! - DEST_ROOT falls back to `destination_root` from the config file.

use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

use crate::config::{Config, LogLevel};
use crate::plan::Strategy;

/// Relocate a directory and leave a link behind.
/// CLI flags override config values (which are loaded from XML if present).
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Move a directory to another drive and link the old path to the new location"
)]
pub struct Args {
    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(
        short = 'd',
        long,
        global = true,
        help = "Enable debug logging (shorthand for --log-level debug)"
    )]
    pub debug: bool,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, global = true, help = "Set log level: quiet, normal, info, debug")]
    pub log_level: Option<String>,

    /// Emit logs in structured JSON (includes timestamp, level, and structured fields).
    #[arg(long, global = true, help = "Emit logs in structured JSON")]
    pub json: bool,

    /// Print where relocator will look for the config file, then exit.
    #[arg(long, help = "Print the config file location used by relocator and exit")]
    pub print_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Move SOURCE under DEST_ROOT and replace it with a link.
    Move {
        #[arg(value_name = "SOURCE", value_hint = ValueHint::DirPath)]
        source: PathBuf,

        #[arg(value_name = "DEST_ROOT", value_hint = ValueHint::DirPath)]
        destination_root: Option<PathBuf>,

        /// `native` moves file by file; `external` delegates to robocopy/rsync.
        #[arg(long, value_parser = parse_strategy)]
        strategy: Option<Strategy>,

        /// Show what would be done, but do not modify files/directories.
        #[arg(long)]
        dry_run: bool,
    },

    /// Link SOURCE to its location under DEST_ROOT without moving anything.
    Link {
        #[arg(value_name = "SOURCE", value_hint = ValueHint::DirPath)]
        source: PathBuf,

        #[arg(value_name = "DEST_ROOT", value_hint = ValueHint::DirPath)]
        destination_root: Option<PathBuf>,
    },

    /// List directory links under ROOT (skipping junctions and trash folders).
    Audit {
        #[arg(value_name = "ROOT", value_hint = ValueHint::DirPath)]
        root: PathBuf,
    },
}

fn parse_strategy(s: &str) -> Result<Strategy, String> {
    s.parse()
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use config default).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        self.log_level.as_deref().and_then(LogLevel::parse)
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
        match &self.command {
            Some(Command::Move {
                destination_root,
                strategy,
                dry_run,
                ..
            }) => {
                if let Some(root) = destination_root {
                    cfg.destination_root = Some(root.clone());
                }
                if let Some(s) = strategy {
                    cfg.strategy = *s;
                }
                if *dry_run {
                    cfg.dry_run = true;
                }
            }
            Some(Command::Link {
                destination_root: Some(root),
                ..
            }) => cfg.destination_root = Some(root.clone()),
            _ => {}
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_with_all_options() {
        let args = Args::try_parse_from([
            "relocator",
            "move",
            "/games/Foo",
            "/mnt/big",
            "--strategy",
            "external",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(
            args.command,
            Some(Command::Move {
                source: PathBuf::from("/games/Foo"),
                destination_root: Some(PathBuf::from("/mnt/big")),
                strategy: Some(Strategy::ExternalTool),
                dry_run: true,
            })
        );
    }

    #[test]
    fn bad_strategy_is_rejected() {
        assert!(Args::try_parse_from(["relocator", "move", "/a", "--strategy", "fast"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let args = Args::try_parse_from(["relocator", "audit", "/", "--debug"]).unwrap();
        assert_eq!(args.effective_log_level(), Some(LogLevel::Debug));
    }

    #[test]
    fn overrides_win_over_config() {
        let args = Args::try_parse_from([
            "relocator",
            "--log-level",
            "quiet",
            "move",
            "/a",
            "/b",
            "--strategy",
            "native",
        ])
        .unwrap();
        let mut cfg = Config::with_log_dir("/tmp/x");
        cfg.strategy = Strategy::ExternalTool;
        cfg.destination_root = Some(PathBuf::from("/from/config"));
        args.apply_overrides(&mut cfg);
        assert_eq!(cfg.log_level, LogLevel::Quiet);
        assert_eq!(cfg.strategy, Strategy::NativeMove);
        assert_eq!(cfg.destination_root, Some(PathBuf::from("/b")));
        assert!(!cfg.dry_run);
    }

    #[test]
    fn link_without_root_keeps_config_root() {
        let args = Args::try_parse_from(["relocator", "link", "/a"]).unwrap();
        let mut cfg = Config::with_log_dir("/tmp/x");
        cfg.destination_root = Some(PathBuf::from("/from/config"));
        args.apply_overrides(&mut cfg);
        assert_eq!(cfg.destination_root, Some(PathBuf::from("/from/config")));
    }
}
