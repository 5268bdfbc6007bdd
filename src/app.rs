//! Application orchestrator.
//! Loads/merges config, initializes logging, installs the ctrl-c handler and
//! dispatches the subcommand. Returns the process exit code.

use anyhow::{Result, anyhow};
use relocator::cli::{Args, Command};
use relocator::config::{CONFIG_ENV, LoadResult, load_or_init};
use relocator::output as out;
use relocator::{
    Config, EngineEvent, RelocateError, RelocationEngine, RelocationOutcome, RelocationRequest,
    audit_volume, default_config_path, link_only,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

use crate::logging::init_tracing;

/// Run the CLI application.
pub fn run(args: Args) -> Result<i32> {
    if args.print_config {
        print_config_location();
        return Ok(0);
    }

    let Some(command) = args.command.clone() else {
        out::print_error("No command given. Use `relocator move|link|audit ...` (see --help).");
        return Ok(2);
    };

    // Create template config if none exists (before logging init)
    let mut cfg = match load_or_init()? {
        LoadResult::Loaded(cfg) => cfg,
        LoadResult::CreatedTemplate(path) => {
            out::print_success(&format!(
                "A template relocator config was written to: {}",
                path.display()
            ));
            out::print_info("Edit it to set `destination_root` and other defaults, or pass DEST_ROOT on the command line.");
            Config::default()
        }
        LoadResult::Missing => Config::default(),
    };
    args.apply_overrides(&mut cfg);

    let guard = init_tracing(&cfg.log_level, cfg.log_file.as_deref(), args.json).map_err(|e| {
        out::print_error(&format!("Failed to initialize logging: {}", e));
        e
    })?;
    let guard_slot = Arc::new(Mutex::new(guard));

    debug!("Starting relocator: {:?}", args);
    cfg.validate()?;

    let result = match command {
        Command::Move { source, .. } => {
            let root = destination_root(&cfg)?;
            run_move(cfg, &source, root, &guard_slot)
        }
        Command::Link { source, .. } => {
            let root = destination_root(&cfg)?;
            match link_only(&source, &root) {
                Ok(link) => {
                    out::print_success(&format!(
                        "Linked {} -> {}",
                        link.link_path.display(),
                        link.target_path.display()
                    ));
                    Ok(0)
                }
                Err(e) => Ok(report_error(&e)),
            }
        }
        Command::Audit { root } => run_audit(&root),
    };

    // Ensure logs are flushed before exit
    if let Ok(mut g) = guard_slot.lock() {
        let _ = g.take();
    }
    result
}

fn print_config_location() {
    if let Ok(cfg_env) = std::env::var(CONFIG_ENV) {
        out::print_info(&format!("Using {CONFIG_ENV} (explicit):\n  {cfg_env}\n"));
        out::print_info(&format!("To override, unset {CONFIG_ENV} or set it to another file."));
        return;
    }
    match default_config_path() {
        Ok(p) => {
            out::print_info(&format!("Default relocator config path:\n  {}\n", p.display()));
            if p.exists() {
                out::print_info("A config file already exists at that location.");
            } else {
                out::print_info("No config file exists there yet. Run any command to create a template.");
            }
        }
        Err(e) => out::print_error(&format!("Could not determine a default config path: {e}")),
    }
}

fn destination_root(cfg: &Config) -> Result<PathBuf> {
    cfg.destination_root
        .clone()
        .ok_or_else(|| anyhow!("no DEST_ROOT given and no destination_root in the config file"))
}

fn report_error(e: &RelocateError) -> i32 {
    error!(code = e.code(), kind = e.kind(), "{e}");
    out::print_error(&e.to_string());
    e.code()
}

type GuardSlot = Arc<Mutex<Option<tracing_appender::non_blocking::WorkerGuard>>>;

fn run_move(cfg: Config, source: &Path, root: PathBuf, guard_slot: &GuardSlot) -> Result<i32> {
    let request = RelocationRequest::new(source, root)
        .strategy(cfg.strategy)
        .dry_run(cfg.dry_run);
    let engine = RelocationEngine::new(cfg);

    let plan = match engine.plan(&request) {
        Ok(plan) => plan,
        Err(e) => return Ok(report_error(&e)),
    };
    out::print_info(&format!(
        "{} -> {}",
        plan.source_path.display(),
        plan.destination_path.display()
    ));

    {
        let canceller = engine.canceller();
        let guard_slot = Arc::clone(guard_slot);
        ctrlc::set_handler(move || {
            if canceller.cancel() {
                out::print_warn("Received interrupt; stopping after the current file...");
            } else {
                // Second ctrl-c: flush logs so an impatient exit loses nothing.
                if let Ok(mut g) = guard_slot.lock() {
                    let _ = g.take();
                }
            }
        })
        .expect("failed to install signal handler");
    }

    let execution = match engine.execute(plan) {
        Ok(ex) => ex,
        Err(e) => return Ok(report_error(&e)),
    };
    for event in execution.events().iter() {
        match event {
            EngineEvent::Progress(p) => out::print_progress(&p),
            EngineEvent::State(s) => debug!(state = ?s, "state changed"),
            EngineEvent::Finished(_) => break,
        }
    }
    let outcome = execution.wait();
    out::print_outcome(&outcome);
    Ok(match &outcome {
        RelocationOutcome::Completed { .. } | RelocationOutcome::PreviewCompleted { .. } => 0,
        RelocationOutcome::Canceled { .. } => 130,
        RelocationOutcome::Failed { error, .. } => error.code(),
    })
}

fn run_audit(root: &Path) -> Result<i32> {
    let report = match audit_volume(root, |entry| out::print_user(&entry.to_string())) {
        Ok(r) => r,
        Err(e) => return Ok(report_error(&e)),
    };
    info!(root = %root.display(), links = report.entries.len(), "audit complete");
    if report.entries.is_empty() {
        out::print_user(&report.to_string());
    } else {
        out::print_info(&format!("{} link(s) found", report.entries.len()));
    }
    Ok(0)
}
