use owo_colors::OwoColorize;

use crate::engine::RelocationOutcome;
use crate::fs_ops::format_bytes;
use crate::progress::TransferProgress;

/// Small wrapper around stdout/stderr printing to provide consistent, colored
/// user-facing messages. Colors are enabled only when output is a TTY.
fn is_tty() -> bool {
    atty::is(atty::Stream::Stdout)
}

pub fn print_info(msg: &str) {
    if is_tty() {
        println!("{} {}", "info:".cyan().bold(), msg);
    } else {
        println!("info: {}", msg);
    }
}

pub fn print_warn(msg: &str) {
    if is_tty() {
        eprintln!("{} {}", "warn:".yellow().bold(), msg);
    } else {
        eprintln!("warn: {}", msg);
    }
}

pub fn print_error(msg: &str) {
    if is_tty() {
        eprintln!("{} {}", "error:".red().bold(), msg);
    } else {
        eprintln!("error: {}", msg);
    }
}

pub fn print_success(msg: &str) {
    if is_tty() {
        println!("{} {}", "ok:".green().bold(), msg);
    } else {
        println!("ok: {}", msg);
    }
}

/// Print a plain user-facing line (no prefix). Use this for primary outputs
/// which users may script against.
pub fn print_user(msg: &str) {
    println!("{}", msg);
}

/// `NN% moved/total files moved`
pub fn print_progress(p: &TransferProgress) {
    if is_tty() {
        println!("{:>3}% {}", p.percent.bold(), p.summary_line());
    } else {
        println!("{p}");
    }
}

/// One-paragraph report for a finished relocation.
pub fn print_outcome(outcome: &RelocationOutcome) {
    let s = outcome.summary();
    let stats = format!(
        "{} ({} skipped, {} failed), {} in {:.1}s; log: {}",
        s.progress.summary_line(),
        s.progress.files_skipped,
        s.progress.files_failed,
        format_bytes(s.bytes),
        s.elapsed.as_secs_f64(),
        s.log_path.display()
    );
    match outcome {
        RelocationOutcome::Completed { link, .. } => {
            print_success(&format!(
                "Relocated: {} -> {}",
                link.link_path.display(),
                link.target_path.display()
            ));
            print_user(&stats);
        }
        RelocationOutcome::PreviewCompleted { .. } => {
            print_info(&format!(
                "Dry-run: {} file(s), {} would be moved",
                s.progress.total_files,
                format_bytes(s.bytes)
            ));
            print_user(&format!("log: {}", s.log_path.display()));
        }
        RelocationOutcome::Canceled { .. } => {
            print_warn("Relocation canceled; already-moved files stay at the destination and no link was created.");
            print_user(&stats);
        }
        RelocationOutcome::Failed { error, .. } => {
            print_error(&error.to_string());
            print_user(&stats);
        }
    }
}
