//! Relocation engine.
//!
//! `plan` validates a request and checks free space; `execute` runs the plan
//! on a dedicated worker thread and pushes [`EngineEvent`]s to the caller.
//! One execution at a time per engine. The lifecycle is:
//!
//! ```text
//! Planned -> SpaceChecked -> Transferring -> ReapingEmptyDirs -> LinkPublished -> Completed
//!                 |               |
//!                 |               +-> Canceled | Failed
//!                 +-> PreviewCompleted (dry run)
//! ```
//!
//! Cancellation is cooperative: the native mover checks after every file,
//! the tool supervisor on every poll. A canceled run keeps what it has moved
//! so far; nothing is rolled back and no link is created.

use chrono::Local;
use crossbeam_channel::{Receiver, unbounded};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::errors::RelocateError;
use crate::fs_ops::{
    FileMove, FreeSpaceFn, available_space, check_space, count_files, list_files, move_file,
    reap_empty_dirs, scan_tree,
};
use crate::link::{LinkRecord, publish_link};
use crate::plan::{RelocationPlan, RelocationRequest, Strategy, plan_paths};
use crate::progress::{FileCounts, ProgressEstimator, TransferProgress};
use crate::tool::{BulkCopyTool, ToolJob, default_tool, thread_count};
use crate::transfer_log::TransferLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationState {
    Planned,
    SpaceChecked,
    Transferring,
    ReapingEmptyDirs,
    LinkPublished,
    Completed,
    Canceled,
    Failed,
    PreviewCompleted,
}

/// Stats carried by every terminal outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub progress: TransferProgress,
    /// Size of the source tree as planned.
    pub bytes: u64,
    pub elapsed: Duration,
    /// Transfer log, or the tool's log when an external tool failed.
    pub log_path: std::path::PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelocationOutcome {
    Completed {
        destination: std::path::PathBuf,
        link: LinkRecord,
        summary: TransferSummary,
    },
    Canceled {
        summary: TransferSummary,
    },
    Failed {
        error: RelocateError,
        summary: TransferSummary,
    },
    PreviewCompleted {
        summary: TransferSummary,
    },
}

impl RelocationOutcome {
    pub fn summary(&self) -> &TransferSummary {
        match self {
            RelocationOutcome::Completed { summary, .. }
            | RelocationOutcome::Canceled { summary }
            | RelocationOutcome::Failed { summary, .. }
            | RelocationOutcome::PreviewCompleted { summary } => summary,
        }
    }

    pub fn state(&self) -> RelocationState {
        match self {
            RelocationOutcome::Completed { .. } => RelocationState::Completed,
            RelocationOutcome::Canceled { .. } => RelocationState::Canceled,
            RelocationOutcome::Failed { .. } => RelocationState::Failed,
            RelocationOutcome::PreviewCompleted { .. } => RelocationState::PreviewCompleted,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            RelocationOutcome::Completed { .. } => "completed",
            RelocationOutcome::Canceled { .. } => "canceled",
            RelocationOutcome::Failed { .. } => "failed",
            RelocationOutcome::PreviewCompleted { .. } => "preview",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    State(RelocationState),
    Progress(TransferProgress),
    /// Always the last event of an execution.
    Finished(RelocationOutcome),
}

/// Handle to a running execution.
pub struct Execution {
    events: Receiver<EngineEvent>,
    handle: JoinHandle<RelocationOutcome>,
}

impl Execution {
    pub fn events(&self) -> &Receiver<EngineEvent> {
        &self.events
    }

    /// Block until the worker finishes and return its outcome.
    pub fn wait(self) -> RelocationOutcome {
        match self.handle.join() {
            Ok(outcome) => outcome,
            Err(_) => RelocationOutcome::Failed {
                error: RelocateError::Io {
                    context: "relocation worker".into(),
                    message: "worker thread panicked".into(),
                },
                summary: TransferSummary::default(),
            },
        }
    }
}

/// Cancels whatever execution is current on the engine it came from.
/// Cheap to clone; safe to move into a signal handler.
#[derive(Debug, Clone)]
pub struct Canceller {
    token: Arc<Mutex<CancelToken>>,
}

impl Canceller {
    /// Returns true only for the request that actually stopped the execution.
    pub fn cancel(&self) -> bool {
        lock(&self.token).cancel()
    }
}

fn lock(token: &Mutex<CancelToken>) -> MutexGuard<'_, CancelToken> {
    token.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct RelocationEngine {
    config: Config,
    tool: Arc<dyn BulkCopyTool>,
    free_space: FreeSpaceFn,
    busy: Arc<AtomicBool>,
    token: Arc<Mutex<CancelToken>>,
}

impl RelocationEngine {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            tool: Arc::from(default_tool()),
            free_space: available_space,
            busy: Arc::new(AtomicBool::new(false)),
            token: Arc::new(Mutex::new(CancelToken::new())),
        }
    }

    /// Replace the external tool (robocopy/rsync by default).
    pub fn with_tool(mut self, tool: impl BulkCopyTool + 'static) -> Self {
        self.tool = Arc::new(tool);
        self
    }

    /// Replace the free-space probe.
    pub fn with_free_space(mut self, probe: FreeSpaceFn) -> Self {
        self.free_space = probe;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validate `request`, derive the destination, size the source and check
    /// free space. Nothing is moved.
    pub fn plan(&self, request: &RelocationRequest) -> Result<RelocationPlan, RelocateError> {
        let mut plan = plan_paths(request)?;
        let scan = scan_tree(&plan.source_path);
        plan.estimated_file_count = scan.files;
        plan.estimated_byte_size = scan.bytes;

        let available = (self.free_space)(&plan.destination_path)
            .map_err(|e| RelocateError::io("query free space", &e))?;
        check_space(&plan.destination_path, scan.bytes, available)?;

        info!(
            source = %plan.source_path.display(),
            destination = %plan.destination_path.display(),
            files = scan.files,
            bytes = scan.bytes,
            strategy = %plan.strategy,
            dry_run = plan.dry_run,
            "relocation planned"
        );
        Ok(plan)
    }

    /// Start `plan` on a worker thread. Fails with `EngineBusy` if an
    /// execution is already in flight.
    pub fn execute(&self, plan: RelocationPlan) -> Result<Execution, RelocateError> {
        let session = self.begin()?;
        let (tx, rx) = unbounded();
        let handle = thread::Builder::new()
            .name("relocator-worker".into())
            .spawn(move || {
                session.run(plan, &mut |ev: &EngineEvent| {
                    // A caller that dropped the receiver still gets the outcome from wait().
                    let _ = tx.send(ev.clone());
                })
            })
            .map_err(|e| RelocateError::io("spawn relocation worker", &e))?;
        Ok(Execution { events: rx, handle })
    }

    /// Run `plan` on the calling thread, handing each event to `on_event`
    /// as it happens. Same lifecycle and exclusivity as [`execute`](Self::execute).
    pub fn run(
        &self,
        plan: RelocationPlan,
        mut on_event: impl FnMut(&EngineEvent),
    ) -> Result<RelocationOutcome, RelocateError> {
        let session = self.begin()?;
        Ok(session.run(plan, &mut on_event))
    }

    /// Request cancellation of the current execution. Idempotent.
    pub fn cancel(&self) -> bool {
        lock(&self.token).cancel()
    }

    pub fn canceller(&self) -> Canceller {
        Canceller {
            token: Arc::clone(&self.token),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn begin(&self) -> Result<Session, RelocateError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RelocateError::EngineBusy);
        }
        let guard = BusyGuard(Arc::clone(&self.busy));

        let token = CancelToken::new();
        *lock(&self.token) = token.clone();

        let log = TransferLog::create(&self.config.transfer_log_dir, Local::now()).map_err(|e| {
            RelocateError::io(
                format!("create transfer log in '{}'", self.config.transfer_log_dir.display()),
                &e,
            )
        })?;
        debug!(log = %log.path().display(), "transfer log opened");

        Ok(Session {
            config: self.config.clone(),
            tool: Arc::clone(&self.tool),
            free_space: self.free_space,
            token,
            log,
            started: Instant::now(),
            busy: guard,
        })
    }
}

/// Clears the engine's busy flag when an execution ends, even by panic.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Everything one execution owns.
struct Session {
    config: Config,
    tool: Arc<dyn BulkCopyTool>,
    free_space: FreeSpaceFn,
    token: CancelToken,
    log: TransferLog,
    started: Instant,
    busy: BusyGuard,
}

/// How the transfer phase ended.
enum Transfer {
    Done,
    Canceled,
    Failed(RelocateError, Option<std::path::PathBuf>),
}

impl Session {
    fn run(mut self, plan: RelocationPlan, emit: &mut dyn FnMut(&EngineEvent)) -> RelocationOutcome {
        let outcome = self.drive(&plan, emit);
        let summary = outcome.summary();
        self.log.summary(outcome.label(), &format!(
            "{} ({} skipped, {} failed), {} bytes in {:.1}s",
            summary.progress.summary_line(),
            summary.progress.files_skipped,
            summary.progress.files_failed,
            summary.bytes,
            summary.elapsed.as_secs_f64()
        ));
        match &outcome {
            RelocationOutcome::Failed { error, summary } => error!(
                code = error.code(),
                kind = error.kind(),
                log = %summary.log_path.display(),
                "relocation failed: {error}"
            ),
            other => info!(
                outcome = other.label(),
                summary = %other.summary().progress.summary_line(),
                "relocation finished"
            ),
        }
        emit(&EngineEvent::State(outcome.state()));
        // Free the engine before the caller sees Finished so it can start the next run.
        drop(self.busy);
        emit(&EngineEvent::Finished(outcome.clone()));
        outcome
    }

    fn summary(&self, progress: TransferProgress, plan: &RelocationPlan) -> TransferSummary {
        TransferSummary {
            progress,
            bytes: plan.estimated_byte_size,
            elapsed: self.started.elapsed(),
            log_path: self.log.path().to_path_buf(),
        }
    }

    fn failed(&self, error: RelocateError, progress: TransferProgress, plan: &RelocationPlan) -> RelocationOutcome {
        RelocationOutcome::Failed {
            error,
            summary: self.summary(progress, plan),
        }
    }

    fn drive(&mut self, plan: &RelocationPlan, emit: &mut dyn FnMut(&EngineEvent)) -> RelocationOutcome {
        emit(&EngineEvent::State(RelocationState::Planned));
        let mut progress = ProgressEstimator::new(plan.estimated_file_count);

        // The plan already passed a space check; repeat it cheaply with the
        // planned size in case the destination filled up since.
        match (self.free_space)(&plan.destination_path) {
            Ok(available) => {
                if let Err(e) = check_space(&plan.destination_path, plan.estimated_byte_size, available) {
                    return self.failed(e, progress.current(), plan);
                }
            }
            Err(e) => warn!(error = %e, "free space recheck failed; continuing"),
        }
        emit(&EngineEvent::State(RelocationState::SpaceChecked));

        if plan.dry_run {
            return self.preview(plan, progress);
        }

        emit(&EngineEvent::State(RelocationState::Transferring));
        // Also creates the destination root; planning leaves the disk untouched.
        if let Err(e) = fs::create_dir_all(&plan.destination_path) {
            let err = RelocateError::PermanentFileError {
                path: plan.destination_path.clone(),
                reason: crate::fs_ops::describe_io_error("create destination", &plan.destination_path, &e),
            };
            return self.failed(err, progress.current(), plan);
        }

        let transfer = match plan.strategy {
            Strategy::NativeMove => self.transfer_native(plan, &mut progress, emit),
            Strategy::ExternalTool => self.transfer_tool(plan, &mut progress, emit),
        };
        match transfer {
            Transfer::Done => {}
            Transfer::Canceled => {
                self.log.note("canceled; moved files stay at the destination");
                return RelocationOutcome::Canceled {
                    summary: self.summary(progress.current(), plan),
                };
            }
            Transfer::Failed(error, log) => {
                let mut summary = self.summary(progress.current(), plan);
                if let Some(log) = log {
                    summary.log_path = log;
                }
                return RelocationOutcome::Failed { error, summary };
            }
        }

        emit(&EngineEvent::State(RelocationState::ReapingEmptyDirs));
        let failed_files = progress.current().files_failed;
        let allow_force = plan.strategy == Strategy::NativeMove && failed_files == 0;
        let reaped = reap_empty_dirs(&plan.source_path, &self.config.reap, allow_force);
        if reaped.remaining {
            let remaining = count_files(&plan.source_path);
            let err = RelocateError::SourceRemovalFailed {
                path: plan.source_path.clone(),
                reason: format!("{remaining} file(s) remain in the source ({failed_files} failed to move)"),
            };
            return self.failed(err, progress.current(), plan);
        }

        let link = match publish_link(&plan.source_path, &plan.destination_path) {
            Ok(link) => link,
            Err(e) => return self.failed(e, progress.current(), plan),
        };
        emit(&EngineEvent::State(RelocationState::LinkPublished));
        self.log.note(&format!(
            "link {} -> {}",
            link.link_path.display(),
            link.target_path.display()
        ));

        let done = progress.finish();
        emit(&EngineEvent::Progress(done));
        RelocationOutcome::Completed {
            destination: plan.destination_path.clone(),
            link,
            summary: self.summary(done, plan),
        }
    }

    fn preview(&mut self, plan: &RelocationPlan, progress: ProgressEstimator) -> RelocationOutcome {
        for file in list_files(&plan.source_path) {
            if self.token.is_canceled() {
                return RelocationOutcome::Canceled {
                    summary: self.summary(progress.current(), plan),
                };
            }
            let dst = destination_for(&file, plan);
            let bytes = fs::symlink_metadata(&file).map(|m| m.len()).unwrap_or(0);
            self.log.would_move(&file, &dst, bytes);
        }
        self.log.note(&format!(
            "would link {} -> {}",
            plan.source_path.display(),
            plan.destination_path.display()
        ));
        RelocationOutcome::PreviewCompleted {
            summary: self.summary(progress.current(), plan),
        }
    }

    fn transfer_native(
        &mut self,
        plan: &RelocationPlan,
        progress: &mut ProgressEstimator,
        emit: &mut dyn FnMut(&EngineEvent),
    ) -> Transfer {
        let files = list_files(&plan.source_path);
        *progress = ProgressEstimator::new(files.len() as u64);
        emit(&EngineEvent::Progress(progress.current()));

        let mut counts = FileCounts::default();
        for src in files {
            if self.token.is_canceled() {
                info!(moved = counts.moved, "cancel requested; stopping before next file");
                return Transfer::Canceled;
            }
            let dst = destination_for(&src, plan);
            match move_file(&src, &dst, &self.config.retry) {
                Ok(FileMove::Moved { bytes }) => {
                    counts.moved += 1;
                    self.log.moved(&src, &dst, bytes);
                }
                Ok(FileMove::Skipped) => {
                    counts.skipped += 1;
                    self.log.skipped(&src, &dst);
                }
                Err(e) => {
                    counts.failed += 1;
                    warn!(path = %src.display(), code = e.code(), kind = e.kind(), "file not moved: {e}");
                    self.log.failed(&src, &e.to_string());
                }
            }
            if let Some(p) = progress.observe(counts) {
                emit(&EngineEvent::Progress(p));
            }
        }
        Transfer::Done
    }

    fn transfer_tool(
        &mut self,
        plan: &RelocationPlan,
        progress: &mut ProgressEstimator,
        emit: &mut dyn FnMut(&EngineEvent),
    ) -> Transfer {
        let job = ToolJob {
            source: plan.source_path.clone(),
            destination: plan.destination_path.clone(),
            log_path: self.log.sibling(self.tool.name()),
            retry: self.config.retry,
            threads: thread_count(self.config.tool_threads),
        };
        let name = self.tool.name().to_string();
        self.log.note(&format!("delegating to {name}; tool log {}", job.log_path.display()));
        emit(&EngineEvent::Progress(progress.current()));

        let mut run = match self.tool.launch(&job) {
            Ok(run) => run,
            Err(e) => {
                let err = RelocateError::io(format!("launch {name}"), &e);
                return Transfer::Failed(err, Some(job.log_path));
            }
        };
        info!(tool = %name, threads = job.threads, "external tool started");

        let code = loop {
            if self.token.is_canceled() {
                if let Err(e) = run.terminate() {
                    warn!(tool = %name, error = %e, "could not terminate tool");
                }
                info!(tool = %name, log = %job.log_path.display(), "tool terminated on cancel; log kept");
                return Transfer::Canceled;
            }
            let poll = match run.poll() {
                Ok(p) => p,
                Err(e) => {
                    let _ = run.terminate();
                    let err = RelocateError::io(format!("poll {name}"), &e);
                    return Transfer::Failed(err, Some(job.log_path));
                }
            };
            if let Some(p) = progress.observe(poll.counts) {
                emit(&EngineEvent::Progress(p));
            }
            if let Some(code) = poll.exit {
                break code;
            }
            thread::sleep(self.config.poll_interval);
        };

        if self.tool.is_failure(code) {
            warn!(tool = %name, code, log = %job.log_path.display(), "tool failed; source left in place");
            let err = RelocateError::ExternalToolFailure {
                tool: name,
                code,
                log: job.log_path.clone(),
            };
            return Transfer::Failed(err, Some(job.log_path));
        }

        if let Err(e) = fs::remove_file(&job.log_path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            debug!(log = %job.log_path.display(), error = %e, "could not delete tool log");
        }

        let remaining = count_files(&plan.source_path);
        if remaining > 0 {
            let err = RelocateError::SourceRemovalFailed {
                path: plan.source_path.clone(),
                reason: format!("{name} exited with {code} but {remaining} file(s) remain in the source"),
            };
            return Transfer::Failed(err, None);
        }
        info!(tool = %name, code, "tool finished; source holds no files");
        Transfer::Done
    }
}

fn destination_for(src: &Path, plan: &RelocationPlan) -> std::path::PathBuf {
    match src.strip_prefix(&plan.source_path) {
        Ok(rel) => plan.destination_path.join(rel),
        Err(_) => plan.destination_path.join(src.file_name().unwrap_or_default()),
    }
}
