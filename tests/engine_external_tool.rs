//! The external-tool path driven by in-process doubles instead of robocopy/rsync.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::tempdir;

use relocator::fs_ops::{count_files, list_files};
use relocator::{
    BulkCopyTool, Config, EngineEvent, FileCounts, RelocateError, RelocationEngine,
    RelocationOutcome, RelocationRequest, Strategy, ToolJob, ToolPoll, ToolRun,
};

/// Moves one file per poll, reporting a scripted (noisy) moved count, and
/// exits with `exit_code` once the source is empty.
struct StepTool {
    exit_code: i32,
    noisy: Vec<u64>,
}

struct StepRun {
    job: ToolJob,
    exit_code: i32,
    noisy: Vec<u64>,
    polls: usize,
}

impl BulkCopyTool for StepTool {
    fn name(&self) -> &str {
        "steptool"
    }

    fn launch(&self, job: &ToolJob) -> io::Result<Box<dyn ToolRun>> {
        fs::write(&job.log_path, "started\n")?;
        Ok(Box::new(StepRun {
            job: job.clone(),
            exit_code: self.exit_code,
            noisy: self.noisy.clone(),
            polls: 0,
        }))
    }

    fn is_failure(&self, code: i32) -> bool {
        code >= 8
    }
}

impl ToolRun for StepRun {
    fn poll(&mut self) -> io::Result<ToolPoll> {
        let moved_real = count_files(&self.job.destination);
        let remaining = list_files(&self.job.source);
        if self.exit_code >= 8 {
            return Ok(ToolPoll {
                counts: FileCounts::default(),
                exit: Some(self.exit_code),
            });
        }
        if let Some(next) = remaining.first() {
            let rel = next.strip_prefix(&self.job.source).unwrap();
            let dst = self.job.destination.join(rel);
            fs::create_dir_all(dst.parent().unwrap())?;
            fs::rename(next, dst)?;
        }
        let reported = self.noisy.get(self.polls).copied().unwrap_or(moved_real + 1);
        self.polls += 1;
        Ok(ToolPoll {
            counts: FileCounts {
                moved: reported,
                ..FileCounts::default()
            },
            exit: (remaining.len() <= 1).then_some(self.exit_code),
        })
    }

    fn terminate(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Never finishes on its own; records whether it was terminated.
struct StuckTool {
    terminated: Arc<AtomicBool>,
}

struct StuckRun {
    terminated: Arc<AtomicBool>,
}

impl BulkCopyTool for StuckTool {
    fn name(&self) -> &str {
        "stuck"
    }

    fn launch(&self, job: &ToolJob) -> io::Result<Box<dyn ToolRun>> {
        fs::write(&job.log_path, "working\n")?;
        Ok(Box::new(StuckRun {
            terminated: Arc::clone(&self.terminated),
        }))
    }

    fn is_failure(&self, code: i32) -> bool {
        code != 0
    }
}

impl ToolRun for StuckRun {
    fn poll(&mut self) -> io::Result<ToolPoll> {
        Ok(ToolPoll {
            counts: FileCounts { moved: 1, ..FileCounts::default() },
            exit: None,
        })
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.terminated.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn tree(root: &std::path::Path, n: usize) -> PathBuf {
    let source = root.join("src/Game");
    fs::create_dir_all(source.join("sub")).unwrap();
    for i in 0..n {
        let dir = if i % 2 == 0 { source.clone() } else { source.join("sub") };
        fs::write(dir.join(format!("f{i}")), format!("file {i}")).unwrap();
    }
    source
}

fn external(source: &std::path::Path, root: &std::path::Path) -> RelocationRequest {
    RelocationRequest::new(source, root.join("dst")).strategy(Strategy::ExternalTool)
}

#[cfg(unix)]
#[test]
fn noisy_counts_are_clamped_and_run_completes() {
    let td = tempdir().unwrap();
    let source = tree(td.path(), 4);
    let engine = RelocationEngine::new(Config::with_log_dir(td.path().join("logs"))).with_tool(
        StepTool {
            exit_code: 1,
            noisy: vec![2, 1, 3, 2],
        },
    );
    let plan = engine.plan(&external(&source, td.path())).unwrap();

    let mut percents = Vec::new();
    let outcome = engine
        .run(plan.clone(), |ev| {
            if let EngineEvent::Progress(p) = ev {
                percents.push(p.percent);
            }
        })
        .unwrap();

    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
    let RelocationOutcome::Completed { summary, .. } = &outcome else {
        panic!("expected Completed, got {outcome:?}");
    };
    assert_eq!(summary.progress.percent, 100);
    assert_eq!(summary.progress.files_moved, 3, "max of the noisy readings");
    assert_eq!(count_files(&plan.destination_path), 4);
    assert!(fs::symlink_metadata(&plan.source_path).unwrap().file_type().is_symlink());

    let tool_log = summary.log_path.with_file_name(format!(
        "{}.steptool.log",
        summary.log_path.file_stem().unwrap().to_string_lossy()
    ));
    assert!(!tool_log.exists(), "tool log is deleted after success");
}

#[test]
fn failure_exit_keeps_source_and_names_tool_log() {
    let td = tempdir().unwrap();
    let source = tree(td.path(), 3);
    let engine = RelocationEngine::new(Config::with_log_dir(td.path().join("logs")))
        .with_tool(StepTool {
            exit_code: 8,
            noisy: Vec::new(),
        });
    let plan = engine.plan(&external(&source, td.path())).unwrap();
    let outcome = engine.execute(plan.clone()).unwrap().wait();

    let RelocationOutcome::Failed { error, summary } = &outcome else {
        panic!("expected Failed, got {outcome:?}");
    };
    let RelocateError::ExternalToolFailure { tool, code, log } = error else {
        panic!("expected ExternalToolFailure, got {error:?}");
    };
    assert_eq!(tool, "steptool");
    assert_eq!(*code, 8);
    assert_eq!(&summary.log_path, log);
    assert!(log.exists(), "tool log is preserved on failure");
    assert_eq!(count_files(&plan.source_path), 3);
    assert!(!fs::symlink_metadata(&plan.source_path).unwrap().file_type().is_symlink());
}

#[test]
fn cancel_terminates_the_tool() {
    let td = tempdir().unwrap();
    let source = tree(td.path(), 2);
    let terminated = Arc::new(AtomicBool::new(false));
    let engine = RelocationEngine::new(Config::with_log_dir(td.path().join("logs"))).with_tool(
        StuckTool {
            terminated: Arc::clone(&terminated),
        },
    );
    let plan = engine.plan(&external(&source, td.path())).unwrap();

    let outcome = engine
        .run(plan.clone(), |ev| {
            if matches!(ev, EngineEvent::Progress(p) if p.files_moved == 1) {
                engine.cancel();
            }
        })
        .unwrap();

    assert!(matches!(outcome, RelocationOutcome::Canceled { .. }), "{outcome:?}");
    assert!(terminated.load(Ordering::SeqCst));
    assert_eq!(count_files(&plan.source_path), 2);
}

#[cfg(unix)]
#[test]
fn success_with_files_left_behind_is_a_source_removal_failure() {
    struct LazyTool;
    struct LazyRun;
    impl BulkCopyTool for LazyTool {
        fn name(&self) -> &str {
            "lazy"
        }
        fn launch(&self, _job: &ToolJob) -> io::Result<Box<dyn ToolRun>> {
            Ok(Box::new(LazyRun))
        }
        fn is_failure(&self, code: i32) -> bool {
            code >= 8
        }
    }
    impl ToolRun for LazyRun {
        fn poll(&mut self) -> io::Result<ToolPoll> {
            Ok(ToolPoll {
                counts: FileCounts::default(),
                exit: Some(0),
            })
        }
        fn terminate(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let td = tempdir().unwrap();
    let source = tree(td.path(), 2);
    let engine = RelocationEngine::new(Config::with_log_dir(td.path().join("logs"))).with_tool(LazyTool);
    let plan = engine.plan(&external(&source, td.path())).unwrap();
    let outcome = engine.execute(plan.clone()).unwrap().wait();

    assert!(
        matches!(
            &outcome,
            RelocationOutcome::Failed {
                error: RelocateError::SourceRemovalFailed { .. },
                ..
            }
        ),
        "{outcome:?}"
    );
    assert_eq!(count_files(&plan.source_path), 2, "source is never deleted blindly");
}
