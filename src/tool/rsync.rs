use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use tracing::debug;

use super::{BulkCopyTool, ToolJob, ToolPoll, ToolRun, exit_code, kill_child};
use crate::fs_ops::count_files;
use crate::progress::FileCounts;

/// rsync exit code for "some source files vanished before they could be transferred".
const PARTIAL_VANISHED: i32 = 24;

/// `rsync --remove-source-files`, observed by counting files that have
/// appeared under the destination since launch.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rsync;

fn with_trailing_slash(p: &Path) -> OsString {
    let mut s = p.as_os_str().to_os_string();
    if !s.to_string_lossy().ends_with('/') {
        s.push("/");
    }
    s
}

pub(crate) fn args(job: &ToolJob) -> Vec<OsString> {
    vec![
        "-a".into(),
        "--remove-source-files".into(),
        with_trailing_slash(&job.source),
        with_trailing_slash(&job.destination),
    ]
}

impl BulkCopyTool for Rsync {
    fn name(&self) -> &str {
        "rsync"
    }

    fn launch(&self, job: &ToolJob) -> io::Result<Box<dyn ToolRun>> {
        let baseline = count_files(&job.destination);
        let stderr_log = File::create(&job.log_path)?;
        let args = args(job);
        debug!(?args, baseline, "launching rsync");
        let child = Command::new("rsync")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_log))
            .spawn()?;
        Ok(Box::new(RsyncRun {
            child,
            job: job.clone(),
            baseline,
            exit: None,
        }))
    }

    fn is_failure(&self, code: i32) -> bool {
        code != 0 && code != PARTIAL_VANISHED
    }
}

struct RsyncRun {
    child: Child,
    job: ToolJob,
    baseline: u64,
    exit: Option<i32>,
}

impl ToolRun for RsyncRun {
    fn poll(&mut self) -> io::Result<ToolPoll> {
        if self.exit.is_none()
            && let Some(status) = self.child.try_wait()?
        {
            self.exit = Some(exit_code(status));
        }
        let present = count_files(&self.job.destination);
        Ok(ToolPoll {
            counts: FileCounts {
                moved: present.saturating_sub(self.baseline),
                ..FileCounts::default()
            },
            exit: self.exit,
        })
    }

    fn terminate(&mut self) -> io::Result<()> {
        if self.exit.is_none() {
            kill_child(&mut self.child)?;
        }
        Ok(())
    }
}
