use std::ffi::OsString;
use std::fs;
use std::io;
use std::process::{Child, Command, Stdio};
use tracing::debug;

use super::{BulkCopyTool, ToolJob, ToolPoll, ToolRun, exit_code, kill_child};
use crate::progress::FileCounts;

const FAILED_MARKERS: &[&str] = &["ERROR ", "FAILED"];
const SKIPPED_MARKERS: &[&str] = &["same", "Skipped", "*EXTRA"];
const MOVED_MARKERS: &[&str] = &["New File", "Newer", "Older", "Changed", "Modified", "Moved"];
/// The end-of-job table header repeats the column names; it is not a file line.
const SUMMARY_HEADER: &str = "Mismatch";

/// Windows robocopy in `/MOVE` mode, observed through its `/LOG` file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Robocopy;

/// Classify every line of a robocopy log. Counts are absolute for the whole
/// log, so callers recompute them from scratch on each poll.
pub fn classify_log(text: &str) -> FileCounts {
    let mut counts = FileCounts::default();
    for line in text.lines() {
        if line.contains(SUMMARY_HEADER) {
            continue;
        }
        if FAILED_MARKERS.iter().any(|m| line.contains(m)) {
            counts.failed += 1;
        } else if SKIPPED_MARKERS.iter().any(|m| line.contains(m)) {
            counts.skipped += 1;
        } else if MOVED_MARKERS.iter().any(|m| line.contains(m)) {
            counts.moved += 1;
        }
    }
    counts
}

pub(crate) fn args(job: &ToolJob) -> Vec<OsString> {
    // /W takes whole seconds; round up so a sub-second delay still waits.
    let wait_secs = job.retry.delay.as_millis().div_ceil(1000).max(1);
    let mut log_arg = OsString::from("/LOG:");
    log_arg.push(&job.log_path);
    vec![
        job.source.clone().into_os_string(),
        job.destination.clone().into_os_string(),
        "/E".into(),
        "/MOVE".into(),
        "/NP".into(),
        format!("/R:{}", job.retry.max_attempts).into(),
        format!("/W:{wait_secs}").into(),
        format!("/MT:{}", job.threads).into(),
        log_arg,
    ]
}

impl BulkCopyTool for Robocopy {
    fn name(&self) -> &str {
        "robocopy"
    }

    fn launch(&self, job: &ToolJob) -> io::Result<Box<dyn ToolRun>> {
        let args = args(job);
        debug!(?args, "launching robocopy");
        let child = Command::new("robocopy")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(Box::new(RobocopyRun {
            child,
            job: job.clone(),
            exit: None,
        }))
    }

    fn is_failure(&self, code: i32) -> bool {
        code >= 8
    }
}

struct RobocopyRun {
    child: Child,
    job: ToolJob,
    exit: Option<i32>,
}

impl RobocopyRun {
    fn read_counts(&self) -> io::Result<FileCounts> {
        match fs::read(&self.job.log_path) {
            Ok(bytes) => Ok(classify_log(&String::from_utf8_lossy(&bytes))),
            // Robocopy creates the log shortly after start.
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(FileCounts::default()),
            Err(e) => Err(e),
        }
    }
}

impl ToolRun for RobocopyRun {
    fn poll(&mut self) -> io::Result<ToolPoll> {
        if self.exit.is_none()
            && let Some(status) = self.child.try_wait()?
        {
            self.exit = Some(exit_code(status));
        }
        Ok(ToolPoll {
            counts: self.read_counts()?,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_ops::RetryPolicy;
    use std::path::PathBuf;
    use std::time::Duration;

    const SAMPLE: &str = "\
-------------------------------------------------------------------------------
   ROBOCOPY     ::     Robust File Copy for Windows
-------------------------------------------------------------------------------
  Source : D:\\Games\\Foo\\
    Dest : E:\\Archive\\Games\\Foo\\
\t                   3\tD:\\Games\\Foo\\
\t  New Dir          2\tD:\\Games\\Foo\\data\\
\t    New File  \t\t    1024\tgame.exe
\t    New File  \t\t     512\tdata\\pak0.bin
\t      Newer   \t\t     256\tsettings.ini
\t    same      \t\t     100\treadme.txt
\t    *EXTRA File \t\t      10\tstale.tmp
2024/05/01 10:00:00 ERROR 32 (0x00000020) Copying File D:\\Games\\Foo\\save.dat
The process cannot access the file because it is being used by another process.
               Total    Copied   Skipped  Mismatch    FAILED    Extras
    Dirs :         2         1         1         0         0         0
   Files :         6         3         1         0         1         1
";

    #[test]
    fn classifies_sample_log() {
        let c = classify_log(SAMPLE);
        assert_eq!(c.moved, 3);
        assert_eq!(c.skipped, 2);
        assert_eq!(c.failed, 1);
    }

    #[test]
    fn empty_log_counts_nothing() {
        assert_eq!(classify_log(""), FileCounts::default());
    }

    #[test]
    fn args_carry_retry_threads_and_log() {
        let job = ToolJob {
            source: PathBuf::from(r"D:\Games\Foo"),
            destination: PathBuf::from(r"E:\Archive\Games\Foo"),
            log_path: PathBuf::from(r"C:\logs\relocation.robocopy.log"),
            retry: RetryPolicy::new(5, Duration::from_secs(2)),
            threads: 16,
        };
        let a: Vec<String> = args(&job)
            .into_iter()
            .map(|s| s.to_string_lossy().into_owned())
            .collect();
        assert_eq!(&a[2..6], ["/E", "/MOVE", "/NP", "/R:5"]);
        assert!(a.contains(&"/W:2".to_string()));
        assert!(a.contains(&"/MT:16".to_string()));
        assert_eq!(a.last().unwrap(), r"/LOG:C:\logs\relocation.robocopy.log");
    }

    #[test]
    fn sub_second_retry_delay_rounds_up() {
        let wait = |ms: u64| {
            let job = ToolJob {
                source: PathBuf::from("a"),
                destination: PathBuf::from("b"),
                log_path: PathBuf::from("c.log"),
                retry: RetryPolicy::new(3, Duration::from_millis(ms)),
                threads: 1,
            };
            args(&job)
                .into_iter()
                .map(|s| s.to_string_lossy().into_owned())
                .find(|a| a.starts_with("/W:"))
                .unwrap()
        };
        assert_eq!(wait(10), "/W:1");
        assert_eq!(wait(0), "/W:1");
        assert_eq!(wait(1500), "/W:2");
        assert_eq!(wait(3000), "/W:3");
    }
}
