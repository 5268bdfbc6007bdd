//! Progress maths.
//!
//! Raw signals (per-file results from the native mover, log or directory
//! counts from an external tool) are folded into a [`TransferProgress`] whose
//! counters never go backwards within one execution.

use std::fmt;

/// Raw per-poll counts as reported by a mover or tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileCounts {
    pub moved: u64,
    pub skipped: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferProgress {
    pub files_moved: u64,
    pub files_skipped: u64,
    pub files_failed: u64,
    pub total_files: u64,
    pub percent: u8,
}

impl TransferProgress {
    pub fn summary_line(&self) -> String {
        summary_line(self.files_moved, self.total_files)
    }
}

impl fmt::Display for TransferProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>3}% {}", self.percent, self.summary_line())
    }
}

/// `floor(100 * moved / total)`, capped at 100; an empty transfer is complete.
pub fn percent(moved: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let p = (moved as u128 * 100) / total as u128;
    p.min(100) as u8
}

pub fn summary_line(moved: u64, total: u64) -> String {
    format!("{moved}/{total} files moved")
}

/// Folds noisy counts into monotonic progress.
#[derive(Debug, Clone)]
pub struct ProgressEstimator {
    current: TransferProgress,
}

impl ProgressEstimator {
    pub fn new(total_files: u64) -> Self {
        Self {
            current: TransferProgress {
                total_files,
                percent: if total_files == 0 { 100 } else { 0 },
                ..TransferProgress::default()
            },
        }
    }

    pub fn current(&self) -> TransferProgress {
        self.current
    }

    /// Merge a new reading. Each counter keeps the largest value seen so far.
    /// Returns the new snapshot when anything advanced.
    pub fn observe(&mut self, counts: FileCounts) -> Option<TransferProgress> {
        let before = self.current;
        let c = &mut self.current;
        c.files_moved = c.files_moved.max(counts.moved);
        c.files_skipped = c.files_skipped.max(counts.skipped);
        c.files_failed = c.files_failed.max(counts.failed);
        c.percent = c.percent.max(percent(c.files_moved, c.total_files));
        (self.current != before).then_some(self.current)
    }

    /// Mark the transfer complete (100%) keeping the counters as they are.
    pub fn finish(&mut self) -> TransferProgress {
        self.current.percent = 100;
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_edges() {
        assert_eq!(percent(0, 0), 100);
        assert_eq!(percent(0, 3), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 66);
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(9, 3), 100);
    }

    #[test]
    fn summary_format() {
        assert_eq!(summary_line(3, 10), "3/10 files moved");
    }

    #[test]
    fn regressions_are_clamped() {
        let mut est = ProgressEstimator::new(10);
        let p = est
            .observe(FileCounts { moved: 5, skipped: 1, failed: 0 })
            .unwrap();
        assert_eq!(p.percent, 50);

        // A noisy proxy reading lower than before changes nothing.
        assert!(est.observe(FileCounts { moved: 3, skipped: 0, failed: 0 }).is_none());
        assert_eq!(est.current().files_moved, 5);
        assert_eq!(est.current().files_skipped, 1);

        let p = est
            .observe(FileCounts { moved: 4, skipped: 1, failed: 2 })
            .unwrap();
        assert_eq!(p.files_moved, 5);
        assert_eq!(p.files_failed, 2);
    }

    #[test]
    fn empty_transfer_starts_complete() {
        let est = ProgressEstimator::new(0);
        assert_eq!(est.current().percent, 100);
    }

    #[test]
    fn finish_reports_full() {
        let mut est = ProgressEstimator::new(4);
        est.observe(FileCounts { moved: 1, ..FileCounts::default() });
        let p = est.finish();
        assert_eq!(p.percent, 100);
        assert_eq!(p.files_moved, 1);
        assert_eq!(p.to_string(), "100% 1/4 files moved");
    }
}
