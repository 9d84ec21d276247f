//! Run report: what each branch wrote and what went wrong
//!
//! Display: one summary line per branch, e.g.
//! `count: 2 written, 0 skipped, 1 failed`

use std::fmt;

use crate::error::IngestError;

/// Independent unit of work within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    /// Tomorrow's predictions (daily mode)
    Prediction,
    /// Today's observed counts (daily mode, scrape or feed)
    Count,
    /// Historical backfill (full-history mode)
    FullHistory,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::Prediction => write!(f, "prediction"),
            Branch::Count => write!(f, "count"),
            Branch::FullHistory => write!(f, "full-history"),
        }
    }
}

/// One failed fetch, pair or write
#[derive(Debug)]
pub struct BranchFailure {
    /// What was being processed, e.g. `grass/location 0 (station 48)`
    pub context: String,
    pub error: IngestError,
}

/// Outcome of one branch
#[derive(Debug)]
pub struct BranchReport {
    pub branch: Branch,
    /// Samples merged into the store
    pub written: usize,
    /// Upstream rows dropped as malformed
    pub skipped: usize,
    pub failures: Vec<BranchFailure>,
    /// Stopped early because a sibling hit a fatal error
    pub cancelled: bool,
}

impl BranchReport {
    pub fn new(branch: Branch) -> Self {
        Self {
            branch,
            written: 0,
            skipped: 0,
            failures: Vec::new(),
            cancelled: false,
        }
    }

    pub fn fail(&mut self, context: impl Into<String>, error: IngestError) {
        self.failures.push(BranchFailure {
            context: context.into(),
            error,
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

impl fmt::Display for BranchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} written, {} skipped, {} failed",
            self.branch,
            self.written,
            self.skipped,
            self.failures.len()
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}

/// Process exit status derived from a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    PartialFailure,
    Fatal,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Fatal => 1,
            RunStatus::PartialFailure => 2,
        }
    }
}

/// Outcome of a whole run
#[derive(Debug, Default)]
pub struct RunReport {
    pub branches: Vec<BranchReport>,
}

impl RunReport {
    pub fn branch(&self, branch: Branch) -> Option<&BranchReport> {
        self.branches.iter().find(|b| b.branch == branch)
    }

    pub fn samples_written(&self) -> usize {
        self.branches.iter().map(|b| b.written).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BranchFailure> {
        self.branches.iter().flat_map(|b| b.failures.iter())
    }

    pub fn status(&self) -> RunStatus {
        if self.failures().any(|f| f.error.is_fatal()) {
            RunStatus::Fatal
        } else if self.branches.iter().all(BranchReport::is_clean) {
            RunStatus::Success
        } else {
            RunStatus::PartialFailure
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_run_is_success() {
        let mut report = RunReport::default();
        let mut count = BranchReport::new(Branch::Count);
        count.written = 2;
        report.branches.push(count);
        report.branches.push(BranchReport::new(Branch::Prediction));

        assert_eq!(report.status(), RunStatus::Success);
        assert_eq!(report.samples_written(), 2);
    }

    #[test]
    fn test_branch_failure_is_partial() {
        let mut report = RunReport::default();
        let mut prediction = BranchReport::new(Branch::Prediction);
        prediction.fail("tomorrow", IngestError::Fetch("timeout".into()));
        report.branches.push(prediction);

        assert_eq!(report.status(), RunStatus::PartialFailure);
        assert_eq!(report.status().exit_code(), 2);
    }

    #[test]
    fn test_fatal_failure_wins() {
        let mut report = RunReport::default();
        let mut prediction = BranchReport::new(Branch::Prediction);
        prediction.fail("tomorrow", IngestError::Unauthorized("401".into()));
        let mut count = BranchReport::new(Branch::Count);
        count.cancelled = true;
        report.branches.push(prediction);
        report.branches.push(count);

        assert_eq!(report.status(), RunStatus::Fatal);
        assert_eq!(report.status().exit_code(), 1);
    }

    #[test]
    fn test_branch_summary_line() {
        let mut count = BranchReport::new(Branch::Count);
        count.written = 2;
        count.cancelled = true;
        assert_eq!(count.to_string(), "count: 2 written, 0 skipped, 0 failed (cancelled)");
    }
}
