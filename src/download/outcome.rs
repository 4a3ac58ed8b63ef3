//! Per-item outcomes and the batch summary.

use std::fmt;
use std::path::PathBuf;

/// Final state of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Success,
    Skipped,
    Failed,
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadStatus::Success => write!(f, "success"),
            DownloadStatus::Skipped => write!(f, "skipped"),
            DownloadStatus::Failed => write!(f, "failed"),
        }
    }
}

/// What happened to one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub item_id: String,

    /// Ledger scope the item was resolved under.
    pub scope: String,

    pub status: DownloadStatus,

    pub failure_reason: Option<String>,

    /// The failure came from writing to disk rather than from the network.
    pub filesystem_failure: bool,

    pub written_paths: Vec<PathBuf>,

    /// Optional assets that could not be fetched.
    pub notes: Vec<String>,
}

impl DownloadOutcome {
    pub fn success(item_id: &str, scope: &str, written_paths: Vec<PathBuf>) -> Self {
        Self {
            item_id: item_id.to_string(),
            scope: scope.to_string(),
            status: DownloadStatus::Success,
            failure_reason: None,
            filesystem_failure: false,
            written_paths,
            notes: Vec::new(),
        }
    }

    pub fn skipped(item_id: &str, scope: &str) -> Self {
        Self {
            status: DownloadStatus::Skipped,
            ..Self::success(item_id, scope, Vec::new())
        }
    }

    pub fn failed(item_id: &str, scope: &str, reason: impl Into<String>) -> Self {
        Self {
            status: DownloadStatus::Failed,
            failure_reason: Some(reason.into()),
            ..Self::success(item_id, scope, Vec::new())
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DownloadStatus::Success
    }
}

/// A target that failed before any of its items could be dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFailure {
    pub link: String,
    pub reason: String,
}

/// Aggregate result of a run.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub total: u64,
    pub succeeded: u64,
    pub skipped: u64,
    pub failed: u64,
    pub per_item: Vec<DownloadOutcome>,
    pub target_failures: Vec<TargetFailure>,
}

impl BatchSummary {
    pub fn add(&mut self, outcome: DownloadOutcome) {
        self.total += 1;
        match outcome.status {
            DownloadStatus::Success => self.succeeded += 1,
            DownloadStatus::Skipped => self.skipped += 1,
            DownloadStatus::Failed => self.failed += 1,
        }
        self.per_item.push(outcome);
    }

    pub fn extend(&mut self, outcomes: impl IntoIterator<Item = DownloadOutcome>) {
        for outcome in outcomes {
            self.add(outcome);
        }
    }

    pub fn add_target_failure(&mut self, link: &str, reason: impl Into<String>) {
        self.target_failures.push(TargetFailure {
            link: link.to_string(),
            reason: reason.into(),
        });
    }

    pub fn failures(&self) -> impl Iterator<Item = &DownloadOutcome> {
        self.per_item
            .iter()
            .filter(|o| o.status == DownloadStatus::Failed)
    }

    /// Succeeded share of the items that were attempted, in percent.
    pub fn success_rate(&self) -> f64 {
        let attempted = self.succeeded + self.failed;
        if attempted == 0 {
            return 100.0;
        }
        self.succeeded as f64 * 100.0 / attempted as f64
    }

    /// Whether disk errors dominate: at least 3 of them and at least half
    /// of all item failures.
    pub fn filesystem_failures_pervasive(&self) -> bool {
        let fs_failures = self.failures().filter(|o| o.filesystem_failure).count() as u64;
        fs_failures >= 3 && fs_failures * 2 >= self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || !self.target_failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fs_failure(id: &str) -> DownloadOutcome {
        DownloadOutcome {
            filesystem_failure: true,
            ..DownloadOutcome::failed(id, "single", "disk full")
        }
    }

    #[test]
    fn test_counts() {
        let mut summary = BatchSummary::default();
        summary.add(DownloadOutcome::success("1", "post:a", vec![]));
        summary.add(DownloadOutcome::skipped("2", "post:a"));
        summary.add(DownloadOutcome::failed("3", "post:a", "HTTP 404"));

        assert_eq!(summary.total, 3);
        assert_eq!(
            (summary.succeeded, summary.skipped, summary.failed),
            (1, 1, 1)
        );
        assert_eq!(summary.failures().next().unwrap().item_id, "3");
        assert_eq!(summary.success_rate(), 50.0);
    }

    #[test]
    fn test_empty_success_rate() {
        assert_eq!(BatchSummary::default().success_rate(), 100.0);
    }

    #[test]
    fn test_pervasive_filesystem_failures() {
        let mut summary = BatchSummary::default();
        summary.extend((0..3).map(|i| fs_failure(&i.to_string())));
        summary.extend((3..6).map(|i| DownloadOutcome::failed(&i.to_string(), "single", "404")));
        assert!(summary.filesystem_failures_pervasive());

        summary.add(DownloadOutcome::failed("7", "single", "404"));
        assert!(!summary.filesystem_failures_pervasive());
    }

    #[test]
    fn test_two_filesystem_failures_are_not_pervasive() {
        let mut summary = BatchSummary::default();
        summary.extend([fs_failure("1"), fs_failure("2")]);
        assert!(!summary.filesystem_failures_pervasive());
    }
}
