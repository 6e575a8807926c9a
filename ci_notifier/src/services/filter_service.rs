//! Decides whether a build event is worth a notification.

use std::fmt;

use crate::events::{BuildEvent, BuildStatus};

/// Why an event was dropped. Each reason gets its own log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UnparseableStatus(String),
    UninterestingStatus(BuildStatus),
    RepoMismatch { found: Option<String> },
}

impl SkipReason {
    /// Stable label for logs and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::UnparseableStatus(_) => "unparseable_status",
            SkipReason::UninterestingStatus(_) => "uninteresting_status",
            SkipReason::RepoMismatch { .. } => "repo_mismatch",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnparseableStatus(raw) => write!(f, "unparseable status '{raw}'"),
            SkipReason::UninterestingStatus(status) => write!(f, "uninteresting status {status}"),
            SkipReason::RepoMismatch { found: Some(repo) } => write!(f, "repo mismatch: '{repo}'"),
            SkipReason::RepoMismatch { found: None } => write!(f, "repo mismatch: no repo name"),
        }
    }
}

/// Proof that an event passed the filter, carrying the derived identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admitted {
    pub repo_name: String,
}

#[derive(Debug, Clone)]
pub struct NotificationFilter {
    interesting: Vec<BuildStatus>,
    expected_repo: String,
}

impl NotificationFilter {
    pub fn new(interesting: Vec<BuildStatus>, expected_repo: impl Into<String>) -> Self {
        Self {
            interesting,
            expected_repo: expected_repo.into(),
        }
    }

    #[cfg(test)]
    pub fn with_default_statuses(expected_repo: impl Into<String>) -> Self {
        Self::new(BuildStatus::DEFAULT_INTERESTING.to_vec(), expected_repo)
    }

    pub fn interesting(&self) -> &[BuildStatus] {
        &self.interesting
    }

    pub fn decide(&self, event: &BuildEvent) -> Result<Admitted, SkipReason> {
        if let BuildStatus::Unrecognized(raw) = &event.status {
            return Err(SkipReason::UnparseableStatus(raw.clone()));
        }
        if !self.interesting.contains(&event.status) {
            return Err(SkipReason::UninterestingStatus(event.status.clone()));
        }

        match event.repo.repo_name() {
            Some(repo) if repo == self.expected_repo => Ok(Admitted {
                repo_name: repo.to_string(),
            }),
            found => Err(SkipReason::RepoMismatch {
                found: found.map(str::to_string),
            }),
        }
    }
}
