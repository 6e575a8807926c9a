//! Per-test-suite outcome, derived from sentinel files in the artifacts bucket.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuiteOutcome {
    Failure,
    Success,
    NotRun,
}

impl SuiteOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            SuiteOutcome::Failure => "FAILURE",
            SuiteOutcome::Success => "SUCCESS",
            SuiteOutcome::NotRun => "NOT_RUN",
        }
    }

    pub fn color(self) -> Option<&'static str> {
        match self {
            SuiteOutcome::Failure => Some("danger"),
            SuiteOutcome::Success => Some("good"),
            SuiteOutcome::NotRun => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestSuiteStatus {
    pub suite_name: String,
    pub outcome: SuiteOutcome,
}

impl TestSuiteStatus {
    pub fn new(suite_name: impl Into<String>, outcome: SuiteOutcome) -> Self {
        Self {
            suite_name: suite_name.into(),
            outcome,
        }
    }

    pub fn display_color(&self) -> Option<&'static str> {
        self.outcome.color()
    }

    pub fn ran(&self) -> bool {
        self.outcome != SuiteOutcome::NotRun
    }
}
