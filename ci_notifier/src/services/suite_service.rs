//! Test-suite status resolution by probing sentinel files.
//!
//! The build writes `{build_id}/tests/{suite}-failure.txt` or
//! `{build_id}/tests/{suite}-success.txt` for every suite it ran. Only the
//! existence of these objects matters, never their content.

use futures::future::join_all;

use crate::models::suite::{SuiteOutcome, TestSuiteStatus};
use crate::services::store::{ObjectStore, StoreError};

/// Result of probing one sentinel key.
#[derive(Debug)]
pub enum Probe {
    Found,
    NotFound,
    Failed(StoreError),
}

pub async fn probe(store: &dyn ObjectStore, key: &str) -> Probe {
    match store.exists(key).await {
        Ok(true) => Probe::Found,
        Ok(false) => Probe::NotFound,
        Err(e) => Probe::Failed(e),
    }
}

pub fn failure_key(build_id: &str, suite: &str) -> String {
    format!("{build_id}/tests/{suite}-failure.txt")
}

pub fn success_key(build_id: &str, suite: &str) -> String {
    format!("{build_id}/tests/{suite}-success.txt")
}

/// Resolve one suite. A failure sentinel wins over a success sentinel.
/// Probe errors are logged and then treated like a missing sentinel.
pub async fn resolve_suite(store: &dyn ObjectStore, build_id: &str, suite: &str) -> TestSuiteStatus {
    let outcome = match probe(store, &failure_key(build_id, suite)).await {
        Probe::Found => SuiteOutcome::Failure,
        failure_probe => {
            log_probe_error(build_id, suite, "failure", failure_probe);
            match probe(store, &success_key(build_id, suite)).await {
                Probe::Found => SuiteOutcome::Success,
                success_probe => {
                    log_probe_error(build_id, suite, "success", success_probe);
                    tracing::info!(
                        build_id,
                        suite,
                        "neither success nor failure sentinel found, suite was not run"
                    );
                    SuiteOutcome::NotRun
                }
            }
        }
    };

    crate::metrics::suite_probed(outcome.as_str());
    TestSuiteStatus::new(suite, outcome)
}

/// Resolve every configured suite concurrently. Output order follows `suites`.
pub async fn resolve_suites(
    store: &dyn ObjectStore,
    build_id: &str,
    suites: &[String],
) -> Vec<TestSuiteStatus> {
    join_all(suites.iter().map(|suite| resolve_suite(store, build_id, suite))).await
}

fn log_probe_error(build_id: &str, suite: &str, sentinel: &str, probe: Probe) {
    if let Probe::Failed(e) = probe {
        tracing::warn!(
            build_id,
            suite,
            sentinel,
            error = %e,
            "sentinel probe failed, treating as not found"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::testing::MemoryStore;

    fn suites(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn failure_sentinel_takes_precedence() {
        let store = MemoryStore::with_keys(&[
            "b-1/tests/unit-failure.txt",
            "b-1/tests/unit-success.txt",
        ]);
        let status = resolve_suite(&store, "b-1", "unit").await;
        assert_eq!(status.outcome, SuiteOutcome::Failure);
        assert_eq!(status.display_color(), Some("danger"));
    }

    #[tokio::test]
    async fn success_sentinel_alone_is_success() {
        let store = MemoryStore::with_keys(&["b-1/tests/unit-success.txt"]);
        let status = resolve_suite(&store, "b-1", "unit").await;
        assert_eq!(status.outcome, SuiteOutcome::Success);
        assert_eq!(status.display_color(), Some("good"));
    }

    #[tokio::test]
    async fn no_sentinels_means_not_run() {
        let store = MemoryStore::default();
        let status = resolve_suite(&store, "b-1", "unit").await;
        assert_eq!(status.outcome, SuiteOutcome::NotRun);
        assert_eq!(status.display_color(), None);
        assert!(!status.ran());
    }

    #[tokio::test]
    async fn probe_errors_do_not_abort_other_suites() {
        let mut store = MemoryStore::with_keys(&[
            "b-1/tests/integration-success.txt",
            "b-1/tests/docs-success.txt",
        ]);
        store.broken.insert("b-1/tests/unit-failure.txt".into());
        store.broken.insert("b-1/tests/unit-success.txt".into());
        store.broken.insert("b-1/tests/docs-failure.txt".into());

        let statuses = resolve_suites(&store, "b-1", &suites(&["unit", "integration", "docs"])).await;
        assert_eq!(
            statuses,
            vec![
                TestSuiteStatus::new("unit", SuiteOutcome::NotRun),
                TestSuiteStatus::new("integration", SuiteOutcome::Success),
                TestSuiteStatus::new("docs", SuiteOutcome::Success),
            ]
        );
    }

    #[tokio::test]
    async fn output_follows_configured_order() {
        let store = MemoryStore::with_keys(&[
            "b-1/tests/python3-failure.txt",
            "b-1/tests/python2-success.txt",
        ]);
        let names: Vec<_> = resolve_suites(&store, "b-1", &suites(&["python3", "mysql", "python2"]))
            .await
            .into_iter()
            .map(|s| (s.suite_name, s.outcome))
            .collect();
        assert_eq!(
            names,
            vec![
                ("python3".to_string(), SuiteOutcome::Failure),
                ("mysql".to_string(), SuiteOutcome::NotRun),
                ("python2".to_string(), SuiteOutcome::Success),
            ]
        );
    }
}
