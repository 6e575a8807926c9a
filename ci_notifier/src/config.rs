//! Notifier configuration — flags, each backed by an environment variable.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;

use crate::events::BuildStatus;
use crate::services::github_service::{CommitLookup, GithubCommits, NoEnrichment};
use crate::services::notify_service::{Notifier, NotifierConfig};
use crate::services::slack_service::{DeliverySink, SlackWebhook, StdoutSink};
use crate::services::store::{init_object_store, TokenSource};

#[derive(Args, Clone, Debug)]
pub struct NotifierArgs {
    /// Bucket holding build artifacts, logs and test sentinels
    #[arg(long, env = "GCS_BUCKET")]
    pub bucket: String,

    /// Object store root; defaults to gs://<bucket>/
    #[arg(long, env = "STORE_URI")]
    pub store_uri: Option<url::Url>,

    /// Static bearer token for the storage API; the metadata server is used otherwise
    #[arg(long, env = "GCS_ACCESS_TOKEN", hide_env_values = true)]
    pub gcs_access_token: Option<String>,

    /// Cloud Storage emulator, as `host:port` or a URL
    #[arg(long, env = "STORAGE_EMULATOR_HOST")]
    pub storage_emulator_host: Option<String>,

    /// Metadata server `host:port` used for storage tokens
    #[arg(long, env = "GCE_METADATA_HOST")]
    pub metadata_host: Option<String>,

    /// Only builds of this repository are announced
    #[arg(long, env = "REPO_NAME")]
    pub repo_name: String,

    /// Cloud project owning the bucket
    #[arg(long, env = "PROJECT_ID", default_value = "")]
    pub project_id: String,

    /// Slack incoming-webhook URL; messages are printed when unset
    #[arg(long, env = "SLACK_HOOK", hide_env_values = true)]
    pub slack_hook: Option<String>,

    /// Whitespace-separated, ordered test suite names
    #[arg(long, env = "TEST_SUITES", default_value = "")]
    pub test_suites: String,

    /// GitHub organization used for commit lookups and links
    #[arg(long, env = "GITHUB_ORGANIZATION")]
    pub github_organization: Option<String>,

    /// GitHub REST API root, for GitHub Enterprise
    #[arg(long, env = "GITHUB_API_URL")]
    pub github_api_url: Option<String>,

    /// GitHub token for commit lookups
    #[arg(long, env = "GITHUB_TOKEN", default_value = "", hide_env_values = true)]
    pub github_token: String,

    /// Whitespace-separated statuses that trigger a notification
    /// [default: SUCCESS FAILURE INTERNAL_ERROR TIMEOUT]
    #[arg(long, env = "INTERESTING_STATUSES")]
    pub interesting_statuses: Option<String>,

    /// Upper bound on handling one event, in seconds
    #[arg(long, env = "INVOCATION_DEADLINE_SECS", default_value = "60")]
    pub deadline_secs: u64,

    /// Print messages instead of posting them to Slack
    #[arg(long)]
    pub dry_run: bool,
}

pub fn split_words(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

impl NotifierArgs {
    pub fn notifier_config(&self) -> NotifierConfig {
        NotifierConfig {
            bucket: self.bucket.clone(),
            expected_repo: self.repo_name.clone(),
            interesting_statuses: self.interesting_statuses(),
            test_suites: split_words(&self.test_suites),
            github_org: self
                .github_organization
                .clone()
                .filter(|org| !org.is_empty()),
            deadline: Duration::from_secs(self.deadline_secs),
        }
    }

    /// Configured statuses, or the default set when none are given.
    fn interesting_statuses(&self) -> Vec<BuildStatus> {
        let statuses: Vec<BuildStatus> = self
            .interesting_statuses
            .as_deref()
            .map(split_words)
            .unwrap_or_default()
            .into_iter()
            .map(BuildStatus::from)
            .collect();
        if statuses.is_empty() {
            BuildStatus::DEFAULT_INTERESTING.to_vec()
        } else {
            statuses
        }
    }

    fn storage_api_base(&self) -> Option<String> {
        let host = self.storage_emulator_host.as_deref().filter(|h| !h.is_empty())?;
        if host.contains("://") {
            Some(host.to_string())
        } else {
            Some(format!("http://{host}"))
        }
    }

    /// Construct the notifier and its collaborators. Nothing is contacted yet.
    pub fn build_notifier(&self) -> anyhow::Result<Notifier> {
        let config = self.notifier_config();

        for status in &config.interesting_statuses {
            if !status.is_recognized() {
                tracing::warn!("INTERESTING_STATUSES contains unknown status '{status}'");
            }
        }
        if config.test_suites.is_empty() {
            tracing::warn!("TEST_SUITES not set -- no per-suite results will be reported");
        }

        let store_uri = match &self.store_uri {
            Some(uri) => uri.clone(),
            None => url::Url::parse(&format!("gs://{}/", self.bucket))?,
        };
        let gcs_api = self.storage_api_base();
        let tokens = match (&self.gcs_access_token, &gcs_api) {
            (Some(token), _) if !token.is_empty() => TokenSource::Static(token.clone()),
            (_, Some(base)) => {
                tracing::warn!("using Cloud Storage emulator at {base} without credentials");
                TokenSource::Anonymous
            }
            _ => TokenSource::metadata_server(self.metadata_host.as_deref()),
        };
        let store = init_object_store(&store_uri, tokens, gcs_api.as_deref())?;

        let commits: Arc<dyn CommitLookup> = if config.github_org.is_some() {
            let github = GithubCommits::new(self.github_token.clone())?;
            match self.github_api_url.as_deref().filter(|u| !u.is_empty()) {
                Some(api) => Arc::new(github.with_base_url(api)),
                None => Arc::new(github),
            }
        } else {
            tracing::warn!("GITHUB_ORGANIZATION not set -- commit enrichment disabled");
            Arc::new(NoEnrichment)
        };

        let sink: Arc<dyn DeliverySink> = match &self.slack_hook {
            _ if self.dry_run => Arc::new(StdoutSink),
            Some(hook) if !hook.is_empty() => Arc::new(SlackWebhook::new(hook.clone())?),
            _ => {
                tracing::warn!("SLACK_HOOK not set -- notifications will be printed to stdout");
                Arc::new(StdoutSink)
            }
        };

        tracing::info!(
            bucket = %config.bucket,
            store = %store_uri,
            project = %self.project_id,
            repo = %config.expected_repo,
            suites = ?config.test_suites,
            "Notifier configured"
        );

        Ok(Notifier::new(config, store, commits, sink))
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: NotifierArgs,
    }

    fn parse(extra: &[&str]) -> NotifierArgs {
        let mut argv = vec!["ci-notifier", "--bucket", "artifacts", "--repo-name", "airflow"];
        argv.extend_from_slice(extra);
        TestCli::parse_from(argv).args
    }

    #[test]
    fn suites_keep_their_order() {
        let args = parse(&["--test-suites", "python3  mysql\tpython2"]);
        assert_eq!(
            args.notifier_config().test_suites,
            vec!["python3", "mysql", "python2"]
        );
    }

    #[test]
    fn default_interesting_statuses() {
        let args = parse(&[]);
        assert_eq!(
            args.notifier_config().interesting_statuses,
            BuildStatus::DEFAULT_INTERESTING.to_vec()
        );
    }

    #[test]
    fn blank_interesting_statuses_fall_back_to_defaults() {
        let args = parse(&["--interesting-statuses", "  "]);
        assert_eq!(
            args.notifier_config().interesting_statuses,
            BuildStatus::DEFAULT_INTERESTING.to_vec()
        );

        let args = parse(&["--interesting-statuses", "FAILURE CANCELLED"]);
        assert_eq!(
            args.notifier_config().interesting_statuses,
            vec![BuildStatus::Failure, BuildStatus::Cancelled]
        );
    }

    #[test]
    fn emulator_host_gains_a_scheme() {
        assert_eq!(parse(&[]).storage_api_base(), None);
        assert_eq!(
            parse(&["--storage-emulator-host", "localhost:9023"]).storage_api_base(),
            Some("http://localhost:9023".to_string())
        );
        assert_eq!(
            parse(&["--storage-emulator-host", "https://gcs.test"]).storage_api_base(),
            Some("https://gcs.test".to_string())
        );
    }

    #[test]
    fn empty_organization_disables_enrichment() {
        let args = parse(&["--github-organization", ""]);
        assert_eq!(args.notifier_config().github_org, None);
    }

    #[test]
    fn local_store_and_dry_run_build() {
        let dir = tempfile::TempDir::new().unwrap();
        let uri = format!("file://{}/", dir.path().display());
        let args = parse(&["--store-uri", uri.as_str(), "--dry-run"]);
        assert!(args.build_notifier().is_ok());
    }
}
