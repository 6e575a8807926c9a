//! Per-event notification pipeline.
//!
//! decode → archive → filter → (suite statuses | docs probe | commit lookup) → compose → deliver.
//! Every invocation is independent; the collaborators are shared handles
//! carrying connection config only.

use std::sync::Arc;
use std::time::Duration;

use crate::events::{decode_event, BuildEvent, BuildStatus, DecodeError, DecodedEvent};
use crate::models::commit::CommitInfo;
use crate::services::filter_service::{Admitted, NotificationFilter, SkipReason};
use crate::services::github_service::CommitLookup;
use crate::services::message_service::MessageComposer;
use crate::services::slack_service::{DeliveryError, DeliverySink};
use crate::services::store::ObjectStore;
use crate::services::suite_service;

/// Static notifier settings, resolved from the CLI/environment.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub bucket: String,
    pub expected_repo: String,
    pub interesting_statuses: Vec<BuildStatus>,
    pub test_suites: Vec<String>,
    pub github_org: Option<String>,
    pub deadline: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    Skipped(SkipReason),
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error(transparent)]
    MalformedPayload(#[from] DecodeError),
    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
    #[error("invocation exceeded its {0:?} deadline")]
    DeadlineExceeded(Duration),
}

impl NotifyError {
    pub fn kind(&self) -> &'static str {
        match self {
            NotifyError::MalformedPayload(_) => "malformed_payload",
            NotifyError::Delivery(_) => "delivery",
            NotifyError::DeadlineExceeded(_) => "deadline",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notifier {
    config: NotifierConfig,
    filter: NotificationFilter,
    composer: MessageComposer,
    store: Arc<dyn ObjectStore>,
    commits: Arc<dyn CommitLookup>,
    sink: Arc<dyn DeliverySink>,
}

impl Notifier {
    pub fn new(
        config: NotifierConfig,
        store: Arc<dyn ObjectStore>,
        commits: Arc<dyn CommitLookup>,
        sink: Arc<dyn DeliverySink>,
    ) -> Self {
        let filter = NotificationFilter::new(
            config.interesting_statuses.clone(),
            config.expected_repo.clone(),
        );
        let composer = MessageComposer::new(config.bucket.clone(), config.github_org.clone());
        Self {
            config,
            filter,
            composer,
            store,
            commits,
            sink,
        }
    }

    /// Handle the base64 `data` of one Pub/Sub message.
    pub async fn handle(&self, data: &str) -> Result<Outcome, NotifyError> {
        crate::metrics::event_received();
        let decoded = decode_event(data).map_err(|e| {
            tracing::error!("Dropping undecodable build event: {e}");
            crate::metrics::failure("malformed_payload");
            NotifyError::from(e)
        })?;
        self.handle_event(decoded).await
    }

    /// Handle an already decoded event, bounded by the invocation deadline.
    pub async fn handle_event(&self, decoded: DecodedEvent) -> Result<Outcome, NotifyError> {
        let build_id = decoded.event.id.clone();
        let result = match tokio::time::timeout(self.config.deadline, self.process(&decoded)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::DeadlineExceeded(self.config.deadline)),
        };

        match &result {
            Ok(Outcome::Delivered) => {
                tracing::info!(build_id = %build_id, "Notification delivered");
                crate::metrics::notification_delivered();
            }
            Ok(Outcome::Skipped(reason)) => {
                self.log_skip(&decoded.event, reason);
                crate::metrics::event_skipped(reason.code());
            }
            Err(e) => {
                tracing::error!(build_id = %build_id, kind = e.kind(), "Notification failed: {e}");
                crate::metrics::failure(e.kind());
            }
        }
        result
    }

    async fn process(&self, decoded: &DecodedEvent) -> Result<Outcome, NotifyError> {
        let event = &decoded.event;
        tracing::info!(build_id = %event.id, status = %event.status, "Processing build event");

        self.archive(decoded).await;

        let admitted = match self.filter.decide(event) {
            Ok(admitted) => admitted,
            Err(reason) => return Ok(Outcome::Skipped(reason)),
        };

        let (suites, docs_available, commit) = tokio::join!(
            suite_service::resolve_suites(self.store.as_ref(), &event.id, &self.config.test_suites),
            self.docs_available(&event.id),
            self.enrich(event, &admitted),
        );

        let message = self
            .composer
            .compose(event, &admitted, &suites, commit.as_ref(), docs_available);
        self.sink.deliver(&message).await?;
        Ok(Outcome::Delivered)
    }

    /// Store the raw event next to the build's artifacts. Best effort.
    async fn archive(&self, decoded: &DecodedEvent) {
        let key = format!("{}/build_resource.json", decoded.event.id);
        match self
            .store
            .put(&key, decoded.raw.clone().into_bytes(), "application/json")
            .await
        {
            Ok(()) => tracing::info!(
                build_id = %decoded.event.id,
                "Build resource saved at https://storage.googleapis.com/{}/{key}",
                self.config.bucket
            ),
            Err(e) => tracing::warn!(
                build_id = %decoded.event.id,
                error = %e,
                "Failed to archive build resource"
            ),
        }
    }

    async fn docs_available(&self, build_id: &str) -> bool {
        match self.store.exists(&MessageComposer::docs_key(build_id)).await {
            Ok(true) => true,
            Ok(false) => {
                tracing::debug!(build_id, "Documentation index is missing, skipping link");
                false
            }
            Err(e) => {
                tracing::warn!(build_id, error = %e, "Documentation probe failed, skipping link");
                false
            }
        }
    }

    async fn enrich(&self, event: &BuildEvent, admitted: &Admitted) -> Option<CommitInfo> {
        let org = self.config.github_org.as_deref()?;
        if !event.repo.is_substitution_form() {
            return None;
        }
        let sha = event.repo.commit_sha()?;

        match self.commits.commit(org, &admitted.repo_name, sha).await {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(
                    build_id = %event.id,
                    error = %e,
                    "Commit metadata unavailable, sending without it"
                );
                crate::metrics::failure("enrichment");
                None
            }
        }
    }

    fn log_skip(&self, event: &BuildEvent, reason: &SkipReason) {
        let build_id = event.id.as_str();
        match reason {
            SkipReason::UnparseableStatus(raw) => {
                tracing::info!(build_id, status = %raw, reason = reason.code(), "Skipping notification: unparseable status");
            }
            SkipReason::UninterestingStatus(status) => {
                let interesting: Vec<&str> =
                    self.filter.interesting().iter().map(BuildStatus::as_str).collect();
                tracing::info!(
                    build_id,
                    status = %status,
                    reason = reason.code(),
                    "Skipping notification of not interesting state. Interesting states: {}",
                    interesting.join(",")
                );
            }
            SkipReason::RepoMismatch { found } => {
                tracing::info!(
                    build_id,
                    repo = found.as_deref().unwrap_or("<none>"),
                    expected = %self.config.expected_repo,
                    reason = reason.code(),
                    "Skipping notification for a different repo"
                );
            }
        }
    }
}
