//! Slack message composition for admitted build events.
//!
//! Composition is pure: the same event, suite statuses and enrichment always
//! produce the same message.

use crate::events::BuildEvent;
use crate::models::commit::CommitInfo;
use crate::models::message::{Attachment, AttachmentField, NotificationMessage};
use crate::models::suite::TestSuiteStatus;
use crate::services::filter_service::Admitted;

const STORAGE_BASE: &str = "https://storage.googleapis.com";
const CONSOLE_BASE: &str = "https://console.cloud.google.com";

#[derive(Debug, Clone)]
pub struct MessageComposer {
    bucket: String,
    github_org: Option<String>,
}

impl MessageComposer {
    pub fn new(bucket: impl Into<String>, github_org: Option<String>) -> Self {
        Self {
            bucket: bucket.into(),
            github_org,
        }
    }

    pub fn docs_key(build_id: &str) -> String {
        format!("{build_id}/docs/index.html")
    }

    pub fn compose(
        &self,
        event: &BuildEvent,
        admitted: &Admitted,
        suites: &[TestSuiteStatus],
        commit: Option<&CommitInfo>,
        docs_available: bool,
    ) -> NotificationMessage {
        let mut attachments = vec![self.headline(event, admitted, commit, docs_available)];
        attachments.extend(
            suites
                .iter()
                .filter(|s| s.ran())
                .map(|s| self.suite_block(&event.id, s)),
        );

        NotificationMessage {
            text: summary_text(event, admitted, commit),
            mrkdwn: true,
            attachments,
        }
    }

    fn headline(
        &self,
        event: &BuildEvent,
        admitted: &Admitted,
        commit: Option<&CommitInfo>,
        docs_available: bool,
    ) -> Attachment {
        let id = &event.id;
        let project = &event.project_id;
        let bucket = &self.bucket;

        let mut fields = vec![
            AttachmentField::link(&format!("{STORAGE_BASE}/{bucket}/{id}/index.html"), "Summary page"),
            AttachmentField::link(
                &format!("{CONSOLE_BASE}/cloud-build/builds/{id}?project={project}"),
                "Google Cloud Build console",
            ),
            AttachmentField::link(
                &format!("{CONSOLE_BASE}/storage/browser/{bucket}/{id}/logs/?project={project}"),
                "Task logs in GCS",
            ),
            AttachmentField::link(
                &format!(
                    "{CONSOLE_BASE}/logs/viewer?authuser=0&project={project}&minLogLevel=0\
                     &expandAll=false&resource=build%2Fbuild_id%2F{id}"
                ),
                "Stackdriver logs",
            ),
        ];

        if docs_available {
            fields.push(AttachmentField::link(
                &format!("{STORAGE_BASE}/{bucket}/{}", Self::docs_key(id)),
                "Documentation",
            ));
        }

        // GitHub links only accompany a successful commit lookup.
        if let (Some(org), Some(commit)) = (&self.github_org, commit) {
            let repo = &admitted.repo_name;
            if let Some(branch) = event.repo.branch() {
                let url = format!("https://github.com/{org}/{repo}/tree/{branch}");
                fields.push(AttachmentField {
                    value: format!("Branch: <{url}| {branch}>"),
                    short: true,
                });
            }
            if let Some(sha) = event.repo.commit_sha() {
                let url = format!("https://github.com/{org}/{repo}/commit/{sha}");
                fields.push(AttachmentField::wide(format!(
                    "Commit: <{url}| {}>",
                    commit.headline()
                )));
            }
        }

        Attachment {
            color: Some(event.status.color().to_string()),
            fields,
            ..Default::default()
        }
    }

    fn suite_block(&self, build_id: &str, suite: &TestSuiteStatus) -> Attachment {
        let name = &suite.suite_name;
        Attachment {
            title: Some(format!("{name} tests [{}]", suite.outcome.as_str())),
            title_link: Some(format!(
                "{STORAGE_BASE}/{}/{build_id}/tests/{name}.xml.html",
                self.bucket
            )),
            color: suite.display_color().map(str::to_string),
            fields: Vec::new(),
        }
    }
}

fn summary_text(event: &BuildEvent, admitted: &Admitted, commit: Option<&CommitInfo>) -> String {
    let mut lines = vec![
        format!(
            "Build in project `{}` for repo: `{}`",
            event.project_id, admitted.repo_name
        ),
        format!("Status: `{}`", event.status),
    ];

    let repo = &event.repo;
    if repo.is_substitution_form() {
        if let Some(branch) = repo.branch() {
            lines.push(format!("Branch: `{branch}`"));
        }
        if let Some(tag) = repo.tag() {
            lines.push(format!("Tag: `{tag}`"));
        }
        if let Some(sha) = repo.commit_sha() {
            lines.push(format!("Commit SHA: `{sha}`"));
        }
    } else if let Some(git_ref) = repo.display_ref() {
        lines.push(format!("Ref: `{git_ref}`"));
    }

    if let Some(commit) = commit {
        lines.push(format!("Commit message: `{}`", commit.headline()));
        lines.push(format!("Committer: `{}`", commit.committer));
        lines.push(format!("Author: `{}`", commit.author));
    }

    lines.push(format!("Build id: `{}`", event.id));
    lines.join("\n ")
}
