//! Build event record as published by Cloud Build on the `cloud-builds` topic.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// A single build-status change. Decoded once per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEvent {
    pub id: String,
    #[serde(default)]
    pub status: BuildStatus,
    #[serde(rename = "projectId", default)]
    pub project_id: String,
    #[serde(flatten)]
    pub repo: RepoIdentity,
}

/// Cloud Build status. Values outside the known set are kept verbatim so the
/// filter can reject them without the decoder failing. A missing or non-string
/// status decodes as `Unrecognized` too.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub enum BuildStatus {
    Queued,
    Working,
    Success,
    Failure,
    InternalError,
    Timeout,
    Cancelled,
    Unrecognized(String),
}

impl BuildStatus {
    /// Statuses that trigger a notification unless configured otherwise.
    pub const DEFAULT_INTERESTING: [BuildStatus; 4] = [
        BuildStatus::Success,
        BuildStatus::Failure,
        BuildStatus::InternalError,
        BuildStatus::Timeout,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            BuildStatus::Queued => "QUEUED",
            BuildStatus::Working => "WORKING",
            BuildStatus::Success => "SUCCESS",
            BuildStatus::Failure => "FAILURE",
            BuildStatus::InternalError => "INTERNAL_ERROR",
            BuildStatus::Timeout => "TIMEOUT",
            BuildStatus::Cancelled => "CANCELLED",
            BuildStatus::Unrecognized(raw) => raw,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, BuildStatus::Unrecognized(_))
    }

    /// Slack attachment color for the headline block.
    pub fn color(&self) -> &'static str {
        match self {
            BuildStatus::Success => "good",
            BuildStatus::Failure | BuildStatus::InternalError | BuildStatus::Timeout => "danger",
            _ => "warning",
        }
    }
}

impl From<String> for BuildStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "QUEUED" => BuildStatus::Queued,
            "WORKING" => BuildStatus::Working,
            "SUCCESS" => BuildStatus::Success,
            "FAILURE" => BuildStatus::Failure,
            "INTERNAL_ERROR" => BuildStatus::InternalError,
            "TIMEOUT" => BuildStatus::Timeout,
            "CANCELLED" => BuildStatus::Cancelled,
            _ => BuildStatus::Unrecognized(raw),
        }
    }
}

impl From<BuildStatus> for String {
    fn from(status: BuildStatus) -> Self {
        match status {
            BuildStatus::Unrecognized(raw) => raw,
            other => other.as_str().to_string(),
        }
    }
}

impl Default for BuildStatus {
    fn default() -> Self {
        BuildStatus::Unrecognized(String::new())
    }
}

impl<'de> Deserialize<'de> for BuildStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
            Some(serde_json::Value::String(raw)) => BuildStatus::from(raw),
            Some(other) => BuildStatus::Unrecognized(other.to_string()),
            None => BuildStatus::default(),
        })
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the built source came from.
///
/// Trigger-started builds carry `substitutions`; builds submitted directly
/// against a Cloud Source repository carry `source.repoSource`. When both are
/// present the substitutions win. Events with neither decode as `Unspecified`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepoIdentity {
    Substitutions {
        substitutions: BTreeMap<String, String>,
    },
    Source {
        source: SourceSpec,
    },
    Unspecified {},
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    #[serde(rename = "repoSource")]
    pub repo_source: RepoSource,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
}

impl RepoIdentity {
    #[cfg(test)]
    pub fn substitutions(substitutions: BTreeMap<String, String>) -> Self {
        RepoIdentity::Substitutions { substitutions }
    }

    #[cfg(test)]
    pub fn repo_source(repo_source: RepoSource) -> Self {
        RepoIdentity::Source {
            source: SourceSpec { repo_source },
        }
    }

    pub fn repo_name(&self) -> Option<&str> {
        self.field("REPO_NAME", |s| s.repo_name.as_deref())
    }

    pub fn branch(&self) -> Option<&str> {
        self.field("BRANCH_NAME", |s| s.branch_name.as_deref())
    }

    pub fn tag(&self) -> Option<&str> {
        self.field("TAG_NAME", |s| s.tag_name.as_deref())
    }

    pub fn commit_sha(&self) -> Option<&str> {
        self.field("COMMIT_SHA", |s| s.commit_sha.as_deref())
    }

    /// First present of branch, tag, commit.
    pub fn display_ref(&self) -> Option<&str> {
        self.branch().or_else(|| self.tag()).or_else(|| self.commit_sha())
    }

    pub fn is_substitution_form(&self) -> bool {
        matches!(self, RepoIdentity::Substitutions { .. })
    }

    fn field<'a>(
        &'a self,
        key: &str,
        from_source: impl FnOnce(&'a RepoSource) -> Option<&'a str>,
    ) -> Option<&'a str> {
        let value = match self {
            RepoIdentity::Substitutions { substitutions } => {
                substitutions.get(key).map(String::as_str)
            }
            RepoIdentity::Source { source } => from_source(&source.repo_source),
            RepoIdentity::Unspecified {} => None,
        };
        // Cloud Build sends empty strings for unset substitutions.
        value.filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_is_kept_verbatim() {
        let status: BuildStatus = serde_json::from_str(r#""PENDING""#).unwrap();
        assert_eq!(status, BuildStatus::Unrecognized("PENDING".into()));
        assert!(!status.is_recognized());
        assert_eq!(serde_json::to_string(&status).unwrap(), r#""PENDING""#);
    }

    #[test]
    fn null_or_missing_status_is_unrecognized() {
        let null: BuildEvent = serde_json::from_value(serde_json::json!({
            "id": "b4",
            "status": null,
            "substitutions": {"REPO_NAME": "airflow"}
        }))
        .unwrap();
        assert_eq!(null.status, BuildStatus::Unrecognized(String::new()));

        let missing: BuildEvent = serde_json::from_value(serde_json::json!({
            "id": "b5",
            "substitutions": {"REPO_NAME": "airflow"}
        }))
        .unwrap();
        assert_eq!(missing.status, BuildStatus::Unrecognized(String::new()));
        assert_eq!(missing.repo.repo_name(), Some("airflow"));

        let numeric: BuildStatus = serde_json::from_str("3").unwrap();
        assert_eq!(numeric, BuildStatus::Unrecognized("3".into()));
    }

    #[test]
    fn status_colors() {
        assert_eq!(BuildStatus::Success.color(), "good");
        assert_eq!(BuildStatus::Failure.color(), "danger");
        assert_eq!(BuildStatus::InternalError.color(), "danger");
        assert_eq!(BuildStatus::Timeout.color(), "danger");
        assert_eq!(BuildStatus::Cancelled.color(), "warning");
    }

    #[test]
    fn substitutions_take_precedence_over_repo_source() {
        let event: BuildEvent = serde_json::from_value(serde_json::json!({
            "id": "b1",
            "status": "SUCCESS",
            "projectId": "proj",
            "substitutions": {"REPO_NAME": "airflow", "BRANCH_NAME": "master"},
            "source": {"repoSource": {"repoName": "other"}}
        }))
        .unwrap();

        assert!(event.repo.is_substitution_form());
        assert_eq!(event.repo.repo_name(), Some("airflow"));
        assert_eq!(event.repo.branch(), Some("master"));
    }

    #[test]
    fn repo_source_form_is_read() {
        let event: BuildEvent = serde_json::from_value(serde_json::json!({
            "id": "b2",
            "status": "FAILURE",
            "source": {"repoSource": {"repoName": "airflow", "tagName": "v1.10"}}
        }))
        .unwrap();

        assert!(!event.repo.is_substitution_form());
        assert_eq!(event.repo.repo_name(), Some("airflow"));
        assert_eq!(event.repo.branch(), None);
        assert_eq!(event.repo.display_ref(), Some("v1.10"));
        assert_eq!(event.project_id, "");
    }

    #[test]
    fn storage_source_decodes_as_unspecified() {
        let event: BuildEvent = serde_json::from_value(serde_json::json!({
            "id": "b3",
            "status": "SUCCESS",
            "source": {"storageSource": {"bucket": "b", "object": "o"}}
        }))
        .unwrap();

        assert_eq!(event.repo, RepoIdentity::Unspecified {});
        assert_eq!(event.repo.repo_name(), None);
    }

    #[test]
    fn empty_substitutions_read_as_absent() {
        let mut subs = BTreeMap::new();
        subs.insert("TAG_NAME".to_string(), String::new());
        subs.insert("COMMIT_SHA".to_string(), "abc123".to_string());
        let repo = RepoIdentity::substitutions(subs);

        assert_eq!(repo.tag(), None);
        assert_eq!(repo.display_ref(), Some("abc123"));
    }
}
