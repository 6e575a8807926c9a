//! GitHub integration — commit metadata used to enrich notifications.

use std::fmt::Debug;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use crate::models::commit::CommitInfo;

#[async_trait]
pub trait CommitLookup: Debug + Send + Sync {
    async fn commit(&self, owner: &str, repo: &str, sha: &str) -> anyhow::Result<CommitInfo>;
}

#[derive(Debug)]
pub struct GithubCommits {
    client: reqwest::Client,
    token: String,
    api_base: String,
}

impl GithubCommits {
    pub fn new(token: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            token: token.into(),
            api_base: "https://api.github.com".to_string(),
        })
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Deserialize)]
struct CommitResponse {
    commit: CommitBody,
}

#[derive(Deserialize)]
struct CommitBody {
    message: String,
    author: Option<Person>,
    committer: Option<Person>,
}

#[derive(Deserialize)]
struct Person {
    name: String,
}

impl From<CommitResponse> for CommitInfo {
    fn from(resp: CommitResponse) -> Self {
        let name = |p: Option<Person>| p.map(|p| p.name).unwrap_or_default();
        CommitInfo {
            message: resp.commit.message,
            author: name(resp.commit.author),
            committer: name(resp.commit.committer),
        }
    }
}

#[async_trait]
impl CommitLookup for GithubCommits {
    async fn commit(&self, owner: &str, repo: &str, sha: &str) -> anyhow::Result<CommitInfo> {
        let url = format!("{}/repos/{owner}/{repo}/commits/{sha}", self.api_base);

        let mut req = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "ci-notifier");
        if !self.token.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.token));
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("GitHub commit lookup failed: {status} {text}");
        }

        let body: CommitResponse = resp
            .json()
            .await
            .context("failed to decode GitHub commit response")?;
        Ok(body.into())
    }
}

/// Used when no GitHub organization is configured.
#[derive(Debug)]
pub struct NoEnrichment;

#[async_trait]
impl CommitLookup for NoEnrichment {
    async fn commit(&self, _: &str, _: &str, _: &str) -> anyhow::Result<CommitInfo> {
        anyhow::bail!("commit enrichment is disabled")
    }
}
