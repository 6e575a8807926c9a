//! Commit metadata fetched from the source-hosting API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub message: String,
    pub author: String,
    pub committer: String,
}

impl CommitInfo {
    pub fn headline(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}
