//! Artifacts bucket access — existence probes and the build-resource archive.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

mod gcs;
mod local;

pub use gcs::{GcsObjectStore, TokenSource};
pub use local::LocalObjectStore;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("cloud storage request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("cloud storage returned {status} for {key}")]
    Status {
        key: String,
        status: reqwest::StatusCode,
    },
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ObjectStore: Debug + Send + Sync {
    /// `Ok(false)` only when the object is definitely absent.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StoreError>;
}

/// Creates the object store for a `gs://bucket/` or `file:///dir/` URI.
/// Validates the URI shape but does not contact the store. `gcs_api` replaces
/// the Cloud Storage endpoint, e.g. with an emulator.
pub fn init_object_store(
    uri: &url::Url,
    tokens: TokenSource,
    gcs_api: Option<&str>,
) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match uri.scheme() {
        "gs" => {
            let bucket = uri
                .host_str()
                .filter(|b| !b.is_empty())
                .ok_or_else(|| anyhow::anyhow!("invalid store uri '{uri}': missing bucket"))?;
            let store = GcsObjectStore::new(bucket, tokens)?;
            match gcs_api {
                Some(base) => Arc::new(store.with_base_url(base)),
                None => Arc::new(store),
            }
        }
        "file" => Arc::new(LocalObjectStore::new(uri.path())),
        other => anyhow::bail!("invalid store uri '{uri}': unsupported scheme '{other}'"),
    };
    Ok(store)
}
