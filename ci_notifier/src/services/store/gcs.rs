use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::StatusCode;
use tokio::sync::Mutex;

use super::{ObjectStore, StoreError};

const API_BASE: &str = "https://storage.googleapis.com";
const METADATA_HOST: &str = "metadata.google.internal";
const METADATA_TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

// Tokens are refreshed this long before the metadata server says they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
// After a failed metadata fetch, requests stay anonymous this long.
const TOKEN_RETRY_AFTER: Duration = Duration::from_secs(300);

/// Where bearer tokens for the storage API come from.
#[derive(Debug, Clone)]
pub enum TokenSource {
    Static(String),
    /// Token endpoint of the GCE/Cloud Run metadata server for the runtime
    /// service account.
    Metadata(String),
    Anonymous,
}

impl TokenSource {
    /// The metadata server at `host`, or at its well-known name.
    pub fn metadata_server(host: Option<&str>) -> Self {
        let host = host.filter(|h| !h.is_empty()).unwrap_or(METADATA_HOST);
        TokenSource::Metadata(format!("http://{host}{METADATA_TOKEN_PATH}"))
    }
}

#[derive(serde::Deserialize)]
struct MetadataToken {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

struct CachedToken {
    token: Option<String>,
    valid_until: Instant,
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("anonymous", &self.token.is_none())
            .field("valid_until", &self.valid_until)
            .finish()
    }
}

// Google Cloud Storage over its JSON API.
#[derive(Debug)]
pub struct GcsObjectStore {
    client: reqwest::Client,
    bucket: String,
    api_base: String,
    tokens: TokenSource,
    cached: Mutex<Option<CachedToken>>,
}

impl GcsObjectStore {
    pub fn new(bucket: &str, tokens: TokenSource) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent("ci-notifier")
            .build()?;
        Ok(Self {
            client,
            bucket: bucket.to_string(),
            api_base: API_BASE.to_string(),
            tokens,
            cached: Mutex::new(None),
        })
    }

    /// Point the store at another JSON API endpoint, such as an emulator.
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.api_base,
            self.bucket,
            utf8_percent_encode(key, NON_ALPHANUMERIC)
        )
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/storage/v1/b/{}/o", self.api_base, self.bucket)
    }

    async fn bearer(&self) -> Option<String> {
        match &self.tokens {
            TokenSource::Static(token) => Some(token.clone()),
            TokenSource::Anonymous => None,
            TokenSource::Metadata(url) => {
                // Held across the fetch so concurrent lookups share one request.
                let mut cached = self.cached.lock().await;
                if let Some(entry) = cached.as_ref() {
                    if Instant::now() < entry.valid_until {
                        return entry.token.clone();
                    }
                }

                let entry = match self.fetch_metadata_token(url).await {
                    Ok(fetched) => {
                        let lifetime = Duration::from_secs(fetched.expires_in)
                            .saturating_sub(TOKEN_REFRESH_MARGIN);
                        CachedToken {
                            token: Some(fetched.access_token),
                            valid_until: Instant::now() + lifetime,
                        }
                    }
                    Err(e) => {
                        tracing::debug!("metadata token unavailable, using anonymous access: {e}");
                        CachedToken {
                            token: None,
                            valid_until: Instant::now() + TOKEN_RETRY_AFTER,
                        }
                    }
                };
                let token = entry.token.clone();
                *cached = Some(entry);
                token
            }
        }
    }

    async fn fetch_metadata_token(&self, url: &str) -> Result<MetadataToken, reqwest::Error> {
        self.client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?
            .error_for_status()?
            .json::<MetadataToken>()
            .await
    }

    fn authorize(&self, req: reqwest::RequestBuilder, token: Option<String>) -> reqwest::RequestBuilder {
        match token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let token = self.bearer().await;
        let resp = self
            .authorize(self.client.get(self.object_url(key)), token)
            .query(&[("fields", "name")])
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(StoreError::Status {
                key: key.to_string(),
                status,
            }),
        }
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StoreError> {
        let token = self.bearer().await;
        let resp = self
            .authorize(self.client.post(self.upload_url()), token)
            .query(&[("uploadType", "media"), ("name", key)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(StoreError::Status {
                key: key.to_string(),
                status: resp.status(),
            });
        }
        Ok(())
    }
}
