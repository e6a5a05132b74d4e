//! Document sources: the feed web API or a directory of saved documents.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::config::FeedSettings;
use crate::query::{build_url, redacted_url, FeedQuery, Period};

/// Something that can produce the raw document for a query.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch the document bytes for `query`.
    async fn fetch(&self, query: &FeedQuery) -> Result<Bytes>;

    /// Short name for logs.
    fn describe(&self) -> String;
}

/// Fetches documents from the feed web API.
pub struct HttpSource {
    client: Client,
    endpoint: String,
    token: String,
    period: Period,
}

impl HttpSource {
    pub fn new(endpoint: String, token: String, period: Period, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            token,
            period,
        })
    }

    pub fn from_settings(settings: &FeedSettings) -> Result<Self> {
        Self::new(
            settings.endpoint.clone(),
            settings.token.clone(),
            settings.period,
            settings.timeout,
        )
    }
}

#[async_trait]
impl DocumentSource for HttpSource {
    #[instrument(skip(self, query), fields(query = %query.name))]
    async fn fetch(&self, query: &FeedQuery) -> Result<Bytes> {
        let url = build_url(&self.endpoint, query, &self.period, &self.token)?;
        let shown = redacted_url(&self.endpoint, query, &self.period)?;
        debug!(url = %shown, "Requesting document");

        // reqwest errors carry the request URL, token included.
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Request failed for query '{}' ({})", query.name, shown))?;

        // Error acknowledgements may arrive with a 4xx status; they still parse.
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Failed to read response for query '{}' ({})", query.name, shown))?;
        if !status.is_success() && bytes.is_empty() {
            return Err(anyhow!("Download failed for query '{}': {}", query.name, status));
        }
        if bytes.is_empty() {
            return Err(anyhow!("Empty response for query '{}'", query.name));
        }

        info!(query = %query.name, status = %status, size = bytes.len(), "Downloaded document");
        Ok(bytes)
    }

    fn describe(&self) -> String {
        format!("http:{}", self.endpoint)
    }
}

/// Reads `<dir>/<query name>.xml`. Used for offline runs and tests.
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, query: &FeedQuery) -> PathBuf {
        self.dir.join(format!("{}.xml", query.name))
    }
}

#[async_trait]
impl DocumentSource for DirectorySource {
    async fn fetch(&self, query: &FeedQuery) -> Result<Bytes> {
        let path = self.path_for(query);
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read document {:?}", path))?;
        debug!(path = %path.display(), size = data.len(), "Read document");
        Ok(Bytes::from(data))
    }

    fn describe(&self) -> String {
        format!("dir:{}", self.dir.display())
    }
}
