use async_trait::async_trait;
use tracing::info;

use crate::{Error, Result};

pub const DEFAULT_ARCHIVE_EXTENSION: &str = ".zip";
const RECOGNIZED_EXTENSIONS: [&str; 2] = [".zip", ".tar.gz"];

/// Issues the reachability request for the artifact download URL.
#[async_trait]
pub trait ArtifactChecker: Send + Sync + 'static {
    /// HTTP status of a HEAD request against `url`.
    async fn head(&self, url: &str) -> Result<u16>;
}

pub struct HttpArtifactChecker {
    http: reqwest::Client,
}

impl HttpArtifactChecker {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for HttpArtifactChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactChecker for HttpArtifactChecker {
    async fn head(&self, url: &str) -> Result<u16> {
        let resp = self.http.head(url).send().await?;
        Ok(resp.status().as_u16())
    }
}

/// The URL actually fetched: `url` itself when it already ends in a
/// recognized archive extension, otherwise with `.zip` appended.
pub fn effective_url(url: &str) -> String {
    if RECOGNIZED_EXTENSIONS.iter().any(|ext| url.ends_with(ext)) {
        url.to_string()
    } else {
        format!("{url}{DEFAULT_ARCHIVE_EXTENSION}")
    }
}

pub async fn check_artifact_url(checker: &dyn ArtifactChecker, url: &str) -> Result<()> {
    let effective = effective_url(url);
    info!(event = "validating_artifact_url", url = %effective);

    match checker.head(&effective).await {
        Ok(status) if (200..300).contains(&status) => Ok(()),
        Ok(status) => Err(Error::InvalidConfiguration(format!(
            "Invalid artifact URL: {effective} (HTTP {status})"
        ))),
        Err(e) => Err(Error::InvalidConfiguration(format!(
            "Invalid artifact URL: {effective}: {e}"
        ))),
    }
}
