use super::{parse_index, ArtifactHandle, PackageDescriptor, PackageIndex};
use crate::retry::{is_retryable_http_error, with_retry_if, RetryConfig, UnexpectedStatus};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Longest silence tolerated while a download is streaming
const DOWNLOAD_STALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Package index served over HTTP as a JSON document.
///
/// The configured timeout bounds connecting and the whole index fetch. Artifact
/// downloads have no overall deadline; they fail only when the connection
/// stalls for longer than `DOWNLOAD_STALL_TIMEOUT`.
#[derive(Debug, Clone)]
pub struct HttpPackageIndex {
    client: reqwest::Client,
    index_url: String,
    index_timeout: Duration,
    downloads_dir: PathBuf,
    index_retry: RetryConfig,
    download_retry: RetryConfig,
    packages: Vec<PackageDescriptor>,
}

impl HttpPackageIndex {
    pub fn new(index_url: impl Into<String>, downloads_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_timeout(index_url, downloads_dir, Duration::from_secs(60))
    }

    pub fn with_timeout(
        index_url: impl Into<String>,
        downloads_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(DOWNLOAD_STALL_TIMEOUT)
            .user_agent(concat!("offline-translator/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            index_url: index_url.into(),
            index_timeout: timeout,
            downloads_dir: downloads_dir.into(),
            index_retry: RetryConfig::index_fetch(),
            download_retry: RetryConfig::download(),
            packages: Vec::new(),
        })
    }

    /// Override the retry behavior for index fetches and downloads
    pub fn with_retry(mut self, index_retry: RetryConfig, download_retry: RetryConfig) -> Self {
        self.index_retry = index_retry;
        self.download_retry = download_retry;
        self
    }

    /// Send a GET, turning non-success statuses into [`UnexpectedStatus`]
    async fn get(&self, url: &str, timeout: Option<Duration>) -> Result<reqwest::Response> {
        let mut request = self.client.get(url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        if !response.status().is_success() {
            return Err(UnexpectedStatus {
                url: url.to_string(),
                status: response.status(),
            }
            .into());
        }
        Ok(response)
    }

    async fn fetch_index(&self) -> Result<Vec<PackageDescriptor>> {
        let body = self
            .get(&self.index_url, Some(self.index_timeout))
            .await?
            .bytes()
            .await
            .with_context(|| format!("Failed to read response body from {}", self.index_url))?;
        let text = String::from_utf8(body.to_vec()).context("Package index is not valid UTF-8")?;
        parse_index(&text)
    }

    /// Stream `url` into `path` chunk by chunk, returning the bytes written
    async fn save_to(&self, url: &str, path: &Path) -> Result<u64> {
        let mut response = self.get(url, None).await?;
        let mut file = tokio::fs::File::create(path)
            .await
            .with_context(|| format!("Failed to create {}", path.display()))?;

        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .with_context(|| format!("Download from {} interrupted", url))?
        {
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(written)
    }

    fn artifact_path(&self, descriptor: &PackageDescriptor) -> PathBuf {
        let (from, to) = descriptor.pair.codes();
        let version = descriptor.package_version.as_deref().unwrap_or("latest");
        self.downloads_dir.join(format!(
            "translate-{}_{}-{}.argosmodel",
            sanitize(from),
            sanitize(to),
            sanitize(version)
        ))
    }
}

impl PackageIndex for HttpPackageIndex {
    async fn refresh_index(&mut self) -> Result<()> {
        info!("Refreshing package index from {}", self.index_url);

        let packages = with_retry_if(
            &self.index_retry,
            "Package index fetch",
            || self.fetch_index(),
            is_retryable_http_error,
        )
        .await
        .context("Failed to refresh package index")?;

        info!("Package index lists {} translation packages", packages.len());
        self.packages = packages;
        Ok(())
    }

    fn available_packages(&self) -> Vec<PackageDescriptor> {
        self.packages.clone()
    }

    async fn download(&self, descriptor: &PackageDescriptor) -> Result<ArtifactHandle> {
        let name = descriptor.display_name();
        let link = descriptor
            .links
            .first()
            .with_context(|| format!("Package {} has no download link", name))?;

        tokio::fs::create_dir_all(&self.downloads_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to create download directory {}",
                    self.downloads_dir.display()
                )
            })?;

        let path = self.artifact_path(descriptor);
        info!("Downloading {} from {}", name, link);
        let written = with_retry_if(
            &self.download_retry,
            &format!("Download {}", name),
            || self.save_to(link, &path),
            is_retryable_http_error,
        )
        .await
        .with_context(|| format!("Failed to download {}", name))?;

        debug!("Saved {} bytes to {}", written, path.display());

        Ok(ArtifactHandle {
            path,
            pair: descriptor.pair.clone(),
            package_version: descriptor.package_version.clone(),
        })
    }
}

/// Keep codes from an untrusted index from escaping the target directory
pub(crate) fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
