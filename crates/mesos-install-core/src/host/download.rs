//! HTTP downloads of package archives.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;
use url::Url;

/// Fetches a remote file onto the host.
pub trait Downloader {
    /// Download `url` to `dest`, returning the number of bytes written.
    fn download(&self, url: &Url, dest: &Path) -> anyhow::Result<u64>;
}

/// Downloads over HTTP with reqwest.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    user_agent: String,
}

impl HttpDownloader {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }

    /// Stream the response body into `partial` chunk by chunk.
    async fn fetch_into(&self, url: &Url, partial: &Path) -> anyhow::Result<u64> {
        let client = reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .build()
            .context("Failed to build HTTP client")?;

        let mut response = client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Failed to download {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to download: HTTP {} from {}", response.status(), url);
        }

        let mut file = File::create(partial)
            .with_context(|| format!("Failed to create file: {}", partial.display()))?;
        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .with_context(|| format!("Failed to read response body from {}", url))?
        {
            file.write_all(&chunk)
                .with_context(|| format!("Failed to write file: {}", partial.display()))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .with_context(|| format!("Failed to write file: {}", partial.display()))?;

        Ok(written)
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &Url, dest: &Path) -> anyhow::Result<u64> {
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| anyhow::anyhow!("Failed to create tokio runtime: {}", e))?;

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let partial = partial_path(dest);
        let written = match runtime.block_on(self.fetch_into(url, &partial)) {
            Ok(written) => written,
            Err(err) => {
                let _ = std::fs::remove_file(&partial);
                return Err(err);
            }
        };

        std::fs::rename(&partial, dest)
            .with_context(|| format!("Failed to move {} into place", dest.display()))?;
        info!(url = %url, dest = %dest.display(), bytes = written, "downloaded");
        Ok(written)
    }
}

/// Write `bytes` next to `dest` and rename into place.
///
/// An interrupted download never leaves a truncated file at `dest`.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let partial = partial_path(dest);
    std::fs::write(&partial, bytes)
        .with_context(|| format!("Failed to write file: {}", partial.display()))?;
    std::fs::rename(&partial, dest)
        .with_context(|| format!("Failed to move {} into place", dest.display()))?;
    Ok(())
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}
