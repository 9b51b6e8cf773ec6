//! Feed download.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result, anyhow, bail};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::config::DownloadConfig;

/// Downloads `url` to `dest`, retrying up to `config.attempts` times.
///
/// A failed attempt never leaves a partial file behind. Non-success status
/// codes and empty bodies count as failures.
#[tracing::instrument(skip_all, fields(url = %url, dest = %dest.display(), attempts = config.attempts))]
pub async fn download_feed<C: HttpClient>(
    client: &C,
    url: &str,
    dest: &Path,
    config: &DownloadConfig,
) -> Result<PathBuf> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut last_error = None;
    for attempt in 1..=config.attempts {
        let started = std::time::Instant::now();
        match download_once(client, url, dest).await {
            Ok(bytes) => {
                info!(
                    attempt,
                    bytes,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Feed downloaded"
                );
                return Ok(dest.to_path_buf());
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(dest).await;
                warn!(attempt, error = %e, "Feed download failed");
                last_error = Some(e);
                if attempt < config.attempts {
                    tokio::time::sleep(config.backoff(attempt)).await;
                }
            }
        }
    }

    let err = last_error.unwrap_or_else(|| anyhow!("no download attempts configured"));
    Err(err.context(format!(
        "failed to download {url} after {} attempt(s)",
        config.attempts
    )))
}

async fn download_once<C: HttpClient>(client: &C, url: &str, dest: &Path) -> Result<u64> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);
    let mut resp = client.execute(req).await?.error_for_status()?;

    let mut file = tokio::fs::File::create(dest)
        .await
        .with_context(|| format!("cannot create {}", dest.display()))?;
    let mut bytes = 0u64;
    while let Some(chunk) = resp.chunk().await? {
        file.write_all(&chunk).await?;
        bytes += chunk.len() as u64;
    }
    file.flush().await?;

    if bytes == 0 {
        bail!("empty response body");
    }
    Ok(bytes)
}
