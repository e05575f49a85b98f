use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::discovery::ReservoirClient;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct OpenSeaNftResponse {
    #[serde(default)]
    nft: Option<OpenSeaNft>,
}

#[derive(Debug, Deserialize)]
struct OpenSeaNft {
    #[serde(default)]
    image_url: Option<String>,
}

/// Best-effort preview image fetcher. Tries Reservoir token metadata
/// first, then OpenSea, and downloads whichever image URL it finds to the
/// data directory. Every failure path ends in `None` — the caller posts
/// without an image rather than aborting.
pub struct ImageResolver {
    http: reqwest::Client,
    opensea_base: String,
    data_dir: PathBuf,
}

impl ImageResolver {
    pub fn new(opensea_base: &str, data_dir: &Path) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .context("failed to build media HTTP client")?;
        Ok(Self {
            http,
            opensea_base: opensea_base.trim_end_matches('/').to_string(),
            data_dir: data_dir.to_path_buf(),
        })
    }

    /// Local path to a downloaded preview image for `token_id`, or `None`.
    pub async fn resolve(&self, reservoir: &ReservoirClient, token_id: &str) -> Option<PathBuf> {
        match self.from_reservoir(reservoir, token_id).await {
            Ok(path) => return Some(path),
            Err(e) => warn!("Primary image lookup failed for token {token_id}: {e:#}"),
        }
        match self
            .from_opensea(reservoir.chain(), reservoir.contract(), token_id)
            .await
        {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("OpenSea image fallback failed for token {token_id}: {e:#}");
                None
            }
        }
    }

    async fn from_reservoir(
        &self,
        reservoir: &ReservoirClient,
        token_id: &str,
    ) -> Result<PathBuf> {
        let image_url = reservoir
            .token_image_url(token_id)
            .await?
            .context("no image URL in token metadata")?;
        debug!("Found image URL for token {token_id}: {image_url}");
        self.download(&image_url, token_id).await
    }

    async fn from_opensea(&self, chain: &str, contract: &str, token_id: &str) -> Result<PathBuf> {
        let url = format!(
            "{}/api/v2/chain/{chain}/contract/{contract}/nfts/{token_id}",
            self.opensea_base
        );
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            bail!("OpenSea returned HTTP {}", response.status());
        }
        let body: OpenSeaNftResponse = response
            .json()
            .await
            .context("failed to decode OpenSea response")?;
        let image_url = body
            .nft
            .and_then(|nft| nft.image_url)
            .context("no image URL in OpenSea response")?;
        self.download(&image_url, token_id).await
    }

    async fn download(&self, image_url: &str, token_id: &str) -> Result<PathBuf> {
        let response = self.http.get(image_url).send().await?;
        if !response.status().is_success() {
            bail!("image download returned HTTP {}", response.status());
        }
        let bytes = response.bytes().await.context("failed to read image body")?;
        let path = self.data_dir.join(format!("nft_{token_id}.jpg"));
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        debug!("Image saved to {}", path.display());
        Ok(path)
    }
}
