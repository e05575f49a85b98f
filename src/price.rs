use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;
use tracing::{debug, warn};

/// Rate used when every price source is down, so posts never show `$???`
/// in steady state.
pub const FALLBACK_ETH_USD: f64 = 1825.00;

const PRICE_TIMEOUT: Duration = Duration::from_secs(10);

/// One ETH/USD source: a URL plus the field shape its response uses.
pub struct PriceSource {
    pub name: &'static str,
    pub url: String,
    pub extract: fn(&Value) -> Option<f64>,
}

impl PriceSource {
    pub fn coingecko() -> Self {
        Self {
            name: "coingecko",
            url: "https://api.coingecko.com/api/v3/simple/price?ids=ethereum&vs_currencies=usd"
                .to_string(),
            extract: coingecko_rate,
        }
    }

    pub fn cryptocompare() -> Self {
        Self {
            name: "cryptocompare",
            url: "https://min-api.cryptocompare.com/data/price?fsym=ETH&tsyms=USD".to_string(),
            extract: cryptocompare_rate,
        }
    }
}

fn coingecko_rate(value: &Value) -> Option<f64> {
    value.get("ethereum")?.get("usd")?.as_f64()
}

fn cryptocompare_rate(value: &Value) -> Option<f64> {
    value.get("USD")?.as_f64()
}

/// ETH→USD oracle over an ordered list of redundant sources.
pub struct EthPriceOracle {
    http: reqwest::Client,
    sources: Vec<PriceSource>,
}

impl EthPriceOracle {
    pub fn new() -> Result<Self> {
        Self::with_sources(vec![PriceSource::coingecko(), PriceSource::cryptocompare()])
    }

    /// Build an oracle over custom sources. Order is the failover order.
    pub fn with_sources(sources: Vec<PriceSource>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(PRICE_TIMEOUT)
            .build()
            .context("failed to build price HTTP client")?;
        Ok(Self { http, sources })
    }

    /// Current ETH/USD rate. Tries each source in order and falls back to
    /// [`FALLBACK_ETH_USD`] when all of them fail — this never errors.
    pub async fn eth_usd(&self) -> f64 {
        for source in &self.sources {
            match self.try_source(source).await {
                Ok(rate) => {
                    debug!("Fetched ETH price from {}: ${rate}", source.name);
                    return rate;
                }
                Err(e) => {
                    warn!("Failed to fetch ETH price from {}: {e}", source.name);
                }
            }
        }
        warn!("All price sources failed, using fallback ETH price ${FALLBACK_ETH_USD}");
        FALLBACK_ETH_USD
    }

    async fn try_source(&self, source: &PriceSource) -> Result<f64> {
        let response = self.http.get(&source.url).send().await?;
        if !response.status().is_success() {
            bail!("HTTP {}", response.status());
        }
        let body: Value = response.json().await?;
        (source.extract)(&body).ok_or_else(|| anyhow!("unrecognized response shape"))
    }
}
