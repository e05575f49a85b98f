use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::types::{OrderSide, SaleRecord};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Single page, no pagination.
const PAGE_LIMIT: &str = "100";

// ── per-endpoint response shapes ───────────────────────────────────
//
// Reservoir responses are loosely typed; every field is optional here and
// normalization into `SaleRecord` happens at this boundary so nothing
// downstream touches raw JSON.

#[derive(Debug, Deserialize)]
struct SalesResponse {
    #[serde(default)]
    sales: Vec<SaleEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaleEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    order_hash: Option<String>,
    #[serde(default)]
    order_side: Option<String>,
    #[serde(default)]
    token: Option<SaleToken>,
    #[serde(default)]
    price: Option<PriceField>,
    #[serde(default)]
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaleToken {
    #[serde(default)]
    token_id: Option<String>,
    #[serde(default)]
    contract: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    collection: Option<SaleCollection>,
}

#[derive(Debug, Deserialize)]
struct SaleCollection {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActivityResponse {
    #[serde(default)]
    activities: Vec<ActivityEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    contract: Option<String>,
    #[serde(default)]
    token: Option<ActivityToken>,
    #[serde(default)]
    price: Option<PriceField>,
    #[serde(default)]
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityToken {
    #[serde(default)]
    token_id: Option<String>,
    #[serde(default)]
    token_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FillsResponse {
    #[serde(default)]
    fills: Vec<FillEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FillEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    order_hash: Option<String>,
    #[serde(default)]
    contract: Option<String>,
    #[serde(default)]
    token_id: Option<String>,
    #[serde(default)]
    token_name: Option<String>,
    #[serde(default)]
    collection_name: Option<String>,
    #[serde(default)]
    price: Option<PriceField>,
    #[serde(default)]
    created_at: Option<String>,
}

/// Price value as the API serves it: nested `{amount: {decimal}}` on the
/// sales endpoint, a bare number on activity entries, occasionally a
/// numeric string on fills.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PriceField {
    Structured {
        #[serde(default)]
        amount: Option<PriceAmount>,
    },
    Plain(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct PriceAmount {
    #[serde(default)]
    decimal: Option<f64>,
}

impl PriceField {
    fn decimal(&self) -> Option<f64> {
        match self {
            PriceField::Structured { amount } => amount.as_ref()?.decimal,
            PriceField::Plain(value) => Some(*value),
            PriceField::Text(text) => text.parse().ok(),
        }
    }
}

fn price_eth(price: Option<&PriceField>) -> f64 {
    price.and_then(PriceField::decimal).unwrap_or(0.0)
}

// ── normalization ──────────────────────────────────────────────────

fn normalize_sale(entry: SaleEntry) -> SaleRecord {
    let side = match entry.order_side.as_deref() {
        Some("bid") => OrderSide::Bid,
        _ => OrderSide::Ask,
    };
    let token = entry.token;
    SaleRecord {
        id: entry.id.unwrap_or_default(),
        order_hash: entry.order_hash.unwrap_or_default(),
        token_id: token.as_ref().and_then(|t| t.token_id.clone()),
        contract: token.as_ref().and_then(|t| t.contract.clone()),
        token_name: token.as_ref().and_then(|t| t.name.clone()),
        collection_name: token
            .as_ref()
            .and_then(|t| t.collection.as_ref())
            .and_then(|c| c.name.clone()),
        price_eth: price_eth(entry.price.as_ref()),
        side,
        timestamp: entry.timestamp,
    }
}

/// Activity entries only describe listing purchases — the endpoint cannot
/// express accepted offers, so every synthesized record is ask-side.
fn normalize_activity(entry: ActivityEntry) -> Option<SaleRecord> {
    if entry.kind.as_deref() != Some("sale") {
        return None;
    }
    let token = entry.token;
    Some(SaleRecord {
        id: entry.id.unwrap_or_default(),
        order_hash: String::new(),
        token_id: token.as_ref().and_then(|t| t.token_id.clone()),
        contract: entry.contract,
        token_name: token.as_ref().and_then(|t| t.token_name.clone()),
        collection_name: None,
        price_eth: price_eth(entry.price.as_ref()),
        side: OrderSide::Ask,
        timestamp: entry.timestamp,
    })
}

fn normalize_fill(entry: FillEntry, target_contract: &str) -> Option<SaleRecord> {
    let contract = entry.contract?;
    if !contract.eq_ignore_ascii_case(target_contract) {
        return None;
    }
    let timestamp = entry
        .created_at
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| Utc::now().timestamp());
    Some(SaleRecord {
        id: entry.id.unwrap_or_default(),
        order_hash: entry.order_hash.unwrap_or_default(),
        token_id: entry.token_id,
        contract: Some(contract),
        token_name: entry.token_name,
        collection_name: Some(
            entry
                .collection_name
                .unwrap_or_else(|| "Primitives".to_string()),
        ),
        price_eth: price_eth(entry.price.as_ref()),
        side: OrderSide::Bid,
        timestamp: Some(timestamp),
    })
}

// ── client ─────────────────────────────────────────────────────────

/// Reservoir indexing API client scoped to one contract on one chain.
pub struct ReservoirClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    chain: String,
    contract: String,
}

impl ReservoirClient {
    pub fn new(base_url: &str, api_key: &str, chain: &str, contract: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build Reservoir HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            chain: chain.to_string(),
            contract: contract.to_string(),
        })
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    /// Recent sales for the target contract, most-recent-first.
    ///
    /// Ordered fallback chain, stopping at the first strategy that yields
    /// anything: direct sales → token activity → (if `include_bids`) order
    /// fills. A failing strategy is logged and the chain falls through;
    /// full exhaustion yields an empty vec, never an error and never
    /// placeholder data.
    pub async fn recent_sales(&self, lookback_days: u32, include_bids: bool) -> Vec<SaleRecord> {
        info!(
            "Searching for sales of {} on {} in the past {lookback_days} days...",
            self.contract, self.chain
        );

        match self.direct_sales().await {
            Ok(sales) if !sales.is_empty() => {
                info!("Found {} sales via sales endpoint", sales.len());
                return sales;
            }
            Ok(_) => debug!("No results from sales endpoint, trying token activity"),
            Err(e) => warn!("Sales endpoint failed: {e:#}"),
        }

        match self.activity_sales().await {
            Ok(sales) if !sales.is_empty() => {
                info!("Converted {} activities to sale records", sales.len());
                return sales;
            }
            Ok(_) => debug!("No sale activities found"),
            Err(e) => warn!("Token activity endpoint failed: {e:#}"),
        }

        if include_bids {
            match self.fill_sales().await {
                Ok(sales) if !sales.is_empty() => {
                    info!("Converted {} order fills to sale records", sales.len());
                    return sales;
                }
                Ok(_) => debug!("No matching order fills found"),
                Err(e) => warn!("Order fills endpoint failed: {e:#}"),
            }
        }

        info!("No sales or accepted offers found for {}", self.contract);
        Vec::new()
    }

    async fn direct_sales(&self) -> Result<Vec<SaleRecord>> {
        let url = format!("{}/sales/v6", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("contract", self.contract.as_str()),
                ("limit", PAGE_LIMIT),
                ("sortDirection", "desc"),
                ("chains", self.chain.as_str()),
            ])
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        if !response.status().is_success() {
            warn!("Sales endpoint returned HTTP {}", response.status());
            return Ok(Vec::new());
        }
        let body: SalesResponse = response
            .json()
            .await
            .context("failed to decode sales response")?;
        Ok(body.sales.into_iter().map(normalize_sale).collect())
    }

    async fn activity_sales(&self) -> Result<Vec<SaleRecord>> {
        let url = format!("{}/tokens/activity/v5", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("contract", self.contract.as_str()),
                ("limit", PAGE_LIMIT),
                ("types", "sale"),
                ("sortDirection", "desc"),
                ("chains", self.chain.as_str()),
            ])
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        if !response.status().is_success() {
            warn!("Token activity endpoint returned HTTP {}", response.status());
            return Ok(Vec::new());
        }
        let body: ActivityResponse = response
            .json()
            .await
            .context("failed to decode activity response")?;
        Ok(body
            .activities
            .into_iter()
            .filter_map(normalize_activity)
            .collect())
    }

    async fn fill_sales(&self) -> Result<Vec<SaleRecord>> {
        let url = format!("{}/orders/fills/v6", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("contract", self.contract.as_str()),
                ("limit", PAGE_LIMIT),
                ("sortDirection", "desc"),
                ("chains", self.chain.as_str()),
            ])
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        if !response.status().is_success() {
            warn!("Order fills endpoint returned HTTP {}", response.status());
            return Ok(Vec::new());
        }
        let body: FillsResponse = response
            .json()
            .await
            .context("failed to decode fills response")?;
        Ok(body
            .fills
            .into_iter()
            .filter_map(|fill| normalize_fill(fill, &self.contract))
            .collect())
    }

    /// Preview image URL for one token, from the token metadata endpoint.
    pub async fn token_image_url(&self, token_id: &str) -> Result<Option<String>> {
        #[derive(Debug, Deserialize)]
        struct TokensResponse {
            #[serde(default)]
            tokens: Vec<TokenContainer>,
        }
        #[derive(Debug, Deserialize)]
        struct TokenContainer {
            #[serde(default)]
            token: Option<TokenMeta>,
        }
        #[derive(Debug, Deserialize)]
        struct TokenMeta {
            #[serde(default)]
            image: Option<String>,
        }

        let url = format!("{}/tokens/v6", self.base_url);
        let token_ref = format!("{}:{token_id}", self.contract);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("tokens", token_ref.as_str()),
                ("includeAttributes", "false"),
                ("includeTopBid", "false"),
                ("chains", self.chain.as_str()),
            ])
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        if !response.status().is_success() {
            anyhow::bail!("token metadata endpoint returned HTTP {}", response.status());
        }
        let body: TokensResponse = response
            .json()
            .await
            .context("failed to decode token metadata response")?;
        Ok(body
            .tokens
            .into_iter()
            .next()
            .and_then(|container| container.token)
            .and_then(|token| token.image))
    }
}
