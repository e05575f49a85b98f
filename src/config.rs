use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::DEFAULT_CONTRACT_ADDRESS;

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub reservoir: ReservoirConfig,
    pub twitter: TwitterConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}

/// Reservoir API access and target collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservoirConfig {
    #[serde(default)]
    pub api_key: String,
    /// Collection contract address the bot announces sales for.
    #[serde(default = "default_contract")]
    pub contract_address: String,
    /// Chain identifier used in API filters and marketplace links.
    #[serde(default = "default_chain")]
    pub chain: String,
}

/// Twitter/X user-context credentials (OAuth 1.0a).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    pub api_key: String,
    pub api_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Cooldown in seconds after a cycle that posted at least one sale.
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
    /// Wait in seconds after a cycle that posted nothing.
    #[serde(default = "default_idle")]
    pub idle_secs: u64,
    /// Lookback window in days for sale discovery.
    #[serde(default = "default_lookback")]
    pub lookback_days: u32,
    /// Whether accepted offers count as sales.
    #[serde(default = "default_include_bids")]
    pub include_bids: bool,
    /// Directory for the dedup file and downloaded images.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_contract() -> String {
    DEFAULT_CONTRACT_ADDRESS.to_string()
}

fn default_chain() -> String {
    "base".to_string()
}

fn default_cooldown() -> u64 {
    120
}

fn default_idle() -> u64 {
    300
}

fn default_lookback() -> u32 {
    7
}

fn default_include_bids() -> bool {
    true
}

fn default_data_dir() -> String {
    "data".to_string()
}

impl Default for ReservoirConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            contract_address: default_contract(),
            chain: default_chain(),
        }
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown(),
            idle_secs: default_idle(),
            lookback_days: default_lookback(),
            include_bids: default_include_bids(),
            data_dir: default_data_dir(),
        }
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Apply environment overrides using the deployment's historical
    /// variable names, so an existing `.env` keeps working.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("RESERVOIR_API_KEY") {
            self.reservoir.api_key = key;
        }
        if let Ok(contract) = std::env::var("CONTRACT_ADDRESS") {
            self.reservoir.contract_address = contract;
        }
        if let Ok(key) = std::env::var("TWITTER_API_KEY") {
            self.twitter.api_key = key;
        }
        if let Ok(secret) = std::env::var("TWITTER_API_SECRET") {
            self.twitter.api_secret = secret;
        }
        if let Ok(token) = std::env::var("TWITTER_ACCESS_TOKEN") {
            self.twitter.access_token = token;
        }
        if let Ok(secret) = std::env::var("TWITTER_ACCESS_TOKEN_SECRET") {
            self.twitter.access_token_secret = secret;
        }
        if let Ok(interval) = std::env::var("CHECK_INTERVAL") {
            match interval.parse() {
                Ok(secs) => self.settings.cooldown_secs = secs,
                Err(_) => {
                    tracing::warn!("Ignoring non-numeric CHECK_INTERVAL: {interval:?}");
                }
            }
        }
    }
}
