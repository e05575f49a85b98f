pub mod config;
pub mod discovery;
pub mod engine;
pub mod format;
pub mod media;
pub mod price;
pub mod publisher;
pub mod state;
pub mod types;

/// Target collection: Primitives on Base
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x424d781e0163b5a42ca2f27d036c2d5c561022c3";

/// Reservoir indexing API, Base-chain deployment
pub const RESERVOIR_API_BASE: &str = "https://api-base.reservoir.tools";

/// OpenSea public API (image URL fallback only)
pub const OPENSEA_API_BASE: &str = "https://api.opensea.io";

/// Twitter/X REST API base URL
pub const TWITTER_API_BASE: &str = "https://api.twitter.com";

/// Twitter/X media upload base URL (v1.1 — v2 has no media endpoint)
pub const TWITTER_UPLOAD_BASE: &str = "https://upload.twitter.com";
