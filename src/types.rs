use serde::Serialize;

/// Which side of the order book the sale settled on.
///
/// `Bid` means a collector's offer was accepted rather than a listing
/// being bought directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Ask,
    Bid,
}

/// One sale event, normalized from whichever Reservoir endpoint produced it.
#[derive(Debug, Clone, Serialize)]
pub struct SaleRecord {
    /// Upstream event id — logging only, never used for dedup.
    pub id: String,
    /// Dedup key. Empty when the upstream record didn't carry one.
    pub order_hash: String,
    pub token_id: Option<String>,
    /// Contract address as received; compared case-insensitively.
    pub contract: Option<String>,
    pub token_name: Option<String>,
    pub collection_name: Option<String>,
    /// Sale price in ETH.
    pub price_eth: f64,
    pub side: OrderSide,
    /// Unix seconds, when the upstream record carried a usable time.
    pub timestamp: Option<i64>,
}

impl SaleRecord {
    /// True when the record's contract matches `target` (case-insensitive).
    /// Records without a contract pass — the mismatch check only applies
    /// when the field is present.
    pub fn matches_contract(&self, target: &str) -> bool {
        match &self.contract {
            Some(contract) => contract.eq_ignore_ascii_case(target),
            None => true,
        }
    }
}
