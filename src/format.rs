use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::types::{OrderSide, SaleRecord};

/// Collection name used when the upstream record doesn't carry one.
const DEFAULT_COLLECTION: &str = "Primitive";

/// Matches a `#123`-style numeric suffix inside a token name.
static HASH_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#(\d+)").expect("valid regex"));

/// Render one sale as a publishable post, or `None` when the record is
/// unusable (foreign contract, missing token id).
///
/// `eth_usd` is the current ETH→USD rate; `None` renders the `$???`
/// placeholder instead of a fiat amount.
pub fn format_sale_message(
    sale: &SaleRecord,
    eth_usd: Option<f64>,
    target_contract: &str,
    chain: &str,
) -> Option<String> {
    if !sale.matches_contract(target_contract) {
        debug!(
            "Sale {} is for contract {:?}, not target {target_contract} — skipping",
            sale.id, sale.contract
        );
        return None;
    }

    let Some(token_id) = sale.token_id.as_deref() else {
        debug!("Sale {} has no token id — skipping", sale.id);
        return None;
    };

    let display_id = display_token_id(token_id, sale.token_name.as_deref());
    let usd = match eth_usd {
        Some(rate) => format!("${}", format_thousands(sale.price_eth * rate)),
        None => "$???".to_string(),
    };
    let action = match sale.side {
        OrderSide::Bid => "offer accepted for",
        OrderSide::Ask => "bought for",
    };
    let collection = sale.collection_name.as_deref().unwrap_or(DEFAULT_COLLECTION);
    let contract = sale.contract.as_deref().unwrap_or(target_contract);

    Some(format!(
        "{collection} #{display_id} {action} {:.4} Ξ [{usd}]\n\n⤷https://opensea.io/assets/{chain}/{contract}/{token_id}",
        sale.price_eth
    ))
}

/// Pick a human-friendly token id.
///
/// Precedence: canonical decimal when the id parses as an integer; for
/// long opaque ids, a `#<digits>` pattern from the token name, then the
/// name verbatim, then a `first4...last4` truncation; otherwise the raw
/// id unmodified.
pub(crate) fn display_token_id(token_id: &str, token_name: Option<&str>) -> String {
    if let Ok(numeric) = token_id.parse::<u128>() {
        return numeric.to_string();
    }

    let chars: Vec<char> = token_id.chars().collect();
    if chars.len() > 10 {
        if let Some(name) = token_name {
            if let Some(caps) = HASH_NUMBER.captures(name) {
                return caps[1].to_string();
            }
            return name.to_string();
        }
        if chars.len() > 8 {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            return format!("{head}...{tail}");
        }
    }

    token_id.to_string()
}

/// Format a dollar amount to two decimals with thousands separators.
pub(crate) fn format_thousands(amount: f64) -> String {
    let fixed = format!("{amount:.2}");
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", int_part),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{sign}{grouped}.{frac_part}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: &str = "0x424d781e0163b5a42ca2f27d036c2d5c561022c3";

    fn sale(token_id: &str) -> SaleRecord {
        SaleRecord {
            id: "sale-1".to_string(),
            order_hash: "0xhash".to_string(),
            token_id: Some(token_id.to_string()),
            contract: Some(TARGET.to_string()),
            token_name: None,
            collection_name: None,
            price_eth: 1.5,
            side: OrderSide::Ask,
            timestamp: None,
        }
    }

    // ── display_token_id ───────────────────────────────────────────

    #[test]
    fn numeric_id_strips_leading_zeros() {
        assert_eq!(display_token_id("00042", None), "42");
        assert_eq!(display_token_id("7", None), "7");
        assert_eq!(display_token_id("0", None), "0");
    }

    #[test]
    fn long_id_prefers_number_from_name() {
        assert_eq!(
            display_token_id("0xdeadbeefcafebabe1234", Some("Primitives #7")),
            "7"
        );
    }

    #[test]
    fn long_id_falls_back_to_name_verbatim() {
        assert_eq!(
            display_token_id("0xdeadbeefcafebabe1234", Some("Genesis Orb")),
            "Genesis Orb"
        );
    }

    #[test]
    fn long_opaque_id_truncates() {
        // 20 chars, no name
        assert_eq!(
            display_token_id("0xdeadbeefcafebabe12", None),
            "0xde...be12"
        );
    }

    #[test]
    fn short_opaque_id_unmodified() {
        // non-numeric but within 10 chars: left alone
        assert_eq!(display_token_id("abc123xyz", None), "abc123xyz");
        assert_eq!(display_token_id("abc123xyz", Some("Name #5")), "abc123xyz");
    }

    // ── format_thousands ───────────────────────────────────────────

    #[test]
    fn thousands_grouping() {
        assert_eq!(format_thousands(3000.0), "3,000.00");
        assert_eq!(format_thousands(1234567.891), "1,234,567.89");
        assert_eq!(format_thousands(999.9), "999.90");
        assert_eq!(format_thousands(0.0), "0.00");
    }

    // ── format_sale_message ────────────────────────────────────────

    #[test]
    fn foreign_contract_yields_none() {
        let mut rec = sale("42");
        rec.contract = Some("0x9999999999999999999999999999999999999999".to_string());
        assert!(format_sale_message(&rec, Some(2000.0), TARGET, "base").is_none());
    }

    #[test]
    fn uppercase_target_contract_still_matches() {
        let rec = sale("42");
        let msg = format_sale_message(&rec, Some(2000.0), &TARGET.to_uppercase(), "base");
        assert!(msg.is_some());
    }

    #[test]
    fn missing_token_id_yields_none() {
        let mut rec = sale("42");
        rec.token_id = None;
        assert!(format_sale_message(&rec, Some(2000.0), TARGET, "base").is_none());
    }

    #[test]
    fn full_ask_message() {
        let mut rec = sale("00042");
        rec.collection_name = Some("Primitives".to_string());
        let msg = format_sale_message(&rec, Some(2000.0), TARGET, "base").unwrap();
        assert_eq!(
            msg,
            format!(
                "Primitives #42 bought for 1.5000 Ξ [$3,000.00]\n\n⤷https://opensea.io/assets/base/{TARGET}/00042"
            )
        );
    }

    #[test]
    fn bid_uses_offer_accepted_phrase() {
        let mut rec = sale("42");
        rec.side = OrderSide::Bid;
        let msg = format_sale_message(&rec, Some(2000.0), TARGET, "base").unwrap();
        assert!(msg.contains("offer accepted for"));
        assert!(!msg.contains("bought for"));
    }

    #[test]
    fn ask_uses_bought_for_phrase() {
        let msg = format_sale_message(&sale("42"), Some(2000.0), TARGET, "base").unwrap();
        assert!(msg.contains("bought for"));
    }

    #[test]
    fn missing_rate_emits_placeholder() {
        let msg = format_sale_message(&sale("42"), None, TARGET, "base").unwrap();
        assert!(msg.contains("[$???]"));
    }

    #[test]
    fn missing_collection_uses_default() {
        let msg = format_sale_message(&sale("42"), Some(2000.0), TARGET, "base").unwrap();
        assert!(msg.starts_with("Primitive #42"));
    }

    #[test]
    fn missing_contract_links_to_target() {
        let mut rec = sale("42");
        rec.contract = None;
        let msg = format_sale_message(&rec, Some(2000.0), TARGET, "base").unwrap();
        assert!(msg.contains(&format!("/assets/base/{TARGET}/42")));
    }

    #[test]
    fn deep_link_uses_raw_token_id() {
        // display id is prettified, the link keeps the raw id
        let mut rec = sale("0xdeadbeefcafebabe1234");
        rec.token_name = Some("Primitives #9".to_string());
        let msg = format_sale_message(&rec, Some(2000.0), TARGET, "base").unwrap();
        assert!(msg.contains("#9 bought for"));
        assert!(msg.contains("/0xdeadbeefcafebabe1234"));
    }
}
