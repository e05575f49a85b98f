use std::time::Duration;

use tracing::debug;

use crate::config::SettingsConfig;
use crate::state::ProcessedSales;
use crate::types::SaleRecord;

/// Pick the discovered sales that still need announcing.
///
/// A sale qualifies when its contract matches `target_contract` and its
/// order hash is not already in the announced set. Records with an empty
/// order hash always qualify — they carry no dedup key, so they are
/// reprocessed every cycle they show up in (accepted re-publish risk).
/// Input order (most-recent-first) is preserved.
pub fn select_unannounced<'a>(
    sales: &'a [SaleRecord],
    processed: &ProcessedSales,
    target_contract: &str,
) -> Vec<&'a SaleRecord> {
    sales
        .iter()
        .filter(|sale| {
            if !sale.matches_contract(target_contract) {
                debug!(
                    "Skipping sale {} for foreign contract {:?}",
                    sale.id, sale.contract
                );
                return false;
            }
            !processed.contains(&sale.order_hash)
        })
        .collect()
}

/// Delay before the next check: short cooldown after a cycle that posted
/// something, the longer idle interval otherwise.
pub fn next_poll_delay(published: usize, settings: &SettingsConfig) -> Duration {
    if published > 0 {
        Duration::from_secs(settings.cooldown_secs)
    } else {
        Duration::from_secs(settings.idle_secs)
    }
}
