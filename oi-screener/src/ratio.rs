use crate::model::{OpenInterestRecord, RatioRecord, Symbol};
use fnv::FnvHashMap;
use tracing::debug;

/// Divide each symbol's USD open interest by its market cap.
///
/// Records without a market cap, or with a market cap that is not strictly positive, are
/// dropped rather than divided.
pub fn compute_ratios<'a, Iter>(
    open_interest: Iter,
    market_caps: &FnvHashMap<Symbol, f64>,
) -> Vec<RatioRecord>
where
    Iter: IntoIterator<Item = &'a OpenInterestRecord>,
{
    open_interest
        .into_iter()
        .filter_map(|record| match market_caps.get(&record.symbol) {
            Some(&market_cap) if market_cap > 0.0 && market_cap.is_finite() => Some(RatioRecord {
                symbol: record.symbol.clone(),
                open_interest_usd: record.open_interest_usd,
                market_cap,
                ratio: record.open_interest_usd / market_cap,
            }),
            Some(&market_cap) => {
                debug!(symbol = %record.symbol, market_cap, "ignoring non-positive market cap");
                None
            }
            None => None,
        })
        .collect()
}
