use chrono::{DateTime, Utc};
use derive_more::{Constructor, Display, From};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Exchange symbol identifier, eg/ "BTCUSDT".
#[derive(
    Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, From, Deserialize, Serialize,
)]
pub struct Symbol(SmolStr);

impl Symbol {
    pub fn new<S: Into<SmolStr>>(symbol: S) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for Symbol {
    fn from(symbol: &str) -> Self {
        Self(SmolStr::new(symbol))
    }
}

impl From<String> for Symbol {
    fn from(symbol: String) -> Self {
        Self(SmolStr::from(symbol))
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// 24 hour ticker statistics for one futures contract.
#[derive(Clone, PartialEq, PartialOrd, Debug, Constructor, Deserialize, Serialize)]
pub struct TickerRecord {
    pub symbol: Symbol,
    /// Traded volume over the last 24 hours, denominated in the quote currency.
    pub quote_volume: f64,
    pub last_price: f64,
    pub price_change_percent: f64,
}

/// Open interest for one symbol, valued in USD with the [`TickerRecord::last_price`] captured in
/// the same fetch.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct OpenInterestRecord {
    pub symbol: Symbol,
    /// Outstanding contracts, in base asset units.
    pub open_interest: f64,
    pub open_interest_usd: f64,
}

impl OpenInterestRecord {
    pub fn from_ticker(ticker: &TickerRecord, open_interest: f64) -> Self {
        Self {
            symbol: ticker.symbol.clone(),
            open_interest,
            open_interest_usd: open_interest * ticker.last_price,
        }
    }
}

/// [`OpenInterestRecord`] paired with the [`TickerRecord`] it was valued against.
#[derive(Clone, PartialEq, PartialOrd, Debug, Constructor, Deserialize, Serialize)]
pub struct SymbolOpenInterest {
    pub ticker: TickerRecord,
    pub open_interest: OpenInterestRecord,
}

/// One row of the market data provider's coin listing.
///
/// `external_id` lives in the provider's namespace (eg/ "btc"), not the exchange's.
#[derive(Clone, PartialEq, PartialOrd, Debug, Constructor, Deserialize, Serialize)]
pub struct MarketCapEntry {
    pub external_id: SmolStr,
    /// Market capitalisation in USD. `None` when the provider does not report one.
    pub market_cap: Option<f64>,
}

/// Open interest (USD) relative to market capitalisation for one symbol.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct RatioRecord {
    pub symbol: Symbol,
    pub open_interest_usd: f64,
    pub market_cap: f64,
    pub ratio: f64,
}

/// Fractional close-to-close price change over the last completed candle.
#[derive(Clone, PartialEq, PartialOrd, Debug, Constructor, Deserialize, Serialize)]
pub struct ChangeSignal {
    pub symbol: Symbol,
    pub change: f64,
}

/// Candle reduced to the fields the change signal consumes.
#[derive(Clone, Copy, PartialEq, PartialOrd, Debug, Constructor, Deserialize, Serialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub close: f64,
}

impl Candle {
    /// A candle is complete once its close time has passed.
    pub fn is_complete(&self, now: DateTime<Utc>) -> bool {
        self.close_time < now
    }
}

/// Final joined row handed to downstream plotting.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct AnalysisRecord {
    pub symbol: Symbol,
    pub ratio: f64,
    pub change: f64,
    pub price_change_percent: f64,
    pub quote_volume: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_interest_record_from_ticker() {
        let ticker = TickerRecord::new(Symbol::from("DOGEUSDT"), 2.5e9, 0.5, -1.2);

        let actual = OpenInterestRecord::from_ticker(&ticker, 1_000_000.0);

        assert_eq!(actual.symbol, Symbol::from("DOGEUSDT"));
        assert_eq!(actual.open_interest, 1_000_000.0);
        assert_eq!(actual.open_interest_usd, 500_000.0);
    }

    #[test]
    fn test_candle_is_complete() {
        let open_time = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let close_time = DateTime::from_timestamp_millis(1_700_003_599_999).unwrap();
        let candle = Candle::new(open_time, close_time, 100.0);

        assert!(!candle.is_complete(close_time));
        assert!(candle.is_complete(close_time + chrono::TimeDelta::milliseconds(1)));
    }

    #[test]
    fn test_symbol_display_and_serde() {
        let symbol = Symbol::from("ETHUSDT");
        assert_eq!(symbol.to_string(), "ETHUSDT");
        assert_eq!(serde_json::to_string(&symbol).unwrap(), "\"ETHUSDT\"");
    }
}
