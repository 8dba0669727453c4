//! External data sources the screener pulls from.
//!
//! Every component receives its source by parameter, so the REST clients in [`binance`] and
//! [`coingecko`] can be substituted with in-memory fakes.

use crate::{
    error::ScreenerError,
    model::{Candle, MarketCapEntry, Symbol, TickerRecord},
};
use async_trait::async_trait;

pub mod binance;
pub mod coingecko;

/// Futures exchange REST surface.
#[async_trait]
pub trait FuturesExchange: Send + Sync {
    /// 24 hour ticker statistics for every listed contract.
    async fn tickers(&self) -> Result<Vec<TickerRecord>, ScreenerError>;

    /// Current open interest for one symbol, in base asset units.
    ///
    /// Fails with [`ScreenerError::TransientSymbol`] if the symbol is not currently tradeable.
    async fn open_interest(&self, symbol: &Symbol) -> Result<f64, ScreenerError>;

    /// Most recent `limit` candles of the provided interval, oldest first.
    async fn klines(
        &self,
        symbol: &Symbol,
        interval: &str,
        limit: u16,
    ) -> Result<Vec<Candle>, ScreenerError>;
}

/// Market data provider REST surface listing coins by market capitalisation.
#[async_trait]
pub trait MarketCapSource: Send + Sync {
    /// One page of the coin market listing, pages starting at 1.
    async fn markets_page(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<MarketCapEntry>, ScreenerError>;
}
