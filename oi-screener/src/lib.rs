//! # OI Screener
//! Screens the highest volume USD-M futures contracts by how large their open interest is
//! relative to the underlying coin's market capitalisation, and joins that ratio with a
//! recent price change signal.
//!
//! One run:
//! - selects the top volume contracts and values their open interest in USD
//! - resolves each contract's market cap from a freshness-bounded listing snapshot
//! - computes the open interest / market cap ratio
//! - joins the ratio with the last completed candle's close-to-close change
//!
//! See [`Screener::run`].

/// Market cap listing snapshot cache and persistence.
pub mod cache;

/// Close-to-close change signal from recent candles.
pub mod change;

pub mod config;

/// Final join and cross-sectional summary.
pub mod dataset;

pub mod error;

/// Top volume selection and open interest valuation.
pub mod exchange;

/// Exchange symbol to market data provider id normalisation.
pub mod mapper;

pub mod model;

/// Open interest / market cap ratio.
pub mod ratio;

pub mod screener;

/// Exchange and market data provider REST clients.
pub mod source;

mod de;

// Re-export commonly used types for convenience
pub use cache::{
    CacheConfig, FileSnapshotStore, InMemorySnapshotStore, MarketCapCache, MarketSnapshot,
    SnapshotStore,
};
pub use config::ScreenerConfig;
pub use dataset::ScreenReport;
pub use error::ScreenerError;
pub use mapper::SymbolMapper;
pub use model::{
    AnalysisRecord, Candle, ChangeSignal, MarketCapEntry, OpenInterestRecord, RatioRecord,
    Symbol, SymbolOpenInterest, TickerRecord,
};
pub use screener::Screener;
pub use source::{
    FuturesExchange, MarketCapSource, binance::BinanceFuturesClient, coingecko::CoinGeckoClient,
};
