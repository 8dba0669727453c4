use crate::{
    cache::{MarketCapCache, SnapshotStore},
    change::ChangeSignalFetcher,
    config::ScreenerConfig,
    dataset::{ScreenReport, build_dataset},
    error::ScreenerError,
    exchange::ExchangeDataFetcher,
    model::{Symbol, TickerRecord},
    ratio::compute_ratios,
    source::{FuturesExchange, MarketCapSource},
};
use chrono::Utc;
use tracing::info;

/// Runs the full screen: top volume open interest, market cap ratio and change signal join.
#[derive(Debug)]
pub struct Screener<Exchange, Source, Store> {
    exchange: Exchange,
    market_caps: MarketCapCache<Source, Store>,
    config: ScreenerConfig,
}

impl<Exchange, Source, Store> Screener<Exchange, Source, Store>
where
    Exchange: FuturesExchange,
    Source: MarketCapSource,
    Store: SnapshotStore,
{
    pub fn new(exchange: Exchange, source: Source, store: Store, config: ScreenerConfig) -> Self {
        let market_caps = MarketCapCache::new(source, store, config.symbol_mapper(), config.cache);
        Self {
            exchange,
            market_caps,
            config,
        }
    }

    pub fn config(&self) -> &ScreenerConfig {
        &self.config
    }

    /// Execute one screening run.
    ///
    /// A single market cap snapshot is loaded per run and used for every symbol.
    pub async fn run(&self) -> Result<ScreenReport, ScreenerError> {
        let mut open_interest = ExchangeDataFetcher::new(&self.exchange, &self.config.quote)
            .with_concurrency(self.config.concurrency)
            .open_interest_for_top_symbols(self.config.top_n)
            .await?;
        open_interest.sort_by(|a, b| b.ticker.quote_volume.total_cmp(&a.ticker.quote_volume));
        info!(symbols = open_interest.len(), "fetched open interest");

        let symbols = open_interest
            .iter()
            .map(|oi| oi.open_interest.symbol.clone())
            .collect::<Vec<Symbol>>();

        let snapshot = self.market_caps.snapshot().await?;
        let market_caps = snapshot.market_caps(&symbols, self.market_caps.mapper());

        let ratios = compute_ratios(open_interest.iter().map(|oi| &oi.open_interest), &market_caps);
        info!(ratios = ratios.len(), "computed open interest to market cap ratios");

        let ratio_symbols = ratios
            .iter()
            .map(|ratio| ratio.symbol.clone())
            .collect::<Vec<Symbol>>();
        let changes = ChangeSignalFetcher::new(&self.exchange, &self.config.candle_interval)
            .with_concurrency(self.config.concurrency)
            .change_signals(&ratio_symbols)
            .await?;

        let tickers = open_interest
            .into_iter()
            .map(|oi| oi.ticker)
            .collect::<Vec<TickerRecord>>();
        let records = build_dataset(&ratios, &changes, &tickers);
        info!(records = records.len(), "screen complete");

        Ok(ScreenReport::new(Utc::now(), records))
    }
}
