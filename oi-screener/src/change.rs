use crate::{
    error::ScreenerError,
    model::{Candle, ChangeSignal, Symbol},
    source::FuturesExchange,
};
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt, stream};
use tracing::info;

/// Default candle interval the change signal is measured over.
pub const DEFAULT_CANDLE_INTERVAL: &str = "1h";

/// Candles requested per symbol: two completed candles plus the one still forming.
const CANDLE_LOOKBACK: u16 = 3;

/// Fetches the close-to-close change over the last completed candle for each symbol.
#[derive(Debug)]
pub struct ChangeSignalFetcher<'a, Exchange> {
    exchange: &'a Exchange,
    interval: &'a str,
    concurrency: usize,
}

impl<'a, Exchange> ChangeSignalFetcher<'a, Exchange>
where
    Exchange: FuturesExchange,
{
    pub fn new(exchange: &'a Exchange, interval: &'a str) -> Self {
        Self {
            exchange,
            interval,
            concurrency: 1,
        }
    }

    /// Set the maximum number of in-flight per-symbol requests.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Fractional change between the two most recent completed candle closes.
    ///
    /// Fails with [`ScreenerError::InsufficientHistory`] for symbols with fewer than two
    /// completed candles.
    pub async fn change(&self, symbol: &Symbol) -> Result<f64, ScreenerError> {
        let candles = self
            .exchange
            .klines(symbol, self.interval, CANDLE_LOOKBACK)
            .await?;
        change_from_candles(symbol, &candles, Utc::now())
    }

    /// Fetch change signals for every symbol, dropping those with insufficient history.
    pub async fn change_signals(
        &self,
        symbols: &[Symbol],
    ) -> Result<Vec<ChangeSignal>, ScreenerError> {
        let signals = stream::iter(symbols)
            .map(|symbol| self.change_tolerant(symbol))
            .buffer_unordered(self.concurrency)
            .try_collect::<Vec<_>>()
            .await?;

        Ok(signals.into_iter().flatten().collect())
    }

    async fn change_tolerant(&self, symbol: &Symbol) -> Result<Option<ChangeSignal>, ScreenerError> {
        match self.change(symbol).await {
            Ok(change) => Ok(Some(ChangeSignal::new(symbol.clone(), change))),
            Err(error @ ScreenerError::InsufficientHistory { .. }) => {
                info!(%symbol, %error, "excluding symbol");
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }
}

/// `(close_t - close_t-1) / close_t-1` over the two most recent completed candles.
///
/// A candle is completed once it closed before `now`, or once the exchange has opened a newer
/// candle after it, so a local clock lagging the exchange does not hide the latest close.
pub fn change_from_candles(
    symbol: &Symbol,
    candles: &[Candle],
    now: DateTime<Utc>,
) -> Result<f64, ScreenerError> {
    let newest_open = candles.iter().map(|candle| candle.open_time).max();
    let mut completed = candles
        .iter()
        .filter(|candle| {
            candle.is_complete(now) || newest_open.is_some_and(|open| candle.close_time < open)
        })
        .collect::<Vec<_>>();
    completed.sort_by_key(|candle| candle.open_time);

    let [.., previous, latest] = completed.as_slice() else {
        return Err(ScreenerError::InsufficientHistory {
            symbol: symbol.clone(),
            candles: completed.len(),
        });
    };

    if previous.close <= 0.0 {
        return Err(ScreenerError::malformed(
            "candles",
            format!("{symbol} close"),
            previous.close.to_string(),
        ));
    }

    Ok((latest.close - previous.close) / previous.close)
}
