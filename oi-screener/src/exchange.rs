use crate::{
    error::ScreenerError,
    model::{OpenInterestRecord, SymbolOpenInterest, TickerRecord},
    source::FuturesExchange,
};
use fnv::FnvHashSet;
use futures::{StreamExt, TryStreamExt, stream};
use itertools::Itertools;
use tracing::{debug, warn};

/// Selects the highest volume contracts and values their open interest in USD.
#[derive(Debug)]
pub struct ExchangeDataFetcher<'a, Exchange> {
    exchange: &'a Exchange,
    quote: &'a str,
    concurrency: usize,
}

impl<'a, Exchange> ExchangeDataFetcher<'a, Exchange>
where
    Exchange: FuturesExchange,
{
    /// Construct an [`ExchangeDataFetcher`] selecting symbols whose name contains `quote`.
    ///
    /// Open interest requests run one at a time unless [`Self::with_concurrency`] is used.
    pub fn new(exchange: &'a Exchange, quote: &'a str) -> Self {
        Self {
            exchange,
            quote,
            concurrency: 1,
        }
    }

    /// Set the maximum number of in-flight per-symbol requests.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Fetch tickers and return the `n` eligible ones with the highest quote volume, descending.
    pub async fn top_volume_tickers(&self, n: usize) -> Result<Vec<TickerRecord>, ScreenerError> {
        let tickers = self.exchange.tickers().await?;
        Ok(select_top_volume(tickers, self.quote, n))
    }

    /// Fetch the open interest of one ticker's symbol, valued at the ticker's last price.
    pub async fn open_interest(
        &self,
        ticker: &TickerRecord,
    ) -> Result<OpenInterestRecord, ScreenerError> {
        let open_interest = self.exchange.open_interest(&ticker.symbol).await?;
        Ok(OpenInterestRecord::from_ticker(ticker, open_interest))
    }

    /// Fetch open interest for the top `n` symbols by quote volume.
    ///
    /// Symbols that are not currently tradeable are skipped, any other failure aborts.
    /// Output order is unspecified when running with concurrency above one.
    pub async fn open_interest_for_top_symbols(
        &self,
        n: usize,
    ) -> Result<Vec<SymbolOpenInterest>, ScreenerError> {
        let tickers = self.top_volume_tickers(n).await?;

        let fetched = stream::iter(tickers)
            .map(|ticker| self.fetch_tolerant(ticker))
            .buffer_unordered(self.concurrency)
            .try_collect::<Vec<_>>()
            .await?;

        Ok(fetched.into_iter().flatten().collect())
    }

    async fn fetch_tolerant(
        &self,
        ticker: TickerRecord,
    ) -> Result<Option<SymbolOpenInterest>, ScreenerError> {
        match self.open_interest(&ticker).await {
            Ok(open_interest) => Ok(Some(SymbolOpenInterest::new(ticker, open_interest))),
            Err(error @ ScreenerError::TransientSymbol { .. }) => {
                warn!(symbol = %ticker.symbol, %error, "skipping symbol");
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }
}

/// Filter `tickers` to unique symbols containing `quote` with a positive last price, and take
/// the `n` with the highest quote volume.
pub fn select_top_volume(tickers: Vec<TickerRecord>, quote: &str, n: usize) -> Vec<TickerRecord> {
    let mut seen = FnvHashSet::default();

    tickers
        .into_iter()
        .filter(|ticker| ticker.symbol.as_str().contains(quote))
        .filter(|ticker| {
            if ticker.last_price > 0.0 {
                true
            } else {
                debug!(symbol = %ticker.symbol, last_price = ticker.last_price, "ignoring unpriced contract");
                false
            }
        })
        .filter(|ticker| {
            if seen.insert(ticker.symbol.clone()) {
                true
            } else {
                warn!(symbol = %ticker.symbol, "ignoring duplicate ticker");
                false
            }
        })
        .sorted_by(|a, b| b.quote_volume.total_cmp(&a.quote_volume))
        .take(n)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Candle, Symbol};
    use async_trait::async_trait;
    use fnv::FnvHashMap;
    use parking_lot::Mutex;

    struct MockExchange {
        tickers: Vec<TickerRecord>,
        open_interest: FnvHashMap<Symbol, Result<f64, ScreenerError>>,
        requested: Mutex<Vec<Symbol>>,
    }

    #[async_trait]
    impl FuturesExchange for MockExchange {
        async fn tickers(&self) -> Result<Vec<TickerRecord>, ScreenerError> {
            Ok(self.tickers.clone())
        }

        async fn open_interest(&self, symbol: &Symbol) -> Result<f64, ScreenerError> {
            self.requested.lock().push(symbol.clone());
            self.open_interest
                .get(symbol)
                .cloned()
                .unwrap_or_else(|| Err(ScreenerError::Transport(format!("no route to {symbol}"))))
        }

        async fn klines(&self, _: &Symbol, _: &str, _: u16) -> Result<Vec<Candle>, ScreenerError> {
            Ok(vec![])
        }
    }

    fn ticker(symbol: &str, quote_volume: f64, last_price: f64) -> TickerRecord {
        TickerRecord::new(Symbol::from(symbol), quote_volume, last_price, 1.5)
    }

    fn not_tradeable(symbol: &str) -> ScreenerError {
        ScreenerError::TransientSymbol {
            symbol: Symbol::from(symbol),
            code: -4108,
            message: "Symbol is closed.".to_string(),
        }
    }

    fn exchange(open_interest: Vec<(&str, Result<f64, ScreenerError>)>) -> MockExchange {
        MockExchange {
            tickers: vec![
                ticker("BTCUSDT", 9_000.0, 60_000.0),
                ticker("ETHUSDT", 8_000.0, 3_000.0),
                ticker("ETHBTC", 100_000.0, 0.05),
                ticker("DOGEUSDT", 7_000.0, 0.5),
                ticker("SOLUSDT", 1_000.0, 150.0),
                ticker("BTCSTUSDT", 7_500.0, 4.0),
            ],
            open_interest: open_interest
                .into_iter()
                .map(|(symbol, result)| (Symbol::from(symbol), result))
                .collect(),
            requested: Mutex::new(vec![]),
        }
    }

    #[test]
    fn test_select_top_volume() {
        struct TestCase {
            input: Vec<TickerRecord>,
            n: usize,
            expected: Vec<&'static str>,
        }

        let tests = vec![
            TestCase {
                // TC0: sorted descending and truncated, non-USDT excluded
                input: vec![
                    ticker("SOLUSDT", 10.0, 1.0),
                    ticker("ETHBTC", 1_000.0, 1.0),
                    ticker("BTCUSDT", 30.0, 1.0),
                    ticker("ETHUSDT", 20.0, 1.0),
                ],
                n: 2,
                expected: vec!["BTCUSDT", "ETHUSDT"],
            },
            TestCase {
                // TC1: fewer eligible than n
                input: vec![ticker("SOLUSDT", 10.0, 1.0), ticker("ETHBTC", 1_000.0, 1.0)],
                n: 5,
                expected: vec!["SOLUSDT"],
            },
            TestCase {
                // TC2: duplicate symbols keep the first occurrence
                input: vec![ticker("BTCUSDT", 1.0, 1.0), ticker("BTCUSDT", 99.0, 1.0)],
                n: 5,
                expected: vec!["BTCUSDT"],
            },
            TestCase {
                // TC3: unpriced contracts are not eligible
                input: vec![ticker("OLDUSDT", 99.0, 0.0), ticker("BTCUSDT", 1.0, 1.0)],
                n: 5,
                expected: vec!["BTCUSDT"],
            },
            TestCase {
                // TC4: delivery contracts contain the quote and are eligible
                input: vec![ticker("BTCUSDT_250926", 5.0, 1.0)],
                n: 5,
                expected: vec!["BTCUSDT_250926"],
            },
            TestCase {
                // TC5: n of zero
                input: vec![ticker("BTCUSDT", 1.0, 1.0)],
                n: 0,
                expected: vec![],
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = select_top_volume(test.input, "USDT", test.n)
                .into_iter()
                .map(|ticker| ticker.symbol.to_string())
                .collect::<Vec<_>>();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_select_top_volume_keeps_first_duplicate_fields() {
        let actual = select_top_volume(
            vec![ticker("BTCUSDT", 1.0, 1.0), ticker("BTCUSDT", 99.0, 1.0)],
            "USDT",
            5,
        );
        assert_eq!(actual[0].quote_volume, 1.0);
    }

    #[tokio::test]
    async fn test_open_interest_for_top_symbols_values_in_usd() {
        let exchange = exchange(vec![
            ("BTCUSDT", Ok(10.0)),
            ("ETHUSDT", Ok(100.0)),
            ("BTCSTUSDT", Ok(1.0)),
            ("DOGEUSDT", Ok(1_000_000.0)),
        ]);
        let fetcher = ExchangeDataFetcher::new(&exchange, "USDT");

        let actual = fetcher.open_interest_for_top_symbols(4).await.unwrap();

        let symbols = actual
            .iter()
            .map(|oi| oi.open_interest.symbol.as_str())
            .collect::<Vec<_>>();
        assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT", "BTCSTUSDT", "DOGEUSDT"]);

        let doge = &actual[3];
        assert_eq!(doge.open_interest.open_interest_usd, 500_000.0);
        assert_eq!(doge.ticker.quote_volume, 7_000.0);
        assert_eq!(doge.ticker.price_change_percent, 1.5);
    }

    #[tokio::test]
    async fn test_open_interest_for_top_symbols_skips_not_tradeable() {
        let exchange = exchange(vec![
            ("BTCUSDT", Ok(10.0)),
            ("ETHUSDT", Ok(100.0)),
            ("BTCSTUSDT", Err(not_tradeable("BTCSTUSDT"))),
            ("DOGEUSDT", Ok(1_000_000.0)),
        ]);
        let fetcher = ExchangeDataFetcher::new(&exchange, "USDT");

        let actual = fetcher.open_interest_for_top_symbols(4).await.unwrap();

        assert_eq!(actual.len(), 3);
        assert!(
            actual
                .iter()
                .all(|oi| oi.open_interest.symbol != Symbol::from("BTCSTUSDT"))
        );
    }

    #[tokio::test]
    async fn test_open_interest_for_top_symbols_aborts_on_other_failure() {
        let exchange = exchange(vec![
            ("BTCUSDT", Ok(10.0)),
            ("ETHUSDT", Err(ScreenerError::Transport("connection reset".to_string()))),
        ]);
        let fetcher = ExchangeDataFetcher::new(&exchange, "USDT");

        let actual = fetcher.open_interest_for_top_symbols(4).await;

        assert_eq!(
            actual,
            Err(ScreenerError::Transport("connection reset".to_string()))
        );
    }

    #[tokio::test]
    async fn test_open_interest_for_top_symbols_concurrent() {
        let exchange = exchange(vec![
            ("BTCUSDT", Ok(10.0)),
            ("ETHUSDT", Ok(100.0)),
            ("BTCSTUSDT", Err(not_tradeable("BTCSTUSDT"))),
            ("DOGEUSDT", Ok(1_000_000.0)),
            ("SOLUSDT", Ok(5.0)),
        ]);
        let fetcher = ExchangeDataFetcher::new(&exchange, "USDT").with_concurrency(3);

        let mut actual = fetcher
            .open_interest_for_top_symbols(10)
            .await
            .unwrap()
            .into_iter()
            .map(|oi| oi.open_interest.symbol.to_string())
            .collect::<Vec<_>>();
        actual.sort();

        assert_eq!(actual, vec!["BTCUSDT", "DOGEUSDT", "ETHUSDT", "SOLUSDT"]);
        assert_eq!(exchange.requested.lock().len(), 5);
    }
}
