use super::FuturesExchange;
use crate::{
    de::{datetime_from_epoch_ms, parse_f64, parse_non_negative_f64},
    error::ScreenerError,
    model::{Candle, Symbol, TickerRecord},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;
use url::Url;

/// Binance USD-M futures REST base url.
pub const BINANCE_FUTURES_BASE_URL: &str = "https://fapi.binance.com";

/// Binance error code for a symbol that is delivering, settled, closed or pre-trading.
pub const NOT_TRADEABLE_CODE: i64 = -4108;

const ORIGIN: &str = "binance";

/// [`FuturesExchange`] implementation backed by the Binance USD-M futures REST API.
///
/// See docs: <https://developers.binance.com/docs/derivatives/usds-margined-futures/market-data/rest-api>
#[derive(Clone, Debug)]
pub struct BinanceFuturesClient {
    http: Client,
    base_url: Url,
}

impl BinanceFuturesClient {
    pub fn new(base_url: &str) -> Result<Self, ScreenerError> {
        Self::with_client(Client::new(), base_url)
    }

    /// Construct a [`BinanceFuturesClient`] reusing an existing [`reqwest::Client`].
    pub fn with_client(http: Client, base_url: &str) -> Result<Self, ScreenerError> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
        })
    }

    async fn get<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ScreenerError>
    where
        T: DeserializeOwned,
    {
        let url = self.base_url.join(path)?;
        debug!(%url, ?query, "Binance request");

        let response = self.http.get(url).query(query).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(match serde_json::from_slice::<BinanceErrorBody>(&body) {
                Ok(error) => ScreenerError::Api {
                    code: error.code,
                    message: error.msg,
                },
                Err(_) => ScreenerError::Transport(format!(
                    "Binance {path} failed ({status}): {}",
                    String::from_utf8_lossy(&body)
                )),
            });
        }

        serde_json::from_slice(&body)
            .map_err(|error| ScreenerError::malformed(ORIGIN, path, error.to_string()))
    }
}

#[async_trait]
impl FuturesExchange for BinanceFuturesClient {
    async fn tickers(&self) -> Result<Vec<TickerRecord>, ScreenerError> {
        self.get::<Vec<BinanceTicker24h>>("/fapi/v1/ticker/24hr", &[])
            .await?
            .into_iter()
            .map(TickerRecord::try_from)
            .collect()
    }

    async fn open_interest(&self, symbol: &Symbol) -> Result<f64, ScreenerError> {
        let response = self
            .get::<BinanceOpenInterest>("/fapi/v1/openInterest", &[("symbol", symbol.to_string())])
            .await
            .map_err(|error| classify_open_interest_error(symbol, error))?;

        parse_non_negative_f64(ORIGIN, "openInterest", &response.open_interest)
    }

    async fn klines(
        &self,
        symbol: &Symbol,
        interval: &str,
        limit: u16,
    ) -> Result<Vec<Candle>, ScreenerError> {
        let query = [
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
            ("limit", limit.to_string()),
        ];

        self.get::<Vec<BinanceKline>>("/fapi/v1/klines", &query)
            .await?
            .into_iter()
            .map(Candle::try_from)
            .collect()
    }
}

/// Map the Binance "not tradeable" api error onto a per-symbol [`ScreenerError::TransientSymbol`].
fn classify_open_interest_error(symbol: &Symbol, error: ScreenerError) -> ScreenerError {
    match error {
        ScreenerError::Api {
            code: NOT_TRADEABLE_CODE,
            message,
        } => ScreenerError::TransientSymbol {
            symbol: symbol.clone(),
            code: NOT_TRADEABLE_CODE,
            message,
        },
        other => other,
    }
}

/// Binance error response body.
#[derive(Debug, Deserialize)]
struct BinanceErrorBody {
    code: i64,
    msg: String,
}

/// Subset of the Binance 24hr ticker fields the screener consumes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTicker24h {
    symbol: String,
    quote_volume: String,
    last_price: String,
    price_change_percent: String,
}

impl TryFrom<BinanceTicker24h> for TickerRecord {
    type Error = ScreenerError;

    fn try_from(ticker: BinanceTicker24h) -> Result<Self, Self::Error> {
        Ok(Self {
            quote_volume: parse_non_negative_f64(ORIGIN, "quoteVolume", &ticker.quote_volume)?,
            last_price: parse_f64(ORIGIN, "lastPrice", &ticker.last_price)?,
            price_change_percent: parse_f64(
                ORIGIN,
                "priceChangePercent",
                &ticker.price_change_percent,
            )?,
            symbol: Symbol::from(ticker.symbol),
        })
    }
}

/// Binance open interest response.
#[derive(Debug, Deserialize)]
struct BinanceOpenInterest {
    #[serde(rename = "openInterest")]
    open_interest: String,
}

/// Binance kline response format
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct BinanceKline(
    i64,    // 0: Open time
    String, // 1: Open
    String, // 2: High
    String, // 3: Low
    String, // 4: Close
    String, // 5: Volume
    i64,    // 6: Close time
    String, // 7: Quote asset volume
    i64,    // 8: Number of trades
    String, // 9: Taker buy base asset volume
    String, // 10: Taker buy quote asset volume
    String, // 11: Ignore
);

impl TryFrom<BinanceKline> for Candle {
    type Error = ScreenerError;

    fn try_from(kline: BinanceKline) -> Result<Self, Self::Error> {
        Ok(Self {
            open_time: datetime_from_epoch_ms(ORIGIN, "openTime", kline.0)?,
            close_time: datetime_from_epoch_ms(ORIGIN, "closeTime", kline.6)?,
            close: parse_f64(ORIGIN, "close", &kline.4)?,
        })
    }
}
