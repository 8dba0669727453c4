use super::MarketCapSource;
use crate::{error::ScreenerError, model::MarketCapEntry};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use smol_str::SmolStr;
use tracing::debug;
use url::Url;

/// CoinGecko public REST base url.
pub const COINGECKO_BASE_URL: &str = "https://api.coingecko.com";

/// Header carrying an optional CoinGecko demo api key.
const API_KEY_HEADER: &str = "x-cg-demo-api-key";

const ORIGIN: &str = "coingecko";
const MARKETS_PATH: &str = "/api/v3/coins/markets";

/// [`MarketCapSource`] implementation backed by the CoinGecko `coins/markets` listing.
///
/// See docs: <https://docs.coingecko.com/reference/coins-markets>
#[derive(Clone, Debug)]
pub struct CoinGeckoClient {
    http: Client,
    base_url: Url,
    vs_currency: SmolStr,
    api_key: Option<String>,
}

impl CoinGeckoClient {
    pub fn new(base_url: &str) -> Result<Self, ScreenerError> {
        Self::with_client(Client::new(), base_url)
    }

    /// Construct a [`CoinGeckoClient`] reusing an existing [`reqwest::Client`].
    pub fn with_client(http: Client, base_url: &str) -> Result<Self, ScreenerError> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            vs_currency: SmolStr::new_static("usd"),
            api_key: None,
        })
    }

    /// Set the currency market caps are denominated in.
    pub fn with_vs_currency(mut self, vs_currency: impl Into<SmolStr>) -> Self {
        self.vs_currency = vs_currency.into();
        self
    }

    /// Set the api key sent with every request.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }
}

#[async_trait]
impl MarketCapSource for CoinGeckoClient {
    async fn markets_page(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<MarketCapEntry>, ScreenerError> {
        let url = self.base_url.join(MARKETS_PATH)?;
        debug!(%url, page, per_page, "CoinGecko request");

        let mut request = self.http.get(url).query(&[
            ("vs_currency", self.vs_currency.to_string()),
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
        ]);
        if let Some(api_key) = &self.api_key {
            request = request.header(API_KEY_HEADER, api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(ScreenerError::Transport(format!(
                "CoinGecko markets page {page} failed ({status}): {}",
                String::from_utf8_lossy(&body)
            )));
        }

        parse_markets_page(&body)
    }
}

/// Subset of the CoinGecko coin market fields the screener consumes.
#[derive(Debug, Deserialize)]
struct CoinGeckoMarket {
    symbol: SmolStr,
    #[serde(default)]
    market_cap: Option<f64>,
}

impl TryFrom<CoinGeckoMarket> for MarketCapEntry {
    type Error = ScreenerError;

    fn try_from(market: CoinGeckoMarket) -> Result<Self, Self::Error> {
        match market.market_cap {
            Some(market_cap) if !market_cap.is_finite() || market_cap < 0.0 => Err(
                ScreenerError::malformed(ORIGIN, "market_cap", market_cap.to_string()),
            ),
            market_cap => Ok(Self {
                external_id: market.symbol,
                market_cap,
            }),
        }
    }
}

fn parse_markets_page(body: &[u8]) -> Result<Vec<MarketCapEntry>, ScreenerError> {
    serde_json::from_slice::<Vec<CoinGeckoMarket>>(body)
        .map_err(|error| ScreenerError::malformed(ORIGIN, MARKETS_PATH, error.to_string()))?
        .into_iter()
        .map(MarketCapEntry::try_from)
        .collect()
}
