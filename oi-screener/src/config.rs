//! Screener configuration and environment variable parsing.

use crate::{
    cache::{CacheConfig, store::DEFAULT_CACHE_PATH},
    change::DEFAULT_CANDLE_INTERVAL,
    error::ScreenerError,
    mapper::SymbolMapper,
    source::{binance::BINANCE_FUTURES_BASE_URL, coingecko::COINGECKO_BASE_URL},
};
use chrono::TimeDelta;
use smol_str::SmolStr;
use std::{path::PathBuf, str::FromStr};

/// Number of highest quote volume symbols screened by default.
pub const DEFAULT_TOP_N: usize = 10;

/// Quote currency a symbol's name must contain to be screened.
pub const DEFAULT_QUOTE: &str = "USDT";

/// Upper bound on the market cap listing pages fetched per refresh.
pub const MAX_MARKET_PAGES: u32 = 100;

/// Largest page size the market data provider serves.
pub const MAX_MARKET_PER_PAGE: u32 = 250;

/// Screener configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenerConfig {
    /// Number of highest quote volume symbols to screen
    pub top_n: usize,
    /// Quote currency a symbol's name must contain
    pub quote: SmolStr,
    /// Candle interval the change signal is measured over
    pub candle_interval: SmolStr,
    /// Maximum in-flight per-symbol requests (1 = sequential)
    pub concurrency: usize,
    /// Market cap snapshot pagination and freshness
    pub cache: CacheConfig,
    /// File the market cap snapshot persists to
    pub cache_path: PathBuf,
    /// Currency market caps are denominated in
    pub vs_currency: SmolStr,
    /// Exact-match symbol to coin id overrides, applied over the built-in table
    pub symbol_overrides: Vec<(SmolStr, SmolStr)>,
    pub binance_url: String,
    pub coingecko_url: String,
    pub coingecko_api_key: Option<String>,
    /// Optional JSON file the screen report is written to
    pub output_path: Option<PathBuf>,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            quote: SmolStr::new_static(DEFAULT_QUOTE),
            candle_interval: SmolStr::new_static(DEFAULT_CANDLE_INTERVAL),
            concurrency: 1,
            cache: CacheConfig::default(),
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            vs_currency: SmolStr::new_static("usd"),
            symbol_overrides: Vec::new(),
            binance_url: BINANCE_FUTURES_BASE_URL.to_string(),
            coingecko_url: COINGECKO_BASE_URL.to_string(),
            coingecko_api_key: None,
            output_path: None,
        }
    }
}

impl ScreenerConfig {
    /// Build a configuration from process environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ScreenerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from the provided variable lookup, falling back to defaults.
    ///
    /// Recognised variables:
    /// - `SCREENER_TOP_N`, `SCREENER_QUOTE`, `SCREENER_CANDLE_INTERVAL`, `SCREENER_CONCURRENCY`
    /// - `SCREENER_CACHE_PATH`, `SCREENER_CACHE_TTL_HOURS`, `SCREENER_MARKET_PAGES`,
    ///   `SCREENER_MARKET_PER_PAGE`
    /// - `SCREENER_SYMBOL_OVERRIDES` (eg/ `1000SATSUSDT=sats,1000RATSUSDT=rats`)
    /// - `SCREENER_OUTPUT`
    /// - `BINANCE_FUTURES_URL`, `COINGECKO_URL`, `COINGECKO_API_KEY`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ScreenerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(top_n) = parse_var(&lookup, "SCREENER_TOP_N")? {
            config.top_n = top_n;
        }
        if let Some(quote) = lookup("SCREENER_QUOTE") {
            config.quote = SmolStr::new(quote.trim().to_uppercase());
        }
        if let Some(interval) = lookup("SCREENER_CANDLE_INTERVAL") {
            config.candle_interval = SmolStr::new(interval.trim());
        }
        if let Some(concurrency) = parse_var::<usize>(&lookup, "SCREENER_CONCURRENCY")? {
            config = config.with_concurrency(concurrency);
        }
        if let Some(path) = lookup("SCREENER_CACHE_PATH") {
            config.cache_path = PathBuf::from(path);
        }
        if let Some(hours) = parse_var::<i64>(&lookup, "SCREENER_CACHE_TTL_HOURS")? {
            let ttl = TimeDelta::try_hours(hours)
                .filter(|ttl| *ttl > TimeDelta::zero())
                .ok_or_else(|| invalid("SCREENER_CACHE_TTL_HOURS", &hours.to_string()))?;
            config.cache.ttl = ttl;
        }
        if let Some(pages) = parse_var::<u32>(&lookup, "SCREENER_MARKET_PAGES")? {
            config.cache.pages = bounded("SCREENER_MARKET_PAGES", pages, MAX_MARKET_PAGES)?;
        }
        if let Some(per_page) = parse_var::<u32>(&lookup, "SCREENER_MARKET_PER_PAGE")? {
            config.cache.per_page =
                bounded("SCREENER_MARKET_PER_PAGE", per_page, MAX_MARKET_PER_PAGE)?;
        }
        if let Some(overrides) = lookup("SCREENER_SYMBOL_OVERRIDES") {
            config.symbol_overrides = parse_overrides(&overrides)?;
        }
        if let Some(path) = lookup("SCREENER_OUTPUT") {
            config.output_path = Some(PathBuf::from(path));
        }
        if let Some(url) = lookup("BINANCE_FUTURES_URL") {
            config.binance_url = url;
        }
        if let Some(url) = lookup("COINGECKO_URL") {
            config.coingecko_url = url;
        }
        config.coingecko_api_key = lookup("COINGECKO_API_KEY");

        Ok(config)
    }

    /// Set the number of highest quote volume symbols to screen
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Set the maximum in-flight per-symbol requests
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the market cap snapshot freshness window
    pub fn with_cache_ttl(mut self, ttl: TimeDelta) -> Self {
        self.cache.ttl = ttl;
        self
    }

    /// Set the market cap listing pagination
    pub fn with_market_pages(mut self, pages: u32, per_page: u32) -> Self {
        self.cache.pages = pages;
        self.cache.per_page = per_page;
        self
    }

    /// Add an exact-match symbol to coin id override
    pub fn with_symbol_override(
        mut self,
        symbol: impl Into<SmolStr>,
        id: impl Into<SmolStr>,
    ) -> Self {
        self.symbol_overrides.push((symbol.into(), id.into()));
        self
    }

    /// [`SymbolMapper`] with the built-in overrides plus any configured ones.
    pub fn symbol_mapper(&self) -> SymbolMapper {
        self.symbol_overrides
            .iter()
            .fold(SymbolMapper::default(), |mapper, (symbol, id)| {
                mapper.with_override(symbol.clone(), id.clone())
            })
    }
}

fn parse_var<T>(
    lookup: impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ScreenerError>
where
    T: FromStr,
{
    lookup(key)
        .map(|raw| raw.trim().parse::<T>().map_err(|_| invalid(key, &raw)))
        .transpose()
}

/// Accept `value` only within `1..=max`.
fn bounded(key: &str, value: u32, max: u32) -> Result<u32, ScreenerError> {
    if (1..=max).contains(&value) {
        Ok(value)
    } else {
        Err(invalid(key, &value.to_string()))
    }
}

fn parse_overrides(raw: &str) -> Result<Vec<(SmolStr, SmolStr)>, ScreenerError> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((symbol, id)) if !symbol.trim().is_empty() && !id.trim().is_empty() => Ok((
                SmolStr::new(symbol.trim().to_uppercase()),
                SmolStr::new(id.trim().to_lowercase()),
            )),
            _ => Err(invalid("SCREENER_SYMBOL_OVERRIDES", pair)),
        })
        .collect()
}

fn invalid(key: &str, value: &str) -> ScreenerError {
    ScreenerError::Config(format!("{key} has invalid value {value:?}"))
}
