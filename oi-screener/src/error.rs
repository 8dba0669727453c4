use crate::model::Symbol;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated in `oi-screener`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum ScreenerError {
    #[error("symbol {symbol} is not tradeable (code {code}): {message}")]
    TransientSymbol {
        symbol: Symbol,
        code: i64,
        message: String,
    },

    #[error("malformed {field} from {origin}: {value:?}")]
    MalformedData {
        origin: String,
        field: String,
        value: String,
    },

    #[error("no market cap entry for {symbol} (external id: {external_id})")]
    MissingMapping { symbol: Symbol, external_id: String },

    #[error("insufficient candle history for {symbol}: {candles} completed candle(s)")]
    InsufficientHistory { symbol: Symbol, candles: usize },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("api error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("market cap cache failure: {0}")]
    Cache(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ScreenerError {
    /// Construct a [`ScreenerError::MalformedData`] for a field received from an external source.
    pub fn malformed(
        origin: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::MalformedData {
            origin: origin.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    /// Determine if an error only invalidates a single symbol, which is then dropped from the
    /// screen rather than aborting the run.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_symbol_skippable(&self) -> bool {
        match self {
            ScreenerError::TransientSymbol { .. }
            | ScreenerError::MissingMapping { .. }
            | ScreenerError::InsufficientHistory { .. } => true,
            _ => false,
        }
    }

    /// Determine if an error must abort the whole screening run.
    pub fn is_fatal(&self) -> bool {
        !self.is_symbol_skippable()
    }
}

impl From<reqwest::Error> for ScreenerError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

impl From<url::ParseError> for ScreenerError {
    fn from(value: url::ParseError) -> Self {
        Self::Config(format!("invalid url: {value}"))
    }
}

impl From<std::io::Error> for ScreenerError {
    fn from(value: std::io::Error) -> Self {
        Self::Cache(value.to_string())
    }
}
