use fnv::FnvHashMap;
use smol_str::SmolStr;

/// Known exchange symbols whose coin cannot be derived by the stripping heuristics.
pub const DEFAULT_OVERRIDES: &[(&str, &str)] = &[("1000SHIBUSDT", "shib")];

/// Contract size multipliers Binance prefixes onto low priced coins, eg/ "1000PEPEUSDT".
const MULTIPLIER_PREFIXES: &[&str] = &["1000"];

/// Quote currency suffixes stripped from an exchange symbol.
const QUOTE_SUFFIXES: &[&str] = &["USDT", "BUSD"];

/// Maps exchange symbols onto the market data provider's coin symbol namespace.
///
/// Mapping is best effort: the provider may hold no record for a mapped id, which callers
/// treat as missing data.
#[derive(Clone, Debug)]
pub struct SymbolMapper {
    overrides: FnvHashMap<SmolStr, SmolStr>,
}

impl Default for SymbolMapper {
    fn default() -> Self {
        Self::new(DEFAULT_OVERRIDES.iter().copied())
    }
}

impl SymbolMapper {
    /// Construct a [`SymbolMapper`] from an exact-match override table.
    pub fn new<Iter, S, Id>(overrides: Iter) -> Self
    where
        Iter: IntoIterator<Item = (S, Id)>,
        S: Into<SmolStr>,
        Id: Into<SmolStr>,
    {
        Self {
            overrides: overrides
                .into_iter()
                .map(|(symbol, id)| (symbol.into(), id.into()))
                .collect(),
        }
    }

    /// Add (or replace) an exact-match override.
    pub fn with_override(mut self, symbol: impl Into<SmolStr>, id: impl Into<SmolStr>) -> Self {
        self.overrides.insert(symbol.into(), id.into());
        self
    }

    /// Map an exchange symbol to the provider's coin id. Never fails.
    pub fn to_external_id(&self, symbol: &str) -> SmolStr {
        if let Some(id) = self.overrides.get(symbol) {
            return id.clone();
        }

        // Delivery contracts carry a settlement date, eg/ "BTCUSDT_250926"
        let base = symbol.split('_').next().unwrap_or(symbol);

        let base = MULTIPLIER_PREFIXES
            .iter()
            .find_map(|prefix| base.strip_prefix(prefix).filter(|rest| !rest.is_empty()))
            .unwrap_or(base);

        let base = QUOTE_SUFFIXES
            .iter()
            .find_map(|quote| base.strip_suffix(quote))
            .unwrap_or(base);

        SmolStr::new(base.to_lowercase())
    }
}
