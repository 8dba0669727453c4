//! Freshness-bounded cache of the market data provider's coin listing.
//!
//! A [`MarketCapCache`] serves one [`MarketSnapshot`] per screening run. If the persisted
//! snapshot is younger than the freshness window it is reused, otherwise the full paginated
//! listing is fetched and the persisted snapshot is replaced.

use crate::{
    error::ScreenerError,
    mapper::SymbolMapper,
    model::{MarketCapEntry, Symbol},
    source::MarketCapSource,
};
use chrono::{DateTime, TimeDelta, Utc};
use derive_more::Constructor;
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub mod store;

pub use store::{FileSnapshotStore, InMemorySnapshotStore, SnapshotStore};

/// Full coin market listing captured at `fetched_at`.
#[derive(Clone, PartialEq, Debug, Constructor, Deserialize, Serialize)]
pub struct MarketSnapshot {
    pub fetched_at: DateTime<Utc>,
    pub entries: Vec<MarketCapEntry>,
}

impl MarketSnapshot {
    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.fetched_at
    }

    /// A snapshot is fresh while its age is strictly below the `ttl`.
    ///
    /// A snapshot stamped in the future has no trustworthy age and is never fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        let age = self.age(now);
        age >= TimeDelta::zero() && age < ttl
    }

    /// Resolve the market cap of each symbol via the [`SymbolMapper`].
    ///
    /// The first listing row whose id matches wins. Symbols with no matching row, or whose
    /// row reports no market cap, are absent from the output.
    pub fn market_caps(&self, symbols: &[Symbol], mapper: &SymbolMapper) -> FnvHashMap<Symbol, f64> {
        let mut index = FnvHashMap::<&str, &MarketCapEntry>::default();
        for entry in &self.entries {
            index.entry(entry.external_id.as_str()).or_insert(entry);
        }

        symbols
            .iter()
            .filter_map(|symbol| {
                let external_id = mapper.to_external_id(symbol.as_str());
                match index.get(external_id.as_str()) {
                    Some(MarketCapEntry {
                        market_cap: Some(market_cap),
                        ..
                    }) => Some((symbol.clone(), *market_cap)),
                    Some(_) => {
                        warn!(%symbol, %external_id, "market cap not reported");
                        None
                    }
                    None => {
                        let error = ScreenerError::MissingMapping {
                            symbol: symbol.clone(),
                            external_id: external_id.to_string(),
                        };
                        info!(%error, "missing market cap");
                        None
                    }
                }
            })
            .collect()
    }
}

/// Pagination and freshness settings of a [`MarketCapCache`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CacheConfig {
    pub ttl: TimeDelta,
    pub pages: u32,
    pub per_page: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: TimeDelta::hours(24),
            pages: 6,
            per_page: 250,
        }
    }
}

/// Serves [`MarketSnapshot`]s from a [`SnapshotStore`], refreshing from a [`MarketCapSource`]
/// once the stored snapshot falls outside the freshness window.
#[derive(Debug)]
pub struct MarketCapCache<Source, Store> {
    source: Source,
    store: Store,
    mapper: SymbolMapper,
    config: CacheConfig,
}

impl<Source, Store> MarketCapCache<Source, Store>
where
    Source: MarketCapSource,
    Store: SnapshotStore,
{
    pub fn new(source: Source, store: Store, mapper: SymbolMapper, config: CacheConfig) -> Self {
        Self {
            source,
            store,
            mapper,
            config,
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn mapper(&self) -> &SymbolMapper {
        &self.mapper
    }

    /// Load the snapshot to use for one screening run, fetching a fresh one if required.
    pub async fn snapshot(&self) -> Result<MarketSnapshot, ScreenerError> {
        self.snapshot_at(Utc::now()).await
    }

    /// Load the snapshot as of `now`, fetching a fresh one if required.
    pub async fn snapshot_at(&self, now: DateTime<Utc>) -> Result<MarketSnapshot, ScreenerError> {
        match self.store.load()? {
            Some(snapshot) if snapshot.is_fresh(now, self.config.ttl) => {
                info!(
                    entries = snapshot.entries.len(),
                    age_secs = snapshot.age(now).num_seconds(),
                    "using cached market caps"
                );
                return Ok(snapshot);
            }
            Some(snapshot) => {
                info!(
                    age_secs = snapshot.age(now).num_seconds(),
                    "cached market caps expired, refreshing"
                );
            }
            None => {
                info!("no cached market caps, fetching");
            }
        }

        self.refresh(now).await
    }

    /// Resolve market caps for the provided symbols from a single snapshot load.
    pub async fn get_market_caps(
        &self,
        symbols: &[Symbol],
    ) -> Result<FnvHashMap<Symbol, f64>, ScreenerError> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.market_caps(symbols, &self.mapper))
    }

    async fn refresh(&self, now: DateTime<Utc>) -> Result<MarketSnapshot, ScreenerError> {
        if self.config.pages == 0 || self.config.per_page == 0 {
            return Err(ScreenerError::Config(format!(
                "market cap listing needs at least one non-empty page, got {} x {}",
                self.config.pages, self.config.per_page
            )));
        }

        let mut entries = Vec::new();
        for page in 1..=self.config.pages {
            let page_entries = self.source.markets_page(page, self.config.per_page).await?;
            debug!(page, entries = page_entries.len(), "fetched market cap page");
            entries.extend(page_entries);
        }

        let snapshot = MarketSnapshot::new(now, entries);
        match self.store.store(&snapshot) {
            Ok(()) => info!(entries = snapshot.entries.len(), "saved market caps to cache"),
            Err(error) => warn!(%error, "failed to save market cap cache"),
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use smol_str::SmolStr;

    #[derive(Default)]
    struct MockMarkets {
        requests: Mutex<Vec<(u32, u32)>>,
    }

    #[async_trait]
    impl MarketCapSource for MockMarkets {
        async fn markets_page(
            &self,
            page: u32,
            per_page: u32,
        ) -> Result<Vec<MarketCapEntry>, ScreenerError> {
            self.requests.lock().push((page, per_page));
            Ok(match page {
                1 => vec![
                    entry("btc", Some(1_200_000_000_000.0)),
                    entry("eth", Some(400_000_000_000.0)),
                ],
                2 => vec![entry("doge", Some(50_000_000.0)), entry("btc", Some(1.0))],
                _ => vec![],
            })
        }
    }

    struct FailingMarkets;

    #[async_trait]
    impl MarketCapSource for FailingMarkets {
        async fn markets_page(&self, _: u32, _: u32) -> Result<Vec<MarketCapEntry>, ScreenerError> {
            Err(ScreenerError::Transport("connection refused".to_string()))
        }
    }

    fn entry(id: &str, market_cap: Option<f64>) -> MarketCapEntry {
        MarketCapEntry::new(SmolStr::new(id), market_cap)
    }

    fn config() -> CacheConfig {
        CacheConfig {
            ttl: TimeDelta::hours(24),
            pages: 3,
            per_page: 2,
        }
    }

    fn cache(
        snapshot: Option<MarketSnapshot>,
    ) -> MarketCapCache<MockMarkets, InMemorySnapshotStore> {
        MarketCapCache::new(
            MockMarkets::default(),
            InMemorySnapshotStore::new(snapshot),
            SymbolMapper::default(),
            config(),
        )
    }

    #[tokio::test]
    async fn test_snapshot_fresh_is_reused_without_fetch() {
        let now = Utc::now();
        let cached = MarketSnapshot::new(now - TimeDelta::hours(23), vec![entry("sol", Some(1.0))]);
        let cache = cache(Some(cached.clone()));

        let actual = cache.snapshot_at(now).await.unwrap();

        assert_eq!(actual, cached);
        assert!(cache.source.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_stale_is_refetched_and_replaced() {
        let now = Utc::now();
        let cached = MarketSnapshot::new(now - TimeDelta::hours(25), vec![entry("sol", Some(1.0))]);
        let cache = cache(Some(cached));

        let actual = cache.snapshot_at(now).await.unwrap();

        assert_eq!(actual.fetched_at, now);
        assert_eq!(actual.entries.len(), 4);
        assert_eq!(*cache.source.requests.lock(), vec![(1, 2), (2, 2), (3, 2)]);
        assert_eq!(cache.store.load().unwrap(), Some(actual));
    }

    #[tokio::test]
    async fn test_snapshot_exactly_ttl_old_is_refetched() {
        let now = Utc::now();
        let cached = MarketSnapshot::new(now - TimeDelta::hours(24), vec![]);
        let cache = cache(Some(cached));

        cache.snapshot_at(now).await.unwrap();

        assert_eq!(cache.source.requests.lock().len(), 3);
    }

    #[test]
    fn test_snapshot_is_fresh() {
        struct TestCase {
            age: TimeDelta,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: just fetched
                age: TimeDelta::zero(),
                expected: true,
            },
            TestCase {
                // TC1: inside the window
                age: TimeDelta::hours(23),
                expected: true,
            },
            TestCase {
                // TC2: exactly the window
                age: TimeDelta::hours(24),
                expected: false,
            },
            TestCase {
                // TC3: stamped in the future
                age: TimeDelta::minutes(-5),
                expected: false,
            },
        ];

        let now = Utc::now();
        for (index, test) in tests.into_iter().enumerate() {
            let snapshot = MarketSnapshot::new(now - test.age, vec![]);
            assert_eq!(
                snapshot.is_fresh(now, TimeDelta::hours(24)),
                test.expected,
                "TC{} failed",
                index
            );
        }
    }

    #[tokio::test]
    async fn test_snapshot_future_timestamp_is_refetched() {
        let now = Utc::now();
        let cached = MarketSnapshot::new(now + TimeDelta::hours(2), vec![entry("sol", Some(1.0))]);
        let cache = cache(Some(cached));

        let actual = cache.snapshot_at(now).await.unwrap();

        assert_eq!(actual.fetched_at, now);
        assert_eq!(cache.source.requests.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_snapshot_large_page_size_does_not_overflow() {
        let cache = MarketCapCache::new(
            MockMarkets::default(),
            InMemorySnapshotStore::default(),
            SymbolMapper::default(),
            CacheConfig {
                ttl: TimeDelta::hours(24),
                pages: 3,
                per_page: u32::MAX,
            },
        );

        let actual = cache.snapshot().await.unwrap();

        assert_eq!(actual.entries.len(), 4);
        assert_eq!(cache.source.requests.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_snapshot_empty_pagination_is_rejected() {
        let cache = MarketCapCache::new(
            MockMarkets::default(),
            InMemorySnapshotStore::default(),
            SymbolMapper::default(),
            CacheConfig {
                pages: 0,
                ..config()
            },
        );

        let actual = cache.snapshot().await;

        assert!(matches!(actual, Err(ScreenerError::Config(_))));
        assert!(cache.source.requests.lock().is_empty());
        assert_eq!(cache.store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_snapshot_absent_is_fetched() {
        let cache = cache(None);

        let actual = cache.snapshot().await.unwrap();

        assert_eq!(actual.entries.len(), 4);
        assert_eq!(cache.source.requests.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_snapshot_fetch_failure_keeps_previous_snapshot() {
        let now = Utc::now();
        let cached = MarketSnapshot::new(now - TimeDelta::hours(30), vec![entry("sol", Some(1.0))]);
        let cache = MarketCapCache::new(
            FailingMarkets,
            InMemorySnapshotStore::new(Some(cached.clone())),
            SymbolMapper::default(),
            config(),
        );

        let actual = cache.snapshot_at(now).await;

        assert_eq!(
            actual,
            Err(ScreenerError::Transport("connection refused".to_string()))
        );
        assert_eq!(cache.store.load().unwrap(), Some(cached));
    }

    #[tokio::test]
    async fn test_get_market_caps() {
        let cache = cache(None);
        let symbols = [
            Symbol::from("BTCUSDT"),
            Symbol::from("DOGEUSDT"),
            Symbol::from("XYZUSDT"),
        ];

        let actual = cache.get_market_caps(&symbols).await.unwrap();

        // First matching row wins for duplicated ids
        assert_eq!(actual.get(&Symbol::from("BTCUSDT")), Some(&1_200_000_000_000.0));
        assert_eq!(actual.get(&Symbol::from("DOGEUSDT")), Some(&50_000_000.0));
        assert_eq!(actual.get(&Symbol::from("XYZUSDT")), None);
        assert_eq!(actual.len(), 2);
    }

    #[test]
    fn test_market_caps_null_market_cap_is_absent() {
        let snapshot = MarketSnapshot::new(
            Utc::now(),
            vec![entry("shib", None), entry("shib", Some(10.0))],
        );

        let actual = snapshot.market_caps(&[Symbol::from("1000SHIBUSDT")], &SymbolMapper::default());

        assert!(actual.is_empty());
    }
}
