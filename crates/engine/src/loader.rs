//! Bar loading with period/interval fallbacks and a read-through cache
//!
//! Providers reject some period/interval combinations (minute bars over a
//! year, for example). With auto-fix enabled the loader walks a fixed list of
//! safer combinations and returns the first non-empty result, recording every
//! attempt for display.

use chrono::Utc;
use persistence::repository::{BarCacheRepository, CacheKey, CachedBars};
use persistence::SqlitePool;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{Interval, MarketDataProvider, Period};
use crate::types::Kline;

/// Seconds a cached response stays fresh
pub const DEFAULT_CACHE_TTL_SECS: i64 = 600;

/// Tried in order after the requested combination when auto-fix is on
pub const FALLBACK_COMBOS: [(Period, Interval); 5] = [
    (Period::Year1, Interval::Day1),
    (Period::Month6, Interval::Day1),
    (Period::Month1, Interval::Hour1),
    (Period::Days7, Interval::Hour1),
    (Period::Days60, Interval::Min5),
];

/// One provider (or cache) lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchAttempt {
    pub period: Period,
    pub interval: Interval,
    pub rows: usize,
    pub cached: bool,
    pub error: Option<String>,
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("no data for {symbol} after {} attempts", .attempts.len())]
    NoData {
        symbol: String,
        attempts: Vec<FetchAttempt>,
    },
}

impl LoadError {
    pub fn attempts(&self) -> &[FetchAttempt] {
        match self {
            LoadError::NoData { attempts, .. } => attempts,
        }
    }
}

/// Bars plus the combination that produced them
#[derive(Debug, Clone, Serialize)]
pub struct LoadedBars {
    pub symbol: String,
    pub provider: String,
    pub period: Period,
    pub interval: Interval,
    pub klines: Vec<Kline>,
    pub attempts: Vec<FetchAttempt>,
}

/// SQLite-backed cache keyed by (symbol, period, interval)
pub struct BarCache<'a> {
    pool: &'a SqlitePool,
    ttl_secs: i64,
}

impl<'a> BarCache<'a> {
    pub fn new(pool: &'a SqlitePool, ttl_secs: i64) -> Self {
        Self { pool, ttl_secs }
    }

    async fn get(&self, key: &CacheKey, provider: &str) -> Option<Vec<Kline>> {
        let repo = BarCacheRepository::new(self.pool);
        let now = Utc::now().timestamp();
        let entry = match repo.get_fresh(key, provider, self.ttl_secs, now).await {
            Ok(entry) => entry?,
            Err(e) => {
                warn!(symbol = %key.symbol, "Cache read failed: {}", e);
                return None;
            }
        };
        match serde_json::from_str(&entry.bars_json) {
            Ok(klines) => Some(klines),
            Err(e) => {
                warn!(symbol = %key.symbol, "Discarding unreadable cache entry: {}", e);
                None
            }
        }
    }

    async fn put(&self, key: &CacheKey, provider: &str, klines: &[Kline]) {
        let bars_json = match serde_json::to_string(klines) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to encode bars for cache: {}", e);
                return;
            }
        };
        let entry = CachedBars {
            symbol: key.symbol.clone(),
            period: key.period.clone(),
            interval: key.interval.clone(),
            provider: provider.to_string(),
            fetched_at: Utc::now().timestamp(),
            row_count: klines.len() as i64,
            bars_json,
        };
        if let Err(e) = BarCacheRepository::new(self.pool).put(&entry).await {
            warn!(symbol = %key.symbol, "Cache write failed: {}", e);
        }
    }
}

/// Fetches bars through an optional cache, falling back across combinations
pub struct BarLoader<'a> {
    provider: &'a dyn MarketDataProvider,
    cache: Option<BarCache<'a>>,
}

impl<'a> BarLoader<'a> {
    pub fn new(provider: &'a dyn MarketDataProvider) -> Self {
        Self {
            provider,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: BarCache<'a>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Load bars for `symbol`, trying fallbacks when `autofix` is set
    pub async fn load(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
        autofix: bool,
    ) -> Result<LoadedBars, LoadError> {
        let mut combos = vec![(period, interval)];
        if autofix {
            for combo in FALLBACK_COMBOS {
                if !combos.contains(&combo) {
                    combos.push(combo);
                }
            }
        }

        let provider = self.provider.name();
        let mut attempts = Vec::with_capacity(combos.len());

        for (period, interval) in combos {
            let (result, cached) = self.fetch_one(symbol, period, interval).await;
            match result {
                Ok(klines) => {
                    attempts.push(FetchAttempt {
                        period,
                        interval,
                        rows: klines.len(),
                        cached,
                        error: None,
                    });
                    if !klines.is_empty() {
                        info!(
                            symbol,
                            provider,
                            period = %period,
                            interval = %interval,
                            rows = klines.len(),
                            cached,
                            "Loaded bars"
                        );
                        return Ok(LoadedBars {
                            symbol: symbol.to_string(),
                            provider: provider.to_string(),
                            period,
                            interval,
                            klines,
                            attempts,
                        });
                    }
                }
                Err(e) => {
                    warn!(symbol, period = %period, interval = %interval, "Fetch failed: {:#}", e);
                    attempts.push(FetchAttempt {
                        period,
                        interval,
                        rows: 0,
                        cached: false,
                        error: Some(format!("{:#}", e)),
                    });
                }
            }
        }

        Err(LoadError::NoData {
            symbol: symbol.to_string(),
            attempts,
        })
    }

    async fn fetch_one(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> (anyhow::Result<Vec<Kline>>, bool) {
        let key = CacheKey::new(symbol, period.as_str(), interval.as_str());
        let provider = self.provider.name();

        if let Some(cache) = &self.cache {
            if let Some(klines) = cache.get(&key, provider).await {
                debug!(symbol, period = %period, interval = %interval, "Cache hit");
                return (Ok(klines), true);
            }
        }

        let result = self.provider.fetch_bars(symbol, period, interval).await;
        if let (Some(cache), Ok(klines)) = (&self.cache, &result) {
            // Empty responses are not worth remembering
            if !klines.is_empty() {
                cache.put(&key, provider, klines).await;
            }
        }
        (result, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use persistence::Database;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Reply {
        Bars(usize),
        Empty,
        Fail,
    }

    struct ScriptedProvider {
        replies: HashMap<(Period, Interval), Reply>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<((Period, Interval), Reply)>) -> Self {
            Self {
                replies: replies.into_iter().collect(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::Relaxed)
        }
    }

    fn bars(n: usize) -> Vec<Kline> {
        (0..n)
            .map(|i| {
                let price = dec!(100) + Decimal::from(i as i64);
                Kline {
                    open_time: i as i64 * 60_000,
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume: dec!(1),
                    close_time: i as i64 * 60_000 + 59_999,
                }
            })
            .collect()
    }

    #[async_trait]
    impl MarketDataProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch_bars(
            &self,
            _symbol: &str,
            period: Period,
            interval: Interval,
        ) -> anyhow::Result<Vec<Kline>> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            match self.replies.get(&(period, interval)) {
                Some(Reply::Bars(n)) => Ok(bars(*n)),
                Some(Reply::Fail) => anyhow::bail!("invalid combination"),
                Some(Reply::Empty) | None => Ok(Vec::new()),
            }
        }
    }

    #[tokio::test]
    async fn test_primary_combo_used_when_it_has_data() {
        let provider = ScriptedProvider::new(vec![((Period::Month1, Interval::Min5), Reply::Bars(30))]);
        let loaded = BarLoader::new(&provider)
            .load("AAPL", Period::Month1, Interval::Min5, true)
            .await
            .unwrap();
        assert_eq!(loaded.klines.len(), 30);
        assert_eq!(loaded.period, Period::Month1);
        assert_eq!(loaded.attempts.len(), 1);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_falls_back_in_order() {
        let provider = ScriptedProvider::new(vec![
            ((Period::Max, Interval::Min1), Reply::Fail),
            ((Period::Year1, Interval::Day1), Reply::Empty),
            ((Period::Month6, Interval::Day1), Reply::Bars(120)),
        ]);
        let loaded = BarLoader::new(&provider)
            .load("TSLA", Period::Max, Interval::Min1, true)
            .await
            .unwrap();
        assert_eq!(loaded.period, Period::Month6);
        assert_eq!(loaded.interval, Interval::Day1);
        assert_eq!(loaded.attempts.len(), 3);
        assert!(loaded.attempts[0].error.is_some());
        assert_eq!(loaded.attempts[1].rows, 0);
        assert!(loaded.attempts[1].error.is_none());
        assert_eq!(loaded.attempts[2].rows, 120);
    }

    #[tokio::test]
    async fn test_no_autofix_tries_once() {
        let provider = ScriptedProvider::new(vec![((Period::Year1, Interval::Day1), Reply::Bars(10))]);
        let err = BarLoader::new(&provider)
            .load("MSFT", Period::Max, Interval::Min1, false)
            .await
            .unwrap_err();
        assert_eq!(err.attempts().len(), 1);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_attempts_exhausted() {
        let provider = ScriptedProvider::new(vec![]);
        let err = BarLoader::new(&provider)
            .load("NOPE", Period::Month1, Interval::Min5, true)
            .await
            .unwrap_err();
        assert_eq!(err.attempts().len(), 6);
        assert!(err.to_string().contains("NOPE"));
    }

    #[tokio::test]
    async fn test_duplicate_fallback_skipped() {
        let provider = ScriptedProvider::new(vec![]);
        let err = BarLoader::new(&provider)
            .load("X", Period::Year1, Interval::Day1, true)
            .await
            .unwrap_err();
        assert_eq!(err.attempts().len(), 5);
    }

    #[tokio::test]
    async fn test_cache_serves_repeat_requests() {
        let db = Database::in_memory().await.unwrap();
        let provider = ScriptedProvider::new(vec![((Period::Month1, Interval::Hour1), Reply::Bars(12))]);

        let loader = BarLoader::new(&provider).with_cache(BarCache::new(db.pool(), 600));
        let first = loader
            .load("eth-usd", Period::Month1, Interval::Hour1, false)
            .await
            .unwrap();
        let second = loader
            .load("eth-usd", Period::Month1, Interval::Hour1, false)
            .await
            .unwrap();

        assert_eq!(provider.calls(), 1);
        assert!(!first.attempts[0].cached);
        assert!(second.attempts[0].cached);
        assert_eq!(first.klines, second.klines);
    }

    #[tokio::test]
    async fn test_expired_cache_refetches() {
        let db = Database::in_memory().await.unwrap();
        let provider = ScriptedProvider::new(vec![((Period::Month1, Interval::Hour1), Reply::Bars(12))]);

        let loader = BarLoader::new(&provider).with_cache(BarCache::new(db.pool(), 0));
        loader.load("GC=F", Period::Month1, Interval::Hour1, false).await.unwrap();
        loader.load("GC=F", Period::Month1, Interval::Hour1, false).await.unwrap();

        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_responses_not_cached() {
        let db = Database::in_memory().await.unwrap();
        let provider = ScriptedProvider::new(vec![]);
        let loader = BarLoader::new(&provider).with_cache(BarCache::new(db.pool(), 600));
        let _ = loader.load("CL=F", Period::Month1, Interval::Hour1, false).await;

        let count = BarCacheRepository::new(db.pool()).count().await.unwrap();
        assert_eq!(count, 0);
    }
}
