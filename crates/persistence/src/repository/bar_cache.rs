//! Bar cache repository: read-through cache of provider responses

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// Cache key: one entry per (symbol, period, interval)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub symbol: String,
    pub period: String,
    pub interval: String,
}

impl CacheKey {
    pub fn new(symbol: &str, period: &str, interval: &str) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            period: period.to_string(),
            interval: interval.to_string(),
        }
    }
}

/// A cached provider response
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CachedBars {
    pub symbol: String,
    pub period: String,
    pub interval: String,
    pub provider: String,
    /// Unix seconds
    pub fetched_at: i64,
    pub row_count: i64,
    /// JSON array of bars, opaque to this crate
    pub bars_json: String,
}

/// Repository for cached bars
pub struct BarCacheRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> BarCacheRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Entry for `key` from `provider` fetched within the last `ttl_secs`
    pub async fn get_fresh(
        &self,
        key: &CacheKey,
        provider: &str,
        ttl_secs: i64,
        now: i64,
    ) -> DbResult<Option<CachedBars>> {
        let record = sqlx::query_as::<_, CachedBars>(
            r#"
            SELECT symbol, period, interval, provider, fetched_at, row_count, bars_json
            FROM bar_cache
            WHERE symbol = ? AND period = ? AND interval = ? AND provider = ?
              AND fetched_at > ?
            "#,
        )
        .bind(&key.symbol)
        .bind(&key.period)
        .bind(&key.interval)
        .bind(provider)
        .bind(now - ttl_secs)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }

    /// Insert or replace the entry for its key
    pub async fn put(&self, entry: &CachedBars) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO bar_cache (
                symbol, period, interval, provider, fetched_at, row_count, bars_json
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.symbol)
        .bind(&entry.period)
        .bind(&entry.interval)
        .bind(&entry.provider)
        .bind(entry.fetched_at)
        .bind(entry.row_count)
        .bind(&entry.bars_json)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete entries older than `ttl_secs`. Returns the number removed.
    pub async fn purge_expired(&self, ttl_secs: i64, now: i64) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM bar_cache WHERE fetched_at <= ?")
            .bind(now - ttl_secs)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Number of cached entries
    pub async fn count(&self) -> DbResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bar_cache")
            .fetch_one(self.pool)
            .await?;

        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn entry(key: &CacheKey, provider: &str, fetched_at: i64) -> CachedBars {
        CachedBars {
            symbol: key.symbol.clone(),
            period: key.period.clone(),
            interval: key.interval.clone(),
            provider: provider.to_string(),
            fetched_at,
            row_count: 2,
            bars_json: "[1,2]".to_string(),
        }
    }

    #[tokio::test]
    async fn test_fresh_entry_returned_within_ttl() {
        let db = Database::in_memory().await.unwrap();
        let repo = BarCacheRepository::new(db.pool());
        let key = CacheKey::new("aapl", "1mo", "5m");
        assert_eq!(key.symbol, "AAPL");

        repo.put(&entry(&key, "yahoo", 1_000)).await.unwrap();

        let hit = repo.get_fresh(&key, "yahoo", 600, 1_500).await.unwrap();
        assert_eq!(hit.map(|c| c.row_count), Some(2));

        let expired = repo.get_fresh(&key, "yahoo", 600, 1_600).await.unwrap();
        assert!(expired.is_none());
    }

    #[tokio::test]
    async fn test_provider_mismatch_is_a_miss() {
        let db = Database::in_memory().await.unwrap();
        let repo = BarCacheRepository::new(db.pool());
        let key = CacheKey::new("BTCUSDT", "7d", "1h");
        repo.put(&entry(&key, "binance", 100)).await.unwrap();

        assert!(repo.get_fresh(&key, "yahoo", 600, 200).await.unwrap().is_none());
        assert!(repo.get_fresh(&key, "binance", 600, 200).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_put_replaces_and_purge_removes_stale() {
        let db = Database::in_memory().await.unwrap();
        let repo = BarCacheRepository::new(db.pool());
        let a = CacheKey::new("MSFT", "1y", "1d");
        let b = CacheKey::new("TSLA", "1y", "1d");

        repo.put(&entry(&a, "yahoo", 100)).await.unwrap();
        repo.put(&entry(&a, "yahoo", 900)).await.unwrap();
        repo.put(&entry(&b, "yahoo", 100)).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 2);

        let removed = repo.purge_expired(600, 1_000).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(repo.count().await.unwrap(), 1);
        assert!(repo.get_fresh(&a, "yahoo", 600, 1_000).await.unwrap().is_some());
    }
}
