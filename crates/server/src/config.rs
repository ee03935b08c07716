//! Runtime configuration for the advisor binary.
//!
//! Read from environment variables (after `.env` is loaded) with defaults.

use anyhow::{Context, Result};
use engine::{ProviderKind, DEFAULT_CACHE_TTL_SECS};

pub const DEFAULT_DB_PATH: &str = "data/advisor-cache.db";

#[derive(Debug, Clone, PartialEq)]
pub struct AdvisorConfig {
    /// SQLite file backing the bar cache.
    pub db_path: String,
    /// Seconds before a cached response is refetched.
    pub cache_ttl_secs: i64,
    /// Market data source.
    pub provider: ProviderKind,
    /// `SR_ADVISOR_CACHE=off` disables the cache entirely.
    pub cache_enabled: bool,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            provider: ProviderKind::default(),
            cache_enabled: true,
        }
    }
}

impl AdvisorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let cache_ttl_secs = match var("SR_ADVISOR_CACHE_TTL_SECS") {
            Some(v) => v
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|ttl| *ttl >= 0)
                .with_context(|| format!("invalid SR_ADVISOR_CACHE_TTL_SECS: {v}"))?,
            None => defaults.cache_ttl_secs,
        };

        let provider = match var("SR_ADVISOR_PROVIDER") {
            Some(v) => v.parse().context("invalid SR_ADVISOR_PROVIDER")?,
            None => defaults.provider,
        };

        let cache_enabled = var("SR_ADVISOR_CACHE")
            .map(|v| !matches!(v.trim().to_lowercase().as_str(), "off" | "false" | "0"))
            .unwrap_or(true);

        Ok(Self {
            db_path: var("SR_ADVISOR_DB_PATH").unwrap_or(defaults.db_path),
            cache_ttl_secs,
            provider,
            cache_enabled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AdvisorConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AdvisorConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(load(&[]).unwrap(), AdvisorConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("SR_ADVISOR_DB_PATH", "/tmp/cache.db"),
            ("SR_ADVISOR_CACHE_TTL_SECS", "60"),
            ("SR_ADVISOR_PROVIDER", "Binance"),
            ("SR_ADVISOR_CACHE", "off"),
        ])
        .unwrap();
        assert_eq!(config.db_path, "/tmp/cache.db");
        assert_eq!(config.cache_ttl_secs, 60);
        assert_eq!(config.provider, ProviderKind::Binance);
        assert!(!config.cache_enabled);
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config = load(&[("SR_ADVISOR_DB_PATH", "  "), ("SR_ADVISOR_CACHE", "")]).unwrap();
        assert_eq!(config.db_path, DEFAULT_DB_PATH);
        assert!(config.cache_enabled);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(load(&[("SR_ADVISOR_CACHE_TTL_SECS", "-5")]).is_err());
        assert!(load(&[("SR_ADVISOR_CACHE_TTL_SECS", "soon")]).is_err());
        assert!(load(&[("SR_ADVISOR_PROVIDER", "kraken")]).is_err());
    }
}
