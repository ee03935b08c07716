//! Market data providers
//!
//! Providers turn (symbol, period, interval) into an ordered bar sequence.
//! They sit outside the indicator pipeline and may fail or return nothing.

pub mod binance;
pub mod yahoo;

pub use binance::BinanceClient;
pub use yahoo::YahooClient;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::types::Kline;

/// Source of historical bars
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_bars(&self, symbol: &str, period: Period, interval: Interval)
        -> Result<Vec<Kline>>;
}

/// How far back to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "7d")]
    Days7,
    #[serde(rename = "60d")]
    Days60,
    #[serde(rename = "1mo")]
    Month1,
    #[serde(rename = "3mo")]
    Month3,
    #[serde(rename = "6mo")]
    Month6,
    #[serde(rename = "1y")]
    Year1,
    #[serde(rename = "2y")]
    Year2,
    #[serde(rename = "5y")]
    Year5,
    #[serde(rename = "max")]
    Max,
}

impl Period {
    pub const ALL: [Period; 9] = [
        Period::Days7,
        Period::Days60,
        Period::Month1,
        Period::Month3,
        Period::Month6,
        Period::Year1,
        Period::Year2,
        Period::Year5,
        Period::Max,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Days7 => "7d",
            Period::Days60 => "60d",
            Period::Month1 => "1mo",
            Period::Month3 => "3mo",
            Period::Month6 => "6mo",
            Period::Year1 => "1y",
            Period::Year2 => "2y",
            Period::Year5 => "5y",
            Period::Max => "max",
        }
    }

    /// Span covered by the period; `None` for all available history
    pub fn duration(&self) -> Option<Duration> {
        let days = match self {
            Period::Days7 => 7,
            Period::Days60 => 60,
            Period::Month1 => 30,
            Period::Month3 => 91,
            Period::Month6 => 182,
            Period::Year1 => 365,
            Period::Year2 => 730,
            Period::Year5 => 1826,
            Period::Max => return None,
        };
        Some(Duration::days(days))
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Period::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("unknown period '{}'", s))
    }
}

/// Bar size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    Min1,
    #[serde(rename = "5m")]
    Min5,
    #[serde(rename = "15m")]
    Min15,
    #[serde(rename = "30m")]
    Min30,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "1wk")]
    Week1,
}

impl Interval {
    pub const ALL: [Interval; 7] = [
        Interval::Min1,
        Interval::Min5,
        Interval::Min15,
        Interval::Min30,
        Interval::Hour1,
        Interval::Day1,
        Interval::Week1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Min1 => "1m",
            Interval::Min5 => "5m",
            Interval::Min15 => "15m",
            Interval::Min30 => "30m",
            Interval::Hour1 => "1h",
            Interval::Day1 => "1d",
            Interval::Week1 => "1wk",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Interval::Min1 => Duration::minutes(1),
            Interval::Min5 => Duration::minutes(5),
            Interval::Min15 => Duration::minutes(15),
            Interval::Min30 => Duration::minutes(30),
            Interval::Hour1 => Duration::hours(1),
            Interval::Day1 => Duration::days(1),
            Interval::Week1 => Duration::weeks(1),
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        // "1w" is what Binance calls a weekly bar
        if s.eq_ignore_ascii_case("1w") {
            return Ok(Interval::Week1);
        }
        Interval::ALL
            .into_iter()
            .find(|i| i.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow::anyhow!("unknown interval '{}'", s))
    }
}

/// Selectable provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Yahoo,
    Binance,
}

impl ProviderKind {
    pub fn build(self) -> Box<dyn MarketDataProvider> {
        match self {
            ProviderKind::Yahoo => Box::new(YahooClient::new()),
            ProviderKind::Binance => Box::new(BinanceClient::new()),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "yahoo" => Ok(ProviderKind::Yahoo),
            "binance" => Ok(ProviderKind::Binance),
            other => anyhow::bail!("unknown provider '{}'", other),
        }
    }
}

/// Sort by open time and drop duplicate timestamps (first occurrence wins)
pub(crate) fn normalize(mut klines: Vec<Kline>) -> Vec<Kline> {
    klines.sort_by_key(|k| k.open_time);
    klines.dedup_by_key(|k| k.open_time);
    klines
}
