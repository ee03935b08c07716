//! Yahoo Finance chart client (stocks, FX, futures, indices and crypto pairs)

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use super::{normalize, Interval, MarketDataProvider, Period};
use crate::types::Kline;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) sr-advisor";

/// Yahoo Finance chart API client
#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    base_url: String,
}

// ---------------------------------------------------------------------------
// Deserialization structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

impl Default for YahooClient {
    fn default() -> Self {
        Self::new()
    }
}

impl YahooClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Chart endpoint for `symbol`, percent-encoded as a single path segment
    fn chart_url(&self, symbol: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid Yahoo base URL {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Yahoo base URL cannot carry a path: {}", self.base_url))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        Ok(url)
    }

    /// Fetch adjusted bars for `symbol` over `period` at `interval`
    pub async fn get_chart(&self, symbol: &str, period: Period, interval: Interval) -> Result<Vec<Kline>> {
        let url = self.chart_url(symbol)?;

        debug!(symbol, period = %period, interval = %interval, "Fetching chart from Yahoo");

        let response = self
            .client
            .get(url)
            .query(&[
                ("range", period.as_str()),
                ("interval", interval.as_str()),
                ("includeAdjustedClose", "true"),
            ])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        // Yahoo reports unknown symbols and bad ranges in the body, often with a 4xx
        let parsed: ChartResponse = serde_json::from_str(&body)
            .with_context(|| format!("Yahoo API error {}: {}", status, truncate(&body, 200)))?;

        let klines = parse_chart(parsed, interval)?;
        debug!(count = klines.len(), "Fetched chart bars");
        Ok(klines)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}

fn parse_chart(response: ChartResponse, interval: Interval) -> Result<Vec<Kline>> {
    if let Some(err) = response.chart.error {
        anyhow::bail!(
            "Yahoo chart error {}: {}",
            err.code.unwrap_or_default(),
            err.description.unwrap_or_default()
        );
    }

    let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|a| a.adjclose)
        .unwrap_or_default();
    let bar_ms = interval.duration().num_milliseconds();

    let mut klines = Vec::with_capacity(result.timestamp.len());
    for (i, &ts) in result.timestamp.iter().enumerate() {
        // Rows without a close are gaps in the feed
        let Some(close) = at(&quote.close, i) else {
            continue;
        };
        if !close.is_finite() || close <= 0.0 {
            continue;
        }

        // Auto-adjust for splits and dividends
        let factor = at(&adjclose, i)
            .filter(|a| a.is_finite() && *a > 0.0)
            .map(|a| a / close)
            .unwrap_or(1.0);

        let price = |v: Option<f64>| Decimal::from_f64(v.unwrap_or(close) * factor);
        let (Some(open), Some(high), Some(low), Some(close)) = (
            price(at(&quote.open, i)),
            price(at(&quote.high, i)),
            price(at(&quote.low, i)),
            price(Some(close)),
        ) else {
            continue;
        };

        let open_time = ts * 1000;
        klines.push(Kline {
            open_time,
            open,
            high,
            low,
            close,
            volume: at(&quote.volume, i)
                .and_then(Decimal::from_f64)
                .unwrap_or(Decimal::ZERO),
            close_time: open_time + bar_ms - 1,
        });
    }

    Ok(klines)
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> Result<Vec<Kline>> {
        let klines = self.get_chart(symbol, period, interval).await?;
        Ok(normalize(klines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn parse(json: &str, interval: Interval) -> Result<Vec<Kline>> {
        parse_chart(serde_json::from_str(json).unwrap(), interval)
    }

    #[test]
    fn test_parses_quotes_and_skips_null_close() {
        let json = r#"{"chart":{"result":[{"timestamp":[1700000000,1700000300,1700000600],
            "indicators":{"quote":[{"open":[10.0,11.0,12.0],"high":[10.5,11.5,12.5],
            "low":[9.5,10.5,11.5],"close":[10.25,null,12.25],"volume":[100,200,null]}]}}],
            "error":null}}"#;
        let klines = parse(json, Interval::Min5).unwrap();
        assert_eq!(klines.len(), 2);
        assert_eq!(klines[0].open_time, 1_700_000_000_000);
        assert_eq!(klines[0].close_time, 1_700_000_000_000 + 300_000 - 1);
        assert_eq!(klines[0].close, dec!(10.25));
        assert_eq!(klines[0].volume, dec!(100));
        assert_eq!(klines[1].close, dec!(12.25));
        assert_eq!(klines[1].volume, Decimal::ZERO);
    }

    #[test]
    fn test_adjusted_close_scales_ohlc() {
        let json = r#"{"chart":{"result":[{"timestamp":[1700000000],
            "indicators":{"quote":[{"open":[20.0],"high":[22.0],"low":[18.0],"close":[20.0],"volume":[5]}],
            "adjclose":[{"adjclose":[10.0]}]}}],"error":null}}"#;
        let klines = parse(json, Interval::Day1).unwrap();
        assert_eq!(klines[0].close, dec!(10));
        assert_eq!(klines[0].open, dec!(10));
        assert_eq!(klines[0].high, dec!(11));
        assert_eq!(klines[0].low, dec!(9));
    }

    #[test]
    fn test_chart_error_is_reported() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse(json, Interval::Day1).unwrap_err();
        assert!(err.to_string().contains("Not Found"));
    }

    #[test]
    fn test_empty_result_is_empty_not_error() {
        let json = r#"{"chart":{"result":[],"error":null}}"#;
        assert!(parse(json, Interval::Day1).unwrap().is_empty());
    }

    #[test]
    fn test_chart_url_encodes_symbol_as_one_segment() {
        let client = YahooClient::with_base_url("https://example.test/");
        let url = client.chart_url("^GSPC").unwrap();
        let segments: Vec<&str> = url.path_segments().unwrap().collect();
        assert_eq!(segments, vec!["v8", "finance", "chart", "^GSPC"]);

        let url = client.chart_url("BRK/B ?x#y").unwrap();
        assert_eq!(url.path(), "/v8/finance/chart/BRK%2FB%20%3Fx%23y");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_chart_url_keeps_base_path() {
        let client = YahooClient::with_base_url("http://127.0.0.1:9000/proxy");
        let url = client.chart_url("EURUSD=X").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/proxy/v8/finance/chart/EURUSD=X");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
