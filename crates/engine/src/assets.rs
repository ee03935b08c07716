//! Built-in asset directory (display name → Yahoo ticker)

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Asset {
    pub name: &'static str,
    pub ticker: &'static str,
}

const fn asset(name: &'static str, ticker: &'static str) -> Asset {
    Asset { name, ticker }
}

pub const ASSET_DIRECTORY: [Asset; 10] = [
    asset("Apple (AAPL)", "AAPL"),
    asset("Tesla (TSLA)", "TSLA"),
    asset("Microsoft (MSFT)", "MSFT"),
    asset("Bitcoin (BTC-USD)", "BTC-USD"),
    asset("Ethereum (ETH-USD)", "ETH-USD"),
    asset("XRP (XRP-USD)", "XRP-USD"),
    asset("Euro/USD (EURUSD=X)", "EURUSD=X"),
    asset("Gold (GC=F)", "GC=F"),
    asset("Crude Oil (CL=F)", "CL=F"),
    asset("S&P 500 (^GSPC)", "^GSPC"),
];

/// Default selection
pub const DEFAULT_TICKER: &str = "AAPL";

/// Resolve a display name or ticker from the directory; anything else is
/// treated as a custom ticker.
pub fn resolve_ticker(input: &str) -> String {
    let input = input.trim();
    ASSET_DIRECTORY
        .iter()
        .find(|a| a.name.eq_ignore_ascii_case(input) || a.ticker.eq_ignore_ascii_case(input))
        .map(|a| a.ticker.to_string())
        .unwrap_or_else(|| input.to_uppercase())
}
