//! S/R Advisor Engine: oscillator-adjusted support/resistance signals
//!
//! Turns a chronologically ordered close series into:
//! - An RSI-style momentum oscillator
//! - A rolling support/resistance channel widened by oscillator extremity
//! - A smoothed channel with buy/sell crossing signals
//! - A snapshot of the latest fully-defined bar
//!
//! Market data providers (Yahoo, Binance) and the cached bar loader live
//! alongside the pipeline but never feed back into it.

pub mod api;
pub mod assets;
pub mod channel;
pub mod error;
pub mod loader;
pub mod oscillator;
pub mod pipeline;
pub mod signals;
pub mod smoothing;
pub mod snapshot;
pub mod types;

// Re-exports for convenience
pub use api::{BinanceClient, Interval, MarketDataProvider, Period, ProviderKind, YahooClient};
pub use assets::{resolve_ticker, Asset, ASSET_DIRECTORY, DEFAULT_TICKER};
pub use error::{AdvisorError, DegenerateInput};
pub use loader::{BarCache, BarLoader, FetchAttempt, LoadError, LoadedBars, DEFAULT_CACHE_TTL_SECS};
pub use pipeline::run_pipeline;
pub use types::*;
