//! Load bars, run the pipeline and shape the result for display.
//!
//! Shared by the `advise` command and the `/api/advise` handler.

use axum::http::StatusCode;
use engine::{
    run_pipeline, AdvisorError, AdvisorParams, BarCache, BarLoader, Bias, DegenerateInput,
    FetchAttempt, IndicatorRow, Interval, LoadError, MarketDataProvider, Period, SignalEvent,
    Snapshot,
};
use persistence::Database;
use serde::Serialize;

pub const DEFAULT_RECENT_ROWS: usize = 20;

#[derive(Debug, Clone)]
pub struct AdviseRequest {
    pub symbol: String,
    pub period: Period,
    pub interval: Interval,
    pub params: AdvisorParams,
    pub autofix: bool,
    pub recent: usize,
}

/// Why a request produced no advice
#[derive(Debug)]
pub enum AdviseFailure {
    BadInput(String),
    Advisor(AdvisorError),
    Load(LoadError),
}

impl AdviseFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            AdviseFailure::BadInput(_) => "invalid_parameter",
            AdviseFailure::Advisor(e) => e.kind(),
            AdviseFailure::Load(_) => "no_data",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AdviseFailure::BadInput(_) => StatusCode::BAD_REQUEST,
            AdviseFailure::Advisor(AdvisorError::InvalidParameter { .. }) => StatusCode::BAD_REQUEST,
            AdviseFailure::Advisor(AdvisorError::InsufficientData { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AdviseFailure::Load(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn attempts(&self) -> &[FetchAttempt] {
        match self {
            AdviseFailure::Load(e) => e.attempts(),
            _ => &[],
        }
    }
}

impl std::fmt::Display for AdviseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdviseFailure::BadInput(msg) => f.write_str(msg),
            AdviseFailure::Advisor(e @ AdvisorError::InsufficientData { .. }) => write!(
                f,
                "{}; increase the period, reduce lookback/smoothing, or choose a higher timeframe",
                e
            ),
            AdviseFailure::Advisor(e) => write!(f, "{}", e),
            AdviseFailure::Load(e) => write!(
                f,
                "{}; try a different ticker, a shorter interval or a longer period",
                e
            ),
        }
    }
}

impl std::error::Error for AdviseFailure {}

/// Latest-bar state plus the recent valid rows
#[derive(Debug, Clone, Serialize)]
pub struct Advice {
    pub symbol: String,
    pub provider: String,
    pub period: Period,
    pub interval: Interval,
    pub bars: usize,
    pub attempts: Vec<FetchAttempt>,
    pub params: AdvisorParams,
    pub snapshot: Snapshot,
    pub buy_level: f64,
    pub sell_level: f64,
    pub bias: Bias,
    pub events: Vec<SignalEvent>,
    pub diagnostics: Vec<DegenerateInput>,
    pub recent: Vec<RecentRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentRow {
    #[serde(flatten)]
    pub row: IndicatorRow,
    pub buy_signal: bool,
    pub sell_signal: bool,
}

pub async fn advise(
    provider: &dyn MarketDataProvider,
    cache: Option<(&Database, i64)>,
    request: &AdviseRequest,
) -> Result<Advice, AdviseFailure> {
    // Wider bounds than the core accepts are UI limits; enforce them first
    request
        .params
        .validate_input_ranges()
        .map_err(AdviseFailure::Advisor)?;

    let mut loader = BarLoader::new(provider);
    if let Some((db, ttl_secs)) = cache {
        loader = loader.with_cache(BarCache::new(db.pool(), ttl_secs));
    }

    let loaded = loader
        .load(&request.symbol, request.period, request.interval, request.autofix)
        .await
        .map_err(AdviseFailure::Load)?;

    let report = run_pipeline(&loaded.klines, &request.params).map_err(AdviseFailure::Advisor)?;

    let start = report.valid_positions.len().saturating_sub(request.recent);
    let recent = report.valid_positions[start..]
        .iter()
        .zip(&report.flags[start..])
        .filter_map(|(&position, flags)| {
            report.table.row(position).map(|row| RecentRow {
                row,
                buy_signal: flags.buy,
                sell_signal: flags.sell,
            })
        })
        .collect();

    Ok(Advice {
        symbol: loaded.symbol,
        provider: loaded.provider,
        period: loaded.period,
        interval: loaded.interval,
        bars: loaded.klines.len(),
        attempts: loaded.attempts,
        params: report.params,
        buy_level: report.snapshot.buy_level(),
        sell_level: report.snapshot.sell_level(),
        bias: report.snapshot.bias(),
        snapshot: report.snapshot,
        events: report.events,
        diagnostics: report.diagnostics,
        recent,
    })
}
