//! Types for the support/resistance advisor

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AdvisorError, DegenerateInput};

/// A single candlestick (OHLCV)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub close_time: i64,
}

impl Kline {
    /// Close price as f64 (the only field the indicator pipeline reads)
    pub fn close_f64(&self) -> f64 {
        self.close.to_f64().unwrap_or(f64::NAN)
    }
}

/// Extract the close column from a bar sequence
pub fn closes(klines: &[Kline]) -> Vec<f64> {
    klines.iter().map(Kline::close_f64).collect()
}

/// Per-bar scalar series aligned 1:1 with the bars. `NaN` marks warm-up.
pub type Series = Vec<f64>;

// ============================================================================
// Parameters
// ============================================================================

pub const DEFAULT_RSI_PERIOD: usize = 14;
pub const DEFAULT_LOOKBACK: usize = 50;
pub const DEFAULT_SMOOTH_LENGTH: usize = 5;

/// Inclusive ranges accepted from the parameter input surface
pub const RSI_PERIOD_RANGE: (usize, usize) = (2, 100);
pub const LOOKBACK_RANGE: (usize, usize) = (5, 1000);
pub const SMOOTH_LENGTH_RANGE: (usize, usize) = (1, 200);

/// Pipeline parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisorParams {
    /// Oscillator period (default: 14)
    pub rsi_period: usize,
    /// Support/resistance lookback window (default: 50)
    pub lookback: usize,
    /// Trailing average length applied to the adaptive channel (default: 5)
    pub smooth_length: usize,
}

impl Default for AdvisorParams {
    fn default() -> Self {
        Self {
            rsi_period: DEFAULT_RSI_PERIOD,
            lookback: DEFAULT_LOOKBACK,
            smooth_length: DEFAULT_SMOOTH_LENGTH,
        }
    }
}

impl AdvisorParams {
    pub fn new(rsi_period: usize, lookback: usize, smooth_length: usize) -> Self {
        Self {
            rsi_period,
            lookback,
            smooth_length,
        }
    }

    /// Reject values the pipeline cannot compute with.
    pub fn validate(&self) -> Result<(), AdvisorError> {
        check_range("rsi_period", self.rsi_period, 2, usize::MAX)?;
        check_range("lookback", self.lookback, 1, usize::MAX)?;
        check_range("smooth_length", self.smooth_length, 1, usize::MAX)?;
        Ok(())
    }

    /// Stricter check applied to user-supplied values (CLI flags, API queries).
    pub fn validate_input_ranges(&self) -> Result<(), AdvisorError> {
        let (lo, hi) = RSI_PERIOD_RANGE;
        check_range("rsi_period", self.rsi_period, lo, hi)?;
        let (lo, hi) = LOOKBACK_RANGE;
        check_range("lookback", self.lookback, lo, hi)?;
        let (lo, hi) = SMOOTH_LENGTH_RANGE;
        check_range("smooth_length", self.smooth_length, lo, hi)?;
        Ok(())
    }

    /// Minimum number of bars that yields a non-empty valid region.
    ///
    /// The oscillator has no value at position 0, so a lookback of 1 still
    /// needs two bars before the adaptive channel is defined.
    pub fn required_bars(&self) -> usize {
        self.lookback.max(2) + self.smooth_length - 1
    }
}

fn check_range(name: &'static str, value: usize, min: usize, max: usize) -> Result<(), AdvisorError> {
    if value < min || value > max {
        return Err(AdvisorError::InvalidParameter {
            name,
            value,
            min,
            max,
        });
    }
    Ok(())
}

// ============================================================================
// Signals
// ============================================================================

/// Direction of a crossover event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalDirection {
    Buy,
    Sell,
}

impl std::fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalDirection::Buy => write!(f, "BUY"),
            SignalDirection::Sell => write!(f, "SELL"),
        }
    }
}

/// A single crossover event keyed by bar position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    /// Index into the input bar sequence
    pub position: usize,
    pub open_time: i64,
    pub direction: SignalDirection,
    pub close: f64,
}

/// Buy/sell flags for one bar. Both are evaluated independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalFlags {
    pub buy: bool,
    pub sell: bool,
}

// ============================================================================
// Snapshot
// ============================================================================

/// Recommendation for the latest bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Wait,
}

impl Action {
    /// Buy wins if both flags are somehow set.
    pub fn classify(flags: SignalFlags) -> Self {
        if flags.buy {
            Action::Buy
        } else if flags.sell {
            Action::Sell
        } else {
            Action::Wait
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Wait => write!(f, "WAIT"),
        }
    }
}

/// Which level the close is leaning toward relative to the smoothed midline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bias {
    TowardSupport,
    TowardResistance,
    AtMidline,
}

/// State of the most recent fully-defined bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub position: usize,
    pub open_time: i64,
    pub close: f64,
    pub oscillator: f64,
    pub smooth_support: f64,
    pub smooth_resistance: f64,
    pub smooth_midline: f64,
    pub base_support: f64,
    pub base_resistance: f64,
    pub adjusted_support: f64,
    pub adjusted_resistance: f64,
    /// Base channel width (resistance − support)
    pub range: f64,
    pub buy_signal: bool,
    pub sell_signal: bool,
    pub action: Action,
}

impl Snapshot {
    /// Suggested buy level (smoothed support)
    pub fn buy_level(&self) -> f64 {
        self.smooth_support
    }

    /// Suggested sell level (smoothed resistance)
    pub fn sell_level(&self) -> f64 {
        self.smooth_resistance
    }

    pub fn bias(&self) -> Bias {
        if self.close < self.smooth_midline {
            Bias::TowardSupport
        } else if self.close > self.smooth_midline {
            Bias::TowardResistance
        } else {
            Bias::AtMidline
        }
    }
}

// ============================================================================
// Annotated table
// ============================================================================

/// Every derived series, aligned to the input bars
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorTable {
    pub open_time: Vec<i64>,
    pub close: Series,
    pub oscillator: Series,
    pub oscillator_deviation: Series,
    pub base_support: Series,
    pub base_resistance: Series,
    pub range: Series,
    pub adjusted_support: Series,
    pub adjusted_resistance: Series,
    pub midline: Series,
    pub smooth_support: Series,
    pub smooth_resistance: Series,
    pub smooth_midline: Series,
}

/// One row of the table for display; `None` marks warm-up entries
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub position: usize,
    pub open_time: i64,
    pub close: f64,
    pub oscillator: Option<f64>,
    pub smooth_support: Option<f64>,
    pub smooth_resistance: Option<f64>,
    pub smooth_midline: Option<f64>,
}

fn defined(value: f64) -> Option<f64> {
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}

impl IndicatorTable {
    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    pub fn row(&self, position: usize) -> Option<IndicatorRow> {
        let close = *self.close.get(position)?;
        Some(IndicatorRow {
            position,
            open_time: self.open_time[position],
            close,
            oscillator: defined(self.oscillator[position]),
            smooth_support: defined(self.smooth_support[position]),
            smooth_resistance: defined(self.smooth_resistance[position]),
            smooth_midline: defined(self.smooth_midline[position]),
        })
    }
}

/// Full output of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorReport {
    pub params: AdvisorParams,
    pub table: IndicatorTable,
    /// Bar positions where every smoothed level and the oscillator are defined
    pub valid_positions: Vec<usize>,
    /// Flags aligned with `valid_positions`
    pub flags: Vec<SignalFlags>,
    pub events: Vec<SignalEvent>,
    pub snapshot: Snapshot,
    pub diagnostics: Vec<DegenerateInput>,
}

impl AdvisorReport {
    /// Signal flags for a bar position, if it lies in the valid region
    pub fn flags_at(&self, position: usize) -> Option<SignalFlags> {
        self.valid_positions
            .binary_search(&position)
            .ok()
            .map(|idx| self.flags[idx])
    }
}
