//! Momentum oscillator (gain/loss ratio transform, bounded 0–100)
//!
//! Gains and losses are averaged with `ta`'s simple moving average, which
//! grows its window from 1 up to `period` before it starts rolling. The first
//! bar has no delta: it contributes a zero gain and a zero loss to the window
//! and its oscillator value is undefined.

use ta::indicators::SimpleMovingAverage;
use ta::Next;

use crate::error::AdvisorError;
use crate::types::Series;

/// Neutral oscillator level; deviation is measured from here
pub const MIDPOINT: f64 = 50.0;

/// Oscillator values plus the normalised deviation from the midpoint
#[derive(Debug, Clone, PartialEq)]
pub struct Oscillator {
    pub values: Series,
    /// |value − 50| / 50, in [0, 1]
    pub deviation: Series,
}

/// Compute the oscillator over a close series.
pub fn compute_oscillator(closes: &[f64], period: usize) -> Result<Oscillator, AdvisorError> {
    if period < 2 {
        return Err(AdvisorError::InvalidParameter {
            name: "rsi_period",
            value: period,
            min: 2,
            max: usize::MAX,
        });
    }

    let invalid = |_| AdvisorError::InvalidParameter {
        name: "rsi_period",
        value: period,
        min: 2,
        max: usize::MAX,
    };
    let mut avg_gain = SimpleMovingAverage::new(period).map_err(invalid)?;
    let mut avg_loss = SimpleMovingAverage::new(period).map_err(invalid)?;

    let mut values = Vec::with_capacity(closes.len());
    let mut prev: Option<f64> = None;

    for &close in closes {
        let delta = prev.map(|p| close - p);
        let gain = delta.filter(|d| *d > 0.0).unwrap_or(0.0);
        let loss = delta.filter(|d| *d < 0.0).map(|d| -d).unwrap_or(0.0);

        // Running sums can drift a hair below zero once a move leaves the window
        let g = avg_gain.next(gain).max(0.0);
        let l = avg_loss.next(loss).max(0.0);

        values.push(match delta {
            Some(_) => from_averages(g, l),
            None => f64::NAN,
        });
        prev = Some(close);
    }

    let deviation = values.iter().map(|v| deviation(*v)).collect();
    Ok(Oscillator { values, deviation })
}

/// 100 − 100 / (1 + gain/loss). No losses in the window saturates to 100.
fn from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss <= 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
}

/// NaN in, NaN out. `value` is already within [0, 100].
fn deviation(value: f64) -> f64 {
    (value - MIDPOINT).abs() / MIDPOINT
}
