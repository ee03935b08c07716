//! Base and adaptive support/resistance channels
//!
//! The base channel is the trailing min/max of close over `lookback` bars,
//! undefined until a full window exists. The adaptive channel pushes each side
//! outward by `deviation × range`, so it widens when momentum is extreme and
//! collapses onto the base channel when the oscillator sits at 50.

use ta::indicators::{Maximum, Minimum};
use ta::Next;

use crate::error::AdvisorError;
use crate::types::Series;

/// Rolling min/max of close
#[derive(Debug, Clone, PartialEq)]
pub struct BaseChannel {
    pub support: Series,
    pub resistance: Series,
    /// resistance − support
    pub range: Series,
}

/// Support, resistance and their midpoint
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub support: Series,
    pub resistance: Series,
    pub midline: Series,
}

impl Channel {
    pub fn len(&self) -> usize {
        self.support.len()
    }

    pub fn is_empty(&self) -> bool {
        self.support.is_empty()
    }

    /// True when support, resistance and midline are all defined at `i`
    pub fn is_defined(&self, i: usize) -> bool {
        !self.support[i].is_nan() && !self.resistance[i].is_nan() && !self.midline[i].is_nan()
    }
}

/// Trailing min/max over a strict window of `lookback` bars.
pub fn base_channel(closes: &[f64], lookback: usize) -> Result<BaseChannel, AdvisorError> {
    let invalid = |_| AdvisorError::InvalidParameter {
        name: "lookback",
        value: lookback,
        min: 1,
        max: usize::MAX,
    };
    let mut min = Minimum::new(lookback).map_err(invalid)?;
    let mut max = Maximum::new(lookback).map_err(invalid)?;

    let n = closes.len();
    let mut support = Vec::with_capacity(n);
    let mut resistance = Vec::with_capacity(n);
    let mut range = Vec::with_capacity(n);

    for (i, &close) in closes.iter().enumerate() {
        let lo = min.next(close);
        let hi = max.next(close);
        // ta fills the window from the start; mask until it is full
        if i + 1 < lookback {
            support.push(f64::NAN);
            resistance.push(f64::NAN);
            range.push(f64::NAN);
        } else {
            support.push(lo);
            resistance.push(hi);
            range.push(hi - lo);
        }
    }

    Ok(BaseChannel {
        support,
        resistance,
        range,
    })
}

/// Widen the base channel by the oscillator deviation.
///
/// A zero range leaves the base levels untouched. An undefined deviation or
/// base level yields an undefined adjusted level.
pub fn adapt_channel(base: &BaseChannel, deviation: &[f64]) -> Channel {
    let n = base.support.len();
    let mut support = Vec::with_capacity(n);
    let mut resistance = Vec::with_capacity(n);
    let mut midline = Vec::with_capacity(n);

    for i in 0..n {
        let shift = deviation.get(i).copied().unwrap_or(f64::NAN) * base.range[i];
        let lo = base.support[i] - shift;
        let hi = base.resistance[i] + shift;
        support.push(lo);
        resistance.push(hi);
        midline.push((lo + hi) / 2.0);
    }

    Channel {
        support,
        resistance,
        midline,
    }
}
