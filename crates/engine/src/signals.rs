//! Crossover detection against the smoothed channel
//!
//! Only positions where the smoothed support, resistance, midline and the
//! oscillator are all defined take part. Comparisons run between consecutive
//! entries of that valid region, so its first entry never carries a signal.

use crate::channel::Channel;
use crate::types::{SignalDirection, SignalEvent, SignalFlags};

/// Flags for every position of the valid region
#[derive(Debug, Clone, PartialEq)]
pub struct SignalScan {
    /// Bar positions, ascending
    pub positions: Vec<usize>,
    /// Aligned with `positions`
    pub flags: Vec<SignalFlags>,
}

impl SignalScan {
    /// Last position of the valid region and its flags
    pub fn last(&self) -> Option<(usize, SignalFlags)> {
        let pos = *self.positions.last()?;
        let flags = *self.flags.last()?;
        Some((pos, flags))
    }

    /// Flatten the flags into an event list. Buy precedes sell on the same bar.
    pub fn events(&self, open_time: &[i64], closes: &[f64]) -> Vec<SignalEvent> {
        let mut events = Vec::new();
        for (&position, flags) in self.positions.iter().zip(&self.flags) {
            let mut push = |direction| {
                events.push(SignalEvent {
                    position,
                    open_time: open_time.get(position).copied().unwrap_or_default(),
                    direction,
                    close: closes[position],
                })
            };
            if flags.buy {
                push(SignalDirection::Buy);
            }
            if flags.sell {
                push(SignalDirection::Sell);
            }
        }
        events
    }
}

/// Positions where every input of the detector is defined
pub fn valid_positions(oscillator: &[f64], smoothed: &Channel) -> Vec<usize> {
    (0..smoothed.len())
        .filter(|&i| smoothed.is_defined(i) && !oscillator[i].is_nan())
        .collect()
}

/// Scan the valid region for crossovers.
///
/// Returns `None` when the valid region is empty.
pub fn detect_signals(closes: &[f64], oscillator: &[f64], smoothed: &Channel) -> Option<SignalScan> {
    let positions = valid_positions(oscillator, smoothed);
    if positions.is_empty() {
        return None;
    }

    let mut flags = Vec::with_capacity(positions.len());
    flags.push(SignalFlags::default());

    for pair in positions.windows(2) {
        let (prev, cur) = (pair[0], pair[1]);

        let buy = closes[cur] > smoothed.support[cur]
            && closes[prev] <= smoothed.support[prev]
            && oscillator[cur] > oscillator[prev];

        let sell = closes[cur] < smoothed.resistance[cur]
            && closes[prev] >= smoothed.resistance[prev]
            && oscillator[cur] < oscillator[prev];

        flags.push(SignalFlags { buy, sell });
    }

    Some(SignalScan { positions, flags })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_channel(n: usize, support: f64, resistance: f64) -> Channel {
        Channel {
            support: vec![support; n],
            resistance: vec![resistance; n],
            midline: vec![(support + resistance) / 2.0; n],
        }
    }

    #[test]
    fn test_empty_valid_region_reports_none() {
        let channel = Channel {
            support: vec![f64::NAN; 3],
            resistance: vec![f64::NAN; 3],
            midline: vec![f64::NAN; 3],
        };
        assert!(detect_signals(&[1.0, 2.0, 3.0], &[50.0; 3], &channel).is_none());
    }

    #[test]
    fn test_undefined_oscillator_excludes_position() {
        let channel = flat_channel(3, 1.0, 5.0);
        let positions = valid_positions(&[f64::NAN, 40.0, 45.0], &channel);
        assert_eq!(positions, vec![1, 2]);
    }

    #[test]
    fn test_buy_requires_cross_and_rising_oscillator() {
        let channel = flat_channel(3, 10.0, 20.0);
        let closes = [10.0, 11.0, 12.0];

        let scan = detect_signals(&closes, &[30.0, 35.0, 40.0], &channel).unwrap();
        assert!(scan.flags[1].buy);
        assert!(!scan.flags[2].buy, "no cross: previous close above support");

        let flat_momentum = detect_signals(&closes, &[30.0, 30.0, 30.0], &channel).unwrap();
        assert!(!flat_momentum.flags[1].buy);
    }

    #[test]
    fn test_sell_requires_cross_and_falling_oscillator() {
        let channel = flat_channel(3, 10.0, 20.0);
        let closes = [20.0, 19.0, 18.0];

        let scan = detect_signals(&closes, &[70.0, 60.0, 50.0], &channel).unwrap();
        assert!(scan.flags[1].sell);
        assert!(!scan.flags[1].buy);
        assert!(!scan.flags[2].sell);

        let rising = detect_signals(&closes, &[70.0, 75.0, 80.0], &channel).unwrap();
        assert!(!rising.flags[1].sell);
    }

    #[test]
    fn test_first_valid_position_never_signals() {
        // Bar 0 would form a crossover with bar 1, but support is undefined there
        let channel = Channel {
            support: vec![f64::NAN, 10.0, 10.0],
            resistance: vec![f64::NAN, 20.0, 20.0],
            midline: vec![f64::NAN, 15.0, 15.0],
        };
        let scan = detect_signals(&[5.0, 12.0, 13.0], &[20.0, 40.0, 45.0], &channel).unwrap();
        assert_eq!(scan.positions, vec![1, 2]);
        assert_eq!(scan.flags[0], SignalFlags::default());
        assert!(!scan.flags[1].buy);
    }

    #[test]
    fn test_events_keyed_by_bar_position() {
        let channel = Channel {
            support: vec![f64::NAN, 10.0, 10.0, 10.0],
            resistance: vec![f64::NAN, 20.0, 20.0, 20.0],
            midline: vec![f64::NAN, 15.0, 15.0, 15.0],
        };
        let closes = [9.0, 9.0, 11.0, 12.0];
        let scan = detect_signals(&closes, &[f64::NAN, 30.0, 40.0, 50.0], &channel).unwrap();
        let events = scan.events(&[100, 200, 300, 400], &closes);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].position, 2);
        assert_eq!(events[0].open_time, 300);
        assert_eq!(events[0].direction, SignalDirection::Buy);
        assert_eq!(events[0].close, 11.0);
        assert_eq!(scan.last(), Some((3, SignalFlags::default())));
    }
}
