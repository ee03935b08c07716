//! Trailing simple average with a strict window
//!
//! Unlike the oscillator averages, nothing is emitted until `length`
//! consecutive defined inputs exist. Each output is summed afresh from its
//! own window so that element-wise ordering between inputs carries over to
//! the outputs exactly.

use crate::channel::Channel;
use crate::error::AdvisorError;
use crate::types::Series;

/// Trailing mean of exactly `length` bars.
pub fn smooth(series: &[f64], length: usize) -> Result<Series, AdvisorError> {
    if length == 0 {
        return Err(AdvisorError::InvalidParameter {
            name: "smooth_length",
            value: length,
            min: 1,
            max: usize::MAX,
        });
    }

    let divisor = length as f64;
    let mut out = Vec::with_capacity(series.len());
    // consecutive defined values ending at the current position
    let mut run = 0usize;

    for (i, &value) in series.iter().enumerate() {
        run = if value.is_nan() { 0 } else { run + 1 };
        if run < length {
            out.push(f64::NAN);
            continue;
        }
        let sum: f64 = series[i + 1 - length..=i].iter().sum();
        out.push(sum / divisor);
    }

    Ok(out)
}

/// Smooth each side of the channel and its midline independently.
pub fn smooth_channel(channel: &Channel, length: usize) -> Result<Channel, AdvisorError> {
    Ok(Channel {
        support: smooth(&channel.support, length)?,
        resistance: smooth(&channel.resistance, length)?,
        midline: smooth(&channel.midline, length)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_one_is_identity() {
        let input = vec![f64::NAN, 1.5, 2.5, -3.0];
        let out = smooth(&input, 1).unwrap();
        assert!(out[0].is_nan());
        assert_eq!(&out[1..], &input[1..]);
    }

    #[test]
    fn test_strict_window() {
        let out = smooth(&[2.0, 4.0, 6.0, 8.0], 3).unwrap();
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_eq!(out[2], 4.0);
        assert_eq!(out[3], 6.0);
    }

    #[test]
    fn test_waits_for_consecutive_defined_inputs() {
        let input = [f64::NAN, f64::NAN, 1.0, 2.0, 3.0, 4.0];
        let out = smooth(&input, 2).unwrap();
        assert!(out[2].is_nan());
        assert_eq!(out[3], 1.5);
        assert_eq!(out[5], 3.5);
    }

    #[test]
    fn test_gap_restarts_warmup() {
        let input = [1.0, 1.0, f64::NAN, 3.0, 3.0];
        let out = smooth(&input, 2).unwrap();
        assert_eq!(out[1], 1.0);
        assert!(out[2].is_nan());
        assert!(out[3].is_nan());
        assert_eq!(out[4], 3.0);
    }

    #[test]
    fn test_zero_length_rejected() {
        let err = smooth(&[1.0], 0).unwrap_err();
        assert!(matches!(
            err,
            AdvisorError::InvalidParameter {
                name: "smooth_length",
                ..
            }
        ));
    }

    #[test]
    fn test_smooth_channel_applies_to_all_three() {
        let channel = Channel {
            support: vec![1.0, 3.0],
            resistance: vec![5.0, 7.0],
            midline: vec![3.0, 5.0],
        };
        let smoothed = smooth_channel(&channel, 2).unwrap();
        assert_eq!(smoothed.support[1], 2.0);
        assert_eq!(smoothed.resistance[1], 6.0);
        assert_eq!(smoothed.midline[1], 4.0);
        assert!(!smoothed.is_defined(0));
    }
}
