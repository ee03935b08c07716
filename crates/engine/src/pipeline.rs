//! Indicator pipeline: bars → oscillator → channel → smoothing → signals → snapshot
//!
//! Each run is a pure function of the bars and parameters. Nothing is cached
//! or carried between calls.

use tracing::{debug, warn};

use crate::channel::{adapt_channel, base_channel};
use crate::error::{AdvisorError, DegenerateInput};
use crate::oscillator::compute_oscillator;
use crate::signals::detect_signals;
use crate::smoothing::smooth_channel;
use crate::snapshot::build_snapshot;
use crate::types::{closes, AdvisorParams, AdvisorReport, IndicatorTable, Kline};

/// Run the full pipeline over an ordered bar sequence.
pub fn run_pipeline(klines: &[Kline], params: &AdvisorParams) -> Result<AdvisorReport, AdvisorError> {
    params.validate()?;

    let close = closes(klines);
    let open_time: Vec<i64> = klines.iter().map(|k| k.open_time).collect();

    let oscillator = compute_oscillator(&close, params.rsi_period)?;
    let base = base_channel(&close, params.lookback)?;
    let adjusted = adapt_channel(&base, &oscillator.deviation);
    let smoothed = smooth_channel(&adjusted, params.smooth_length)?;

    let insufficient = || AdvisorError::InsufficientData {
        supplied: klines.len(),
        required: params.required_bars(),
    };
    let scan = detect_signals(&close, &oscillator.values, &smoothed).ok_or_else(insufficient)?;

    let diagnostics = diagnose(&base.range, &oscillator.values);
    for diag in &diagnostics {
        warn!(%diag, "Degenerate input");
    }

    let table = IndicatorTable {
        open_time,
        close,
        oscillator: oscillator.values,
        oscillator_deviation: oscillator.deviation,
        base_support: base.support,
        base_resistance: base.resistance,
        range: base.range,
        adjusted_support: adjusted.support,
        adjusted_resistance: adjusted.resistance,
        midline: adjusted.midline,
        smooth_support: smoothed.support,
        smooth_resistance: smoothed.resistance,
        smooth_midline: smoothed.midline,
    };

    let snapshot = build_snapshot(&table, &scan).ok_or_else(insufficient)?;
    let events = scan.events(&table.open_time, &table.close);

    debug!(
        bars = klines.len(),
        valid = scan.positions.len(),
        events = events.len(),
        action = %snapshot.action,
        "Pipeline complete"
    );

    Ok(AdvisorReport {
        params: *params,
        table,
        valid_positions: scan.positions,
        flags: scan.flags,
        events,
        snapshot,
        diagnostics,
    })
}

fn diagnose(range: &[f64], oscillator: &[f64]) -> Vec<DegenerateInput> {
    let mut out = Vec::new();

    let flat = range.iter().filter(|r| **r == 0.0).count();
    if flat > 0 {
        out.push(DegenerateInput::FlatWindow { positions: flat });
    }

    let saturated = oscillator
        .iter()
        .filter(|v| **v == 0.0 || **v == 100.0)
        .count();
    if saturated > 0 {
        out.push(DegenerateInput::OscillatorSaturated {
            positions: saturated,
        });
    }

    out
}
