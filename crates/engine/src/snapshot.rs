//! Latest-bar recommendation

use crate::signals::SignalScan;
use crate::types::{Action, IndicatorTable, Snapshot};

/// Materialise the last position of the valid region.
///
/// Returns `None` if the scan has no positions.
pub fn build_snapshot(table: &IndicatorTable, scan: &SignalScan) -> Option<Snapshot> {
    let (i, flags) = scan.last()?;

    Some(Snapshot {
        position: i,
        open_time: table.open_time[i],
        close: table.close[i],
        oscillator: table.oscillator[i],
        smooth_support: table.smooth_support[i],
        smooth_resistance: table.smooth_resistance[i],
        smooth_midline: table.smooth_midline[i],
        base_support: table.base_support[i],
        base_resistance: table.base_resistance[i],
        adjusted_support: table.adjusted_support[i],
        adjusted_resistance: table.adjusted_resistance[i],
        range: table.range[i],
        buy_signal: flags.buy,
        sell_signal: flags.sell,
        action: Action::classify(flags),
    })
}
