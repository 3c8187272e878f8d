//! GridRecord: one row of scan output.

use serde::{Deserialize, Serialize};

use super::Instrument;
use crate::metrics::GridMetrics;

/// Divisor for the turnover display column (one hundred million).
pub const TURNOVER_DISPLAY_UNIT: f64 = 100_000_000.0;

/// Suffix printed after the scaled turnover value.
pub const TURNOVER_DISPLAY_SUFFIX: &str = "亿";

/// Metrics of one instrument that survived every gate.
///
/// Built once by the scanner and never mutated afterwards. Values are kept at
/// full precision; rounding happens only when rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRecord {
    pub code: String,
    pub name: String,
    pub score: f64,
    pub amplitude_pct: f64,
    pub choppiness: f64,
    pub avg_turnover: f64,
    pub ma_cv: f64,
    pub trend_slope_pct: f64,
}

impl GridRecord {
    pub fn new(instrument: &Instrument, metrics: &GridMetrics) -> Self {
        Self {
            code: instrument.code.clone(),
            name: instrument.name.clone(),
            score: metrics.score,
            amplitude_pct: metrics.amplitude_pct,
            choppiness: metrics.choppiness,
            avg_turnover: metrics.avg_turnover,
            ma_cv: metrics.ma_cv,
            trend_slope_pct: metrics.trend_slope_pct,
        }
    }

    /// Turnover rendered as `"<value / 1e8 to 2dp> 亿"`.
    pub fn turnover_display(&self) -> String {
        format_turnover(self.avg_turnover)
    }
}

/// Render a currency amount in hundred-million units.
pub fn format_turnover(value: f64) -> String {
    format!("{:.2} {}", value / TURNOVER_DISPLAY_UNIT, TURNOVER_DISPLAY_SUFFIX)
}
