//! Per-instrument grid metrics.
//!
//! The pipeline runs strictly in this order and short-circuits on the first
//! failed gate:
//!
//! 1. [`sanitize`]: sort, coerce, drop incomplete rows, clip to the window
//! 2. [`liquidity`]: trailing average turnover against a floor
//! 3. [`trend`]: SMA trim, coefficient of variation, normalized slope, amplitude
//! 4. [`choppiness`]: path length versus net displacement
//! 5. [`score`]: composite ranking score
//!
//! Errors (`MetricsError`) mean the series cannot be evaluated at all; gate
//! failures are ordinary values (`Verdict::Rejected`).

pub mod choppiness;
pub mod error;
pub mod liquidity;
pub mod pipeline;
pub mod sanitize;
pub mod score;
pub mod trend;

pub use choppiness::{choppiness, Choppiness, CHOPPINESS_EPSILON};
pub use error::MetricsError;
pub use liquidity::{LiquidityCheck, LiquidityGate};
pub use pipeline::{evaluate, GateConfig, Rejection, Verdict};
pub use sanitize::{coerce_price, coerce_volume, min_bars_for_years, sanitize, SanitizedSeries};
pub use score::{composite_score, GridMetrics, SCORE_PENALTY_FLOOR};
pub use trend::{average_daily_amplitude, trend_stats, trim_to_moving_average, TrendStats, TrimmedSeries};

use crate::domain::Bar;

/// Previous close for every bar. The first bar has no predecessor in the
/// window, so its own open stands in.
pub fn previous_closes(bars: &[Bar]) -> Vec<f64> {
    let mut prev = Vec::with_capacity(bars.len());
    if let Some(first) = bars.first() {
        prev.push(first.open);
    }
    prev.extend(bars.windows(2).map(|w| w[0].close));
    prev
}
