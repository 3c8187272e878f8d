//! Composite grid score.

use serde::{Deserialize, Serialize};

/// Added to the penalty so a perfectly flat moving average cannot blow up the score.
pub const SCORE_PENALTY_FLOOR: f64 = 0.1;

/// `(amplitude × choppiness) / (penalty + 0.1)` where penalty = CV + slope %.
pub fn composite_score(amplitude_pct: f64, choppiness: f64, penalty: f64) -> f64 {
    amplitude_pct * choppiness / (penalty + SCORE_PENALTY_FLOOR)
}

/// Everything the pipeline computes for an instrument that passed all gates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridMetrics {
    pub score: f64,
    pub amplitude_pct: f64,
    pub choppiness: f64,
    pub avg_turnover: f64,
    pub ma_cv: f64,
    pub trend_slope_pct: f64,
}

impl GridMetrics {
    /// Trend penalty in the score denominator: MA CV plus normalized slope.
    pub fn penalty(&self) -> f64 {
        self.ma_cv + self.trend_slope_pct
    }
}
