//! Gated evaluation of one sanitized series.
//!
//! One pipeline serves every asset class; the differences between fund and
//! equity screening live entirely in [`GateConfig`].

use serde::{Deserialize, Serialize};
use std::fmt;

use super::liquidity::{LiquidityGate, DEFAULT_TURNOVER_WINDOW};
use super::trend::DEFAULT_MA_PERIOD;
use super::{
    average_daily_amplitude, choppiness, composite_score, trend_stats, trim_to_moving_average,
    GridMetrics, MetricsError, SanitizedSeries,
};

/// Thresholds applied by [`evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Trailing bars averaged by the liquidity gate.
    pub turnover_window: usize,
    /// Minimum trailing average turnover (currency units). Equal passes.
    pub min_avg_turnover: f64,
    /// SMA period for the trend statistics.
    pub ma_period: usize,
    /// Minimum number of bars that must survive the SMA trim.
    pub min_ma_points: usize,
    /// Minimum average daily amplitude, in percent.
    pub min_amplitude_pct: f64,
    /// Maximum normalized trend slope (% per bar). `None` disables the gate.
    pub max_trend_slope_pct: Option<f64>,
    /// Minimum choppiness. `None` disables the gate.
    pub min_choppiness: Option<f64>,
}

impl GateConfig {
    /// Fund defaults: 50M turnover, 1.5% amplitude, no slope or choppiness gate.
    pub fn etf() -> Self {
        Self {
            turnover_window: DEFAULT_TURNOVER_WINDOW,
            min_avg_turnover: 50_000_000.0,
            ma_period: DEFAULT_MA_PERIOD,
            min_ma_points: DEFAULT_MA_PERIOD,
            min_amplitude_pct: 1.5,
            max_trend_slope_pct: None,
            min_choppiness: None,
        }
    }

    /// Equity defaults: 200M turnover, 3% amplitude, slope ≤ 0.05, choppiness ≥ 0.90.
    pub fn equity() -> Self {
        Self {
            min_avg_turnover: 200_000_000.0,
            min_amplitude_pct: 3.0,
            max_trend_slope_pct: Some(0.05),
            min_choppiness: Some(0.90),
            ..Self::etf()
        }
    }

    pub fn liquidity_gate(&self) -> LiquidityGate {
        LiquidityGate {
            window: self.turnover_window,
            min_avg_turnover: self.min_avg_turnover,
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::etf()
    }
}

/// Why an evaluable instrument was disqualified.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    Liquidity { avg_turnover: f64, min: f64 },
    /// Moving-average mean is ~0, so CV and slope are undefined.
    DegenerateTrend,
    TrendSlope { slope_pct: f64, max: f64 },
    Amplitude { amplitude_pct: f64, min: f64 },
    Choppiness { choppiness: f64, min: f64 },
}

impl Rejection {
    /// Stable short label, used for counters and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::Liquidity { .. } => "liquidity",
            Rejection::DegenerateTrend => "degenerate_trend",
            Rejection::TrendSlope { .. } => "trend_slope",
            Rejection::Amplitude { .. } => "amplitude",
            Rejection::Choppiness { .. } => "choppiness",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Liquidity { avg_turnover, min } => {
                write!(f, "average turnover {avg_turnover:.0} below {min:.0}")
            }
            Rejection::DegenerateTrend => write!(f, "moving average mean is zero"),
            Rejection::TrendSlope { slope_pct, max } => {
                write!(f, "trend slope {slope_pct:.4}% above {max:.4}%")
            }
            Rejection::Amplitude { amplitude_pct, min } => {
                write!(f, "average amplitude {amplitude_pct:.2}% below {min:.2}%")
            }
            Rejection::Choppiness { choppiness, min } => {
                write!(f, "choppiness {choppiness:.3} below {min:.3}")
            }
        }
    }
}

/// Result of a completed evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Qualified(GridMetrics),
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_qualified(&self) -> bool {
        matches!(self, Verdict::Qualified(_))
    }

    pub fn metrics(&self) -> Option<&GridMetrics> {
        match self {
            Verdict::Qualified(m) => Some(m),
            Verdict::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Verdict::Qualified(_) => None,
            Verdict::Rejected(r) => Some(r),
        }
    }
}

/// Run every gate on `series` in order, stopping at the first failure.
///
/// Pure: the same series and config always yield bit-identical results.
pub fn evaluate(series: &SanitizedSeries, config: &GateConfig) -> Result<Verdict, MetricsError> {
    let liquidity = config.liquidity_gate().check(series.bars())?;
    if !liquidity.passed {
        return Ok(Verdict::Rejected(Rejection::Liquidity {
            avg_turnover: liquidity.avg_turnover,
            min: config.min_avg_turnover,
        }));
    }

    let trimmed = trim_to_moving_average(series.bars(), config.ma_period, config.min_ma_points)?;

    let Some(trend) = trend_stats(&trimmed.ma) else {
        return Ok(Verdict::Rejected(Rejection::DegenerateTrend));
    };
    if let Some(max) = config.max_trend_slope_pct {
        if trend.trend_slope_pct > max {
            return Ok(Verdict::Rejected(Rejection::TrendSlope {
                slope_pct: trend.trend_slope_pct,
                max,
            }));
        }
    }

    let amplitude_pct = average_daily_amplitude(&trimmed.bars);
    if amplitude_pct < config.min_amplitude_pct {
        return Ok(Verdict::Rejected(Rejection::Amplitude {
            amplitude_pct,
            min: config.min_amplitude_pct,
        }));
    }

    let chop = choppiness(&trimmed.bars);
    if let Some(min) = config.min_choppiness {
        if chop.value < min {
            return Ok(Verdict::Rejected(Rejection::Choppiness {
                choppiness: chop.value,
                min,
            }));
        }
    }

    let mut metrics = GridMetrics {
        score: 0.0,
        amplitude_pct,
        choppiness: chop.value,
        avg_turnover: liquidity.avg_turnover,
        ma_cv: trend.ma_cv,
        trend_slope_pct: trend.trend_slope_pct,
    };
    metrics.score = composite_score(amplitude_pct, chop.value, metrics.penalty());
    Ok(Verdict::Qualified(metrics))
}
