//! Trend and amplitude analysis.
//!
//! Works on the series after the moving-average trim: only bars that have a
//! full SMA window behind them (and a complete open/high/low) are kept.

use super::{previous_closes, MetricsError};
use crate::domain::Bar;
use crate::indicators::{Indicator, Sma};

/// Default SMA period, in bars.
pub const DEFAULT_MA_PERIOD: usize = 120;

/// Means with a magnitude below this are treated as degenerate.
const DEGENERATE_MEAN: f64 = 1e-12;

/// Bars that survived the moving-average trim, with the SMA value aligned to each.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimmedSeries {
    pub bars: Vec<Bar>,
    pub ma: Vec<f64>,
}

impl TrimmedSeries {
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// Statistics of the smoothed price path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendStats {
    pub ma_mean: f64,
    /// Population standard deviation of the SMA divided by its mean.
    pub ma_cv: f64,
    /// Raw least-squares slope of the SMA per bar.
    pub slope: f64,
    /// |slope| / mean × 100, i.e. percentage drift per bar.
    pub trend_slope_pct: f64,
}

/// Compute the SMA over the full series and keep only bars with a full window.
///
/// Fails with `InsufficientHistory` when fewer than `min_points` remain.
pub fn trim_to_moving_average(
    bars: &[Bar],
    period: usize,
    min_points: usize,
) -> Result<TrimmedSeries, MetricsError> {
    let sma = Sma::new(period.max(1));
    let values = sma.compute(bars);

    let (kept_bars, ma): (Vec<Bar>, Vec<f64>) = bars
        .iter()
        .zip(values)
        .filter(|(bar, ma)| ma.is_finite() && bar.has_full_range())
        .map(|(bar, ma)| (bar.clone(), ma))
        .unzip();

    if kept_bars.len() < min_points {
        return Err(MetricsError::InsufficientHistory {
            required: min_points,
            actual: kept_bars.len(),
        });
    }

    Ok(TrimmedSeries { bars: kept_bars, ma })
}

/// CV and normalized slope of a moving-average series.
///
/// Returns `None` when the series is empty or its mean is ~0.
pub fn trend_stats(ma: &[f64]) -> Option<TrendStats> {
    if ma.is_empty() {
        return None;
    }
    let ma_mean = mean(ma);
    if !ma_mean.is_finite() || ma_mean.abs() < DEGENERATE_MEAN {
        return None;
    }
    let slope = least_squares_slope(ma);
    Some(TrendStats {
        ma_mean,
        ma_cv: population_std(ma, ma_mean) / ma_mean,
        slope,
        trend_slope_pct: slope.abs() / ma_mean * 100.0,
    })
}

/// Mean of (high − low) / previous close, as a percentage.
pub fn average_daily_amplitude(bars: &[Bar]) -> f64 {
    if bars.is_empty() {
        return 0.0;
    }
    let prev = previous_closes(bars);
    let total: f64 = bars
        .iter()
        .zip(&prev)
        .map(|(bar, prev_close)| (bar.high - bar.low) / prev_close)
        .sum();
    total / bars.len() as f64 * 100.0
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64], mean: f64) -> f64 {
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Ordinary least squares slope of `ys` against 0, 1, 2, ...
fn least_squares_slope(ys: &[f64]) -> f64 {
    let n = ys.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(ys);
    let (num, den) = ys.iter().enumerate().fold((0.0, 0.0), |(num, den), (i, y)| {
        let dx = i as f64 - x_mean;
        (num + dx * (y - y_mean), den + dx * dx)
    });
    num / den
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars};

    #[test]
    fn trim_drops_warmup_bars() {
        let closes: Vec<f64> = (0..10).map(|i| 10.0 + i as f64).collect();
        let trimmed = trim_to_moving_average(&make_bars(&closes), 3, 1).unwrap();
        assert_eq!(trimmed.len(), 8);
        assert_eq!(trimmed.bars[0].close, 12.0);
        assert_approx(trimmed.ma[0], 11.0, 1e-12);
    }

    #[test]
    fn trim_drops_bars_missing_range() {
        let closes: Vec<f64> = (0..10).map(|i| 10.0 + i as f64).collect();
        let mut bars = make_bars(&closes);
        bars[5].high = f64::NAN;
        let trimmed = trim_to_moving_average(&bars, 3, 1).unwrap();
        assert_eq!(trimmed.len(), 7);
        assert!(trimmed.bars.iter().all(|b| b.date != bars[5].date));
    }

    #[test]
    fn trim_reports_insufficient_points() {
        let bars = make_bars(&vec![10.0; 130]);
        let err = trim_to_moving_average(&bars, 120, 120).unwrap_err();
        assert_eq!(
            err,
            MetricsError::InsufficientHistory {
                required: 120,
                actual: 11
            }
        );
    }

    #[test]
    fn flat_ma_has_zero_cv_and_slope() {
        let stats = trend_stats(&[5.0; 50]).unwrap();
        assert_eq!(stats.ma_cv, 0.0);
        assert_eq!(stats.trend_slope_pct, 0.0);
    }

    #[test]
    fn linear_ma_slope_is_normalized() {
        // y = 100 + 2i over 0..=100 → slope 2, mean 200 → 1% per bar.
        let ma: Vec<f64> = (0..=100).map(|i| 100.0 + 2.0 * i as f64).collect();
        let stats = trend_stats(&ma).unwrap();
        assert_approx(stats.slope, 2.0, 1e-9);
        assert_approx(stats.ma_mean, 200.0, 1e-9);
        assert_approx(stats.trend_slope_pct, 1.0, 1e-9);
    }

    #[test]
    fn falling_ma_uses_absolute_slope() {
        let ma: Vec<f64> = (0..=100).map(|i| 300.0 - 2.0 * i as f64).collect();
        let stats = trend_stats(&ma).unwrap();
        assert!(stats.slope < 0.0);
        assert_approx(stats.trend_slope_pct, 1.0, 1e-9);
    }

    #[test]
    fn cv_uses_population_std() {
        // values 1 and 3: mean 2, population std 1.
        let stats = trend_stats(&[1.0, 3.0]).unwrap();
        assert_approx(stats.ma_cv, 0.5, 1e-12);
    }

    #[test]
    fn zero_mean_is_degenerate() {
        assert!(trend_stats(&[0.0, 0.0, 0.0]).is_none());
        assert!(trend_stats(&[]).is_none());
    }

    #[test]
    fn amplitude_uses_previous_close() {
        let mut bars = make_bars(&[10.0, 10.0]);
        bars[0].open = 10.0;
        bars[0].high = 10.5;
        bars[0].low = 9.5;
        bars[1].high = 10.2;
        bars[1].low = 9.8;
        // (1.0 / 10 + 0.4 / 10) / 2 × 100 = 7%
        assert_approx(average_daily_amplitude(&bars), 7.0, 1e-9);
    }

    #[test]
    fn flat_bars_have_zero_amplitude() {
        let mut bars = make_bars(&vec![10.0; 5]);
        for b in &mut bars {
            b.high = b.close;
            b.low = b.close;
        }
        assert_eq!(average_daily_amplitude(&bars), 0.0);
    }
}
