//! Bar: the fundamental market data unit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day as delivered by a history provider, before sanitization.
///
/// Every numeric field is optional: providers coerce whatever text they
/// receive and leave unparseable values as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
}

impl RawBar {
    /// Fully populated raw bar. Mostly used by tests and the synthetic provider.
    pub fn complete(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        Self {
            date,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume: Some(volume),
        }
    }
}

/// Sanitized daily bar: close and volume are always present.
///
/// Open/high/low may still be `NaN` when the provider omitted them; such bars
/// count toward liquidity but are dropped before range statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Traded value for the day (volume × close).
    pub fn turnover(&self) -> f64 {
        self.volume as f64 * self.close
    }

    /// True when open, high and low are all usable numbers.
    pub fn has_full_range(&self) -> bool {
        self.open.is_finite() && self.high.is_finite() && self.low.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> Bar {
        Bar {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            open: 3.50,
            high: 3.60,
            low: 3.45,
            close: 3.55,
            volume: 20_000_000,
        }
    }

    #[test]
    fn turnover_is_volume_times_close() {
        let bar = sample_bar();
        assert!((bar.turnover() - 71_000_000.0).abs() < 1e-6);
    }

    #[test]
    fn missing_low_breaks_range() {
        let mut bar = sample_bar();
        assert!(bar.has_full_range());
        bar.low = f64::NAN;
        assert!(!bar.has_full_range());
    }

    #[test]
    fn raw_bar_complete_fills_every_field() {
        let raw = RawBar::complete(sample_bar().date, 1.0, 2.0, 0.5, 1.5, 10);
        assert_eq!(raw.close, Some(1.5));
        assert_eq!(raw.volume, Some(10));
    }
}
