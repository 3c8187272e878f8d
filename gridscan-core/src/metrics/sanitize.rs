//! Series sanitizer: turns provider rows into a clean, date-ordered series.
//!
//! The coercion helpers are shared with every provider so that "missing" has
//! one meaning regardless of where the data came from.

use chrono::NaiveDate;

use super::MetricsError;
use crate::domain::{Bar, RawBar};

/// Approximate trading days per calendar year on the home market.
pub const TRADING_DAYS_PER_YEAR: usize = 240;

/// Share of the nominal trading days that must actually be present.
pub const HISTORY_TOLERANCE: f64 = 0.9;

/// Minimum bar count for a listing age of `years`.
pub fn min_bars_for_years(years: u32) -> usize {
    ((years as usize * TRADING_DAYS_PER_YEAR) as f64 * HISTORY_TOLERANCE).ceil() as usize
}

/// Parse a price field. Blank, non-numeric, non-finite or non-positive
/// values are missing.
pub fn coerce_price(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

/// Parse a volume field. Providers sometimes report shares as decimals, so the
/// value is parsed as a float and truncated; negative or non-finite is missing.
pub fn coerce_volume(text: &str) -> Option<u64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.trunc() as u64)
}

/// Date-ordered bars with no missing close or volume.
///
/// Dates are strictly increasing and the length is at least the minimum the
/// series was sanitized against.
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedSeries {
    bars: Vec<Bar>,
}

impl SanitizedSeries {
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }
}

/// Sanitize raw provider rows for the inclusive window `[start, end]`.
///
/// Rows are sorted by date, rows without close or volume are dropped, rows
/// outside the window are dropped, and for duplicated dates the first row
/// wins. Fails with `InsufficientHistory` when fewer than `min_bars` remain.
pub fn sanitize(
    raw: impl IntoIterator<Item = RawBar>,
    start: NaiveDate,
    end: NaiveDate,
    min_bars: usize,
) -> Result<SanitizedSeries, MetricsError> {
    let mut rows: Vec<RawBar> = raw
        .into_iter()
        .filter(|r| r.date >= start && r.date <= end)
        .filter(|r| r.close.is_some() && r.volume.is_some())
        .collect();

    // Stable sort keeps provider order among equal dates, so dedup keeps the first.
    rows.sort_by_key(|r| r.date);
    rows.dedup_by_key(|r| r.date);

    let bars: Vec<Bar> = rows
        .into_iter()
        .filter_map(|r| {
            Some(Bar {
                date: r.date,
                open: r.open.unwrap_or(f64::NAN),
                high: r.high.unwrap_or(f64::NAN),
                low: r.low.unwrap_or(f64::NAN),
                close: r.close?,
                volume: r.volume?,
            })
        })
        .collect();

    if bars.len() < min_bars {
        return Err(MetricsError::InsufficientHistory {
            required: min_bars,
            actual: bars.len(),
        });
    }

    Ok(SanitizedSeries { bars })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + chrono::Duration::days(n as i64)
    }

    fn raw(n: u32, close: Option<f64>, volume: Option<u64>) -> RawBar {
        RawBar {
            date: day(n),
            open: Some(10.0),
            high: Some(10.5),
            low: Some(9.5),
            close,
            volume,
        }
    }

    #[test]
    fn min_bars_matches_tolerance() {
        assert_eq!(min_bars_for_years(3), 648);
        assert_eq!(min_bars_for_years(1), 216);
        assert_eq!(min_bars_for_years(0), 0);
    }

    #[test]
    fn coerces_prices() {
        assert_eq!(coerce_price(" 3.512 "), Some(3.512));
        assert_eq!(coerce_price(""), None);
        assert_eq!(coerce_price("-"), None);
        assert_eq!(coerce_price("nan"), None);
        assert_eq!(coerce_price("0"), None);
        assert_eq!(coerce_price("-1.2"), None);
    }

    #[test]
    fn coerces_volumes() {
        assert_eq!(coerce_volume("123456"), Some(123_456));
        assert_eq!(coerce_volume("1200.75"), Some(1200));
        assert_eq!(coerce_volume("0"), Some(0));
        assert_eq!(coerce_volume("-5"), None);
        assert_eq!(coerce_volume("abc"), None);
    }

    #[test]
    fn sorts_and_drops_incomplete_rows() {
        let rows = vec![
            raw(3, Some(11.0), Some(100)),
            raw(1, Some(10.0), Some(100)),
            raw(2, None, Some(100)),
            raw(4, Some(12.0), None),
            raw(0, Some(9.0), Some(100)),
        ];
        let series = sanitize(rows, day(0), day(10), 0).unwrap();
        let dates: Vec<NaiveDate> = series.bars().iter().map(|b| b.date).collect();
        assert_eq!(dates, vec![day(0), day(1), day(3)]);
    }

    #[test]
    fn clips_to_inclusive_window() {
        let rows: Vec<RawBar> = (0..10).map(|i| raw(i, Some(10.0), Some(1))).collect();
        let series = sanitize(rows, day(2), day(5), 0).unwrap();
        assert_eq!(series.len(), 4);
        assert_eq!(series.first_date(), Some(day(2)));
        assert_eq!(series.last_date(), Some(day(5)));
    }

    #[test]
    fn duplicate_dates_keep_first_row() {
        let rows = vec![raw(1, Some(10.0), Some(1)), raw(1, Some(99.0), Some(1))];
        let series = sanitize(rows, day(0), day(5), 0).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.bars()[0].close, 10.0);
    }

    #[test]
    fn missing_open_becomes_nan() {
        let mut row = raw(1, Some(10.0), Some(1));
        row.open = None;
        let series = sanitize(vec![row], day(0), day(5), 0).unwrap();
        assert!(series.bars()[0].open.is_nan());
        assert!(!series.bars()[0].has_full_range());
    }

    #[test]
    fn too_short_is_insufficient_history() {
        let rows: Vec<RawBar> = (0..5).map(|i| raw(i, Some(10.0), Some(1))).collect();
        let err = sanitize(rows, day(0), day(10), 6).unwrap_err();
        assert_eq!(
            err,
            MetricsError::InsufficientHistory {
                required: 6,
                actual: 5
            }
        );
    }
}
