//! Deterministic synthetic provider for offline runs, demos and tests.
//!
//! Each symbol's series is seeded from a blake3 hash of the symbol, so the
//! same symbol always yields the same bars. The hash also picks the series
//! shape: range-bound, trending, or range-bound but illiquid.

use super::provider::{DataError, DataSource, FetchResult, HistoryProvider, ListingProvider};
use crate::domain::{AssetClass, Instrument, RawBar};
use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Series shape chosen per symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticShape {
    /// Oscillates around a flat level with wide daily ranges.
    RangeBound,
    /// Compounds steadily in one direction.
    Trending,
    /// Range-bound, but with turnover far below any liquidity floor.
    Illiquid,
}

impl SyntheticShape {
    pub fn for_symbol(symbol: &str) -> Self {
        match blake3::hash(symbol.as_bytes()).as_bytes()[0] % 3 {
            0 => SyntheticShape::RangeBound,
            1 => SyntheticShape::Trending,
            _ => SyntheticShape::Illiquid,
        }
    }
}

/// Generates listings of `count` instruments and seeded daily history.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    count: usize,
}

impl SyntheticProvider {
    pub fn new(count: usize) -> Self {
        Self { count }
    }

    fn seeded_rng(symbol: &str) -> StdRng {
        StdRng::from_seed(*blake3::hash(symbol.as_bytes()).as_bytes())
    }

    /// Generate weekday bars for `[start, end]`.
    pub fn generate(symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<RawBar> {
        let shape = SyntheticShape::for_symbol(symbol);
        let mut rng = Self::seeded_rng(symbol);

        let base: f64 = rng.gen_range(1.0..20.0);
        let period: f64 = rng.gen_range(40.0..90.0);
        let swing: f64 = rng.gen_range(0.05..0.12);
        let drift: f64 = if rng.gen_bool(0.5) { 0.002 } else { -0.0015 };
        let target_turnover: f64 = match shape {
            SyntheticShape::Illiquid => rng.gen_range(1.0e5..1.0e6),
            _ => rng.gen_range(3.0e8..2.0e9),
        };

        let mut bars = Vec::new();
        let mut prev_close = base;
        let mut current = start;
        let mut t = 0.0_f64;

        while current <= end {
            let weekday = current.weekday();
            if weekday == chrono::Weekday::Sat || weekday == chrono::Weekday::Sun {
                current += chrono::Duration::days(1);
                continue;
            }

            let level = match shape {
                SyntheticShape::Trending => base * (1.0 + drift).powf(t),
                _ => base * (1.0 + swing * (std::f64::consts::TAU * t / period).sin()),
            };
            let noise: f64 = rng.gen_range(-0.004..0.004);
            let close = (level * (1.0 + noise)).max(0.01);
            let open = prev_close;
            let spread = match shape {
                SyntheticShape::Trending => rng.gen_range(0.002..0.008),
                _ => rng.gen_range(0.015..0.04),
            };
            let high = open.max(close) * (1.0 + spread / 2.0);
            let low = open.min(close) * (1.0 - spread / 2.0);
            let volume = (target_turnover / close * rng.gen_range(0.7..1.3)).max(1.0) as u64;

            bars.push(RawBar::complete(current, open, high, low, close, volume));

            prev_close = close;
            t += 1.0;
            current += chrono::Duration::days(1);
        }

        bars
    }

    fn code_for(class: AssetClass, i: usize) -> String {
        match (class, i % 2) {
            (AssetClass::Etf, 0) => format!("51{:04}", i),
            (AssetClass::Etf, _) => format!("15{:04}", i),
            // Every 25th share lands on the unrouted Beijing board.
            (AssetClass::Equity, _) if i % 25 == 24 => format!("83{:04}", i),
            (AssetClass::Equity, 0) => format!("60{:04}", i),
            (AssetClass::Equity, _) => format!("00{:04}", i),
        }
    }

    fn name_for(class: AssetClass, i: usize) -> String {
        match class {
            // Every 10th fund is a money-market product.
            AssetClass::Etf if i % 10 == 9 => format!("货币ETF{i}"),
            AssetClass::Etf => format!("合成ETF{i}"),
            AssetClass::Equity if i % 10 == 9 => format!("*ST合成{i}"),
            AssetClass::Equity => format!("合成股份{i}"),
        }
    }
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self::new(60)
    }
}

impl HistoryProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        if end < start {
            return Err(DataError::Other(format!("empty range {start}..{end}")));
        }
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars: Self::generate(symbol, start, end),
            source: DataSource::Synthetic,
        })
    }
}

impl ListingProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn list_instruments(&self, class: AssetClass) -> Result<Vec<Instrument>, DataError> {
        Ok((0..self.count)
            .map(|i| Instrument::new(Self::code_for(class, i), Self::name_for(class, i)))
            .collect())
    }
}
