//! Liquidity gate.
//!
//! Averages turnover (volume × close) over the most recent bars and vetoes
//! instruments whose average is below the configured floor. A veto here stops
//! all further work on the instrument.

use serde::{Deserialize, Serialize};

use super::MetricsError;
use crate::domain::Bar;

/// Default trailing window, in bars.
pub const DEFAULT_TURNOVER_WINDOW: usize = 20;

/// Trailing-turnover floor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidityGate {
    /// Number of most recent bars averaged.
    pub window: usize,
    /// Minimum average turnover in currency units. Equal passes.
    pub min_avg_turnover: f64,
}

/// Outcome of the liquidity check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiquidityCheck {
    pub avg_turnover: f64,
    pub passed: bool,
}

impl LiquidityGate {
    pub fn new(min_avg_turnover: f64) -> Self {
        Self {
            window: DEFAULT_TURNOVER_WINDOW,
            min_avg_turnover,
        }
    }

    /// True if `avg_turnover` clears the floor.
    pub fn passes(&self, avg_turnover: f64) -> bool {
        avg_turnover >= self.min_avg_turnover
    }

    /// Mean turnover of the trailing window.
    pub fn average_turnover(&self, bars: &[Bar]) -> Result<f64, MetricsError> {
        if self.window == 0 || bars.len() < self.window {
            return Err(MetricsError::InsufficientWindow {
                required: self.window.max(1),
                actual: bars.len(),
            });
        }
        let tail = &bars[bars.len() - self.window..];
        Ok(tail.iter().map(Bar::turnover).sum::<f64>() / self.window as f64)
    }

    pub fn check(&self, bars: &[Bar]) -> Result<LiquidityCheck, MetricsError> {
        let avg_turnover = self.average_turnover(bars)?;
        Ok(LiquidityCheck {
            avg_turnover,
            passed: self.passes(avg_turnover),
        })
    }
}
