//! Provider traits and structured error types.
//!
//! `ListingProvider` enumerates a market; `HistoryProvider` returns daily
//! bars for one routed symbol. Both abstract over the data source (Sina HTTP,
//! CSV directory, synthetic) so the scanner can be driven by mocks in tests.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{AssetClass, Instrument, RawBar};

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("rate limited by provider")]
    RateLimited,

    #[error("hard stop: data provider has blocked requests (circuit breaker open)")]
    CircuitBreakerTripped,

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// True for errors that mean the source itself cannot be reached, as
    /// opposed to a problem with one symbol.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            DataError::ProviderUnavailable(_)
                | DataError::Timeout { .. }
                | DataError::RateLimited
                | DataError::CircuitBreakerTripped
        )
    }
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    SinaFinance,
    CsvDirectory,
    Synthetic,
}

/// Result of a successful history fetch for a single symbol.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub bars: Vec<RawBar>,
    pub source: DataSource,
}

/// Source of daily OHLCV history.
pub trait HistoryProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily bars for a routed symbol (e.g. `sh510300`) over a date range.
    ///
    /// Providers may return rows outside the range; the sanitizer clips them.
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<FetchResult, DataError>;

    /// Check if the provider is currently available (not blocked).
    fn is_available(&self) -> bool {
        true
    }
}

/// Source of the instrument universe for an asset class.
pub trait ListingProvider: Send + Sync {
    fn name(&self) -> &str;

    fn list_instruments(&self, class: AssetClass) -> Result<Vec<Instrument>, DataError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_unavailable_errors() {
        assert!(DataError::ProviderUnavailable("down".into()).is_unavailable());
        assert!(DataError::Timeout { timeout_secs: 10 }.is_unavailable());
        assert!(DataError::CircuitBreakerTripped.is_unavailable());
        assert!(!DataError::SymbolNotFound {
            symbol: "sh000000".into()
        }
        .is_unavailable());
    }
}
