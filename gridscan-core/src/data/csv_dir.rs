//! Offline provider backed by a directory of CSV files.
//!
//! Layout:
//! - `listing_etf.csv`, `listing_equity.csv` with header `code,name`
//! - `<symbol>.csv` per routed symbol with header `date,open,high,low,close,volume`
//!
//! Numeric cells are read as text and coerced, so blanks and `--` become
//! missing values instead of parse errors.

use super::provider::{DataError, DataSource, FetchResult, HistoryProvider, ListingProvider};
use crate::domain::{AssetClass, Instrument, RawBar};
use crate::metrics::{coerce_price, coerce_volume};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct HistoryRow {
    date: String,
    #[serde(default)]
    open: String,
    #[serde(default)]
    high: String,
    #[serde(default)]
    low: String,
    #[serde(default)]
    close: String,
    #[serde(default)]
    volume: String,
}

#[derive(Debug, Deserialize)]
struct ListingRow {
    code: String,
    #[serde(default)]
    name: String,
}

/// Reads listings and history from CSV files under one directory.
#[derive(Debug, Clone)]
pub struct CsvDirProvider {
    root: PathBuf,
}

impl CsvDirProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn history_path(&self, symbol: &str) -> PathBuf {
        self.root.join(format!("{symbol}.csv"))
    }

    pub fn listing_path(&self, class: AssetClass) -> PathBuf {
        self.root.join(format!("listing_{}.csv", class.as_str()))
    }

    fn parse_date(text: &str) -> Option<NaiveDate> {
        let text = text.trim();
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(text, "%Y%m%d"))
            .ok()
    }
}

impl HistoryProvider for CsvDirProvider {
    fn name(&self) -> &str {
        "csv_directory"
    }

    fn fetch(
        &self,
        symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let path = self.history_path(symbol);
        if !path.exists() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(&path)?;
        let mut bars = Vec::new();
        for row in reader.deserialize::<HistoryRow>() {
            let row = row?;
            let Some(date) = Self::parse_date(&row.date) else {
                tracing::debug!(symbol, date = %row.date, "skipping row with unparseable date");
                continue;
            };
            bars.push(RawBar {
                date,
                open: coerce_price(&row.open),
                high: coerce_price(&row.high),
                low: coerce_price(&row.low),
                close: coerce_price(&row.close),
                volume: coerce_volume(&row.volume),
            });
        }

        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::CsvDirectory,
        })
    }
}

impl ListingProvider for CsvDirProvider {
    fn name(&self) -> &str {
        "csv_directory"
    }

    fn list_instruments(&self, class: AssetClass) -> Result<Vec<Instrument>, DataError> {
        let path = self.listing_path(class);
        if !path.exists() {
            return Err(DataError::ProviderUnavailable(format!(
                "listing file {} not found",
                path.display()
            )));
        }
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(&path)?;
        let mut instruments = Vec::new();
        for row in reader.deserialize::<ListingRow>() {
            let row = row?;
            if row.code.trim().is_empty() {
                continue;
            }
            instruments.push(Instrument::new(row.code, row.name));
        }
        Ok(instruments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_history_with_missing_cells() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("sh510300.csv"),
            "date,open,high,low,close,volume\n\
             2024-01-02,3.50,3.56,3.49,3.54,1200300\n\
             2024-01-03,,3.60,3.52,3.58,980000\n\
             20240104,3.58,3.61,3.55,--,1000\n\
             not-a-date,1,1,1,1,1\n",
        )
        .unwrap();

        let provider = CsvDirProvider::new(dir.path());
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let result = provider.fetch("sh510300", start, end).unwrap();

        assert_eq!(result.source, DataSource::CsvDirectory);
        assert_eq!(result.bars.len(), 3);
        assert_eq!(result.bars[1].open, None);
        assert_eq!(result.bars[1].close, Some(3.58));
        assert_eq!(result.bars[2].date, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
        assert_eq!(result.bars[2].close, None);
    }

    #[test]
    fn missing_history_file_is_symbol_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CsvDirProvider::new(dir.path());
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(matches!(
            provider.fetch("sz159915", d, d),
            Err(DataError::SymbolNotFound { .. })
        ));
    }

    #[test]
    fn reads_listing_and_skips_blank_codes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("listing_etf.csv"),
            "code,name\n510300,沪深300ETF\n,orphan\n159915, 创业板ETF \n",
        )
        .unwrap();
        let provider = CsvDirProvider::new(dir.path());
        let listing = provider.list_instruments(AssetClass::Etf).unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[1], Instrument::new("159915", "创业板ETF"));

        assert!(provider
            .list_instruments(AssetClass::Equity)
            .unwrap_err()
            .is_unavailable());
    }
}
