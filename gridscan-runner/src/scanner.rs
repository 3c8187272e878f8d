//! Market scanner: listing → exclusion → fetch → evaluate → ranked report.
//!
//! One code path serves every asset class; the [`ScanProfile`] supplies the
//! thresholds, routing rule and exclusion set. Each instrument is evaluated
//! independently, so the optional rayon pool cannot let one instrument's
//! outcome influence another. Results are collected before aggregation.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gridscan_core::data::{route, DataError, HistoryProvider, ListingProvider};
use gridscan_core::domain::{AssetClass, GridRecord, Instrument};
use gridscan_core::metrics::{evaluate, sanitize, MetricsError, Rejection, Verdict};

use crate::config::{ConfigError, ScanProfile};
use crate::filter::Exclusion;

// ─── Phases, outcomes, observer ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Listing,
    PerInstrumentScan(usize),
    Aggregating,
    Done,
}

/// What happened to one listing entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Excluded(Exclusion),
    Unroutable,
    FetchFailed(String),
    Insufficient(MetricsError),
    Rejected(Rejection),
    Qualified(GridRecord),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Excluded(_) => "excluded",
            Outcome::Unroutable => "unroutable",
            Outcome::FetchFailed(_) => "fetch_failed",
            Outcome::Insufficient(_) => "insufficient",
            Outcome::Rejected(_) => "rejected",
            Outcome::Qualified(_) => "qualified",
        }
    }

    pub fn record(&self) -> Option<&GridRecord> {
        match self {
            Outcome::Qualified(r) => Some(r),
            _ => None,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Excluded(e) => write!(f, "excluded: {e}"),
            Outcome::Unroutable => write!(f, "no venue for this code"),
            Outcome::FetchFailed(e) => write!(f, "fetch failed: {e}"),
            Outcome::Insufficient(e) => write!(f, "insufficient data: {e}"),
            Outcome::Rejected(r) => write!(f, "rejected: {r}"),
            Outcome::Qualified(r) => write!(f, "qualified with score {:.2}", r.score),
        }
    }
}

/// Receives scan events. Called from worker threads when `workers > 1`.
pub trait ScanObserver: Sync {
    fn on_phase(&self, _phase: ScanPhase) {}

    fn on_outcome(&self, _index: usize, _total: usize, _instrument: &Instrument, _outcome: &Outcome) {}

    /// Fired every `progress_interval` processed instruments and at the last one.
    fn on_progress(&self, _processed: usize, _total: usize, _qualified: usize) {}
}

/// Default observer: structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ScanObserver for TracingObserver {
    fn on_phase(&self, phase: ScanPhase) {
        match phase {
            ScanPhase::PerInstrumentScan(i) => tracing::trace!(index = i, "scanning instrument"),
            other => tracing::debug!(phase = ?other, "scan phase"),
        }
    }

    fn on_outcome(&self, index: usize, total: usize, instrument: &Instrument, outcome: &Outcome) {
        tracing::debug!(
            index,
            total,
            code = %instrument.code,
            name = %instrument.name,
            outcome = outcome.label(),
            detail = %outcome,
            "instrument evaluated"
        );
    }

    fn on_progress(&self, processed: usize, total: usize, qualified: usize) {
        tracing::info!(processed, total, qualified, "scan progress");
    }
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentObserver;

impl ScanObserver for SilentObserver {}

// ─── Window, report, errors ──────────────────────────────────────────

/// Inclusive calendar window requested from the history provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ScanWindow {
    /// `years × 365` calendar days ending at `end`.
    pub fn ending(end: NaiveDate, years: u32) -> Self {
        Self {
            start: end - chrono::Duration::days(i64::from(years) * 365),
            end,
        }
    }

    /// Window ending today (local market date).
    pub fn trailing_years(years: u32) -> Self {
        Self::ending(chrono::Local::now().date_naive(), years)
    }
}

/// Per-outcome tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub processed: usize,
    pub excluded: usize,
    pub unroutable: usize,
    pub fetch_failed: usize,
    pub insufficient: usize,
    pub rejected: usize,
    pub qualified: usize,
    /// Rejections broken down by gate.
    pub rejected_by_gate: BTreeMap<String, usize>,
}

impl OutcomeCounts {
    pub fn add(&mut self, outcome: &Outcome) {
        self.processed += 1;
        match outcome {
            Outcome::Excluded(_) => self.excluded += 1,
            Outcome::Unroutable => self.unroutable += 1,
            Outcome::FetchFailed(_) => self.fetch_failed += 1,
            Outcome::Insufficient(_) => self.insufficient += 1,
            Outcome::Rejected(r) => {
                self.rejected += 1;
                *self.rejected_by_gate.entry(r.kind().to_string()).or_default() += 1;
            }
            Outcome::Qualified(_) => self.qualified += 1,
        }
    }
}

/// Final result of a scan.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub asset_class: AssetClass,
    pub window: ScanWindow,
    /// Survivors, sorted by score descending.
    pub records: Vec<GridRecord>,
    pub counts: OutcomeCounts,
    /// Listing size after the instrument cap.
    pub total: usize,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_secs: f64,
}

impl ScanReport {
    pub fn has_survivors(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn top(&self, n: usize) -> &[GridRecord] {
        &self.records[..n.min(self.records.len())]
    }
}

/// Scan-fatal errors. Per-instrument problems never surface here.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    InvalidProfile(#[from] ConfigError),
    #[error("instrument listing unavailable: {0}")]
    ProviderUnavailable(#[from] DataError),
    #[error("instrument listing for {0} is empty")]
    EmptyListing(AssetClass),
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}

// ─── Scanner ─────────────────────────────────────────────────────────

/// Drives one scan over a listing and history provider.
pub struct Scanner<'a> {
    profile: &'a ScanProfile,
    listing: &'a dyn ListingProvider,
    history: &'a dyn HistoryProvider,
}

impl<'a> Scanner<'a> {
    pub fn new(
        profile: &'a ScanProfile,
        listing: &'a dyn ListingProvider,
        history: &'a dyn HistoryProvider,
    ) -> Self {
        Self {
            profile,
            listing,
            history,
        }
    }

    /// Run the full scan.
    ///
    /// - `observer`: receives phases, outcomes and throttled progress.
    /// - `cancel`: optional flag checked before each instrument; a cancelled
    ///   scan still aggregates what it has.
    pub fn run(
        &self,
        window: ScanWindow,
        observer: &dyn ScanObserver,
        cancel: Option<&AtomicBool>,
    ) -> Result<ScanReport, ScanError> {
        self.profile.validate()?;
        let started_at = Utc::now();
        let clock = Instant::now();
        let class = self.profile.asset_class;

        observer.on_phase(ScanPhase::Idle);
        observer.on_phase(ScanPhase::Listing);
        let mut instruments = self.listing.list_instruments(class)?;
        if instruments.is_empty() {
            return Err(ScanError::EmptyListing(class));
        }
        if let Some(max) = self.profile.max_instruments {
            instruments.truncate(max);
        }
        let total = instruments.len();
        tracing::info!(
            class = %class,
            total,
            listing = self.listing.name(),
            history = self.history.name(),
            start = %window.start,
            end = %window.end,
            "scan started"
        );

        let processed = AtomicUsize::new(0);
        let qualified = AtomicUsize::new(0);
        let cancelled = AtomicBool::new(false);

        let step = |i: usize, instrument: &Instrument| -> Option<Outcome> {
            if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
                cancelled.store(true, Ordering::Relaxed);
                return None;
            }
            observer.on_phase(ScanPhase::PerInstrumentScan(i));
            let outcome = self.evaluate_instrument(instrument, window);
            observer.on_outcome(i, total, instrument, &outcome);

            if outcome.record().is_some() {
                qualified.fetch_add(1, Ordering::Relaxed);
            }
            let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
            if done % self.profile.progress_interval == 0 || done == total {
                observer.on_progress(done, total, qualified.load(Ordering::Relaxed));
            }
            Some(outcome)
        };

        let outcomes: Vec<Option<Outcome>> = if self.profile.workers > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.profile.workers)
                .build()
                .map_err(|e| ScanError::WorkerPool(e.to_string()))?;
            pool.install(|| {
                instruments
                    .par_iter()
                    .enumerate()
                    .map(|(i, instrument)| step(i, instrument))
                    .collect()
            })
        } else {
            let mut out = Vec::with_capacity(total);
            for (i, instrument) in instruments.iter().enumerate() {
                let outcome = step(i, instrument);
                if outcome.is_none() {
                    break;
                }
                out.push(outcome);
            }
            out
        };

        observer.on_phase(ScanPhase::Aggregating);
        let mut counts = OutcomeCounts::default();
        let mut records = Vec::new();
        for outcome in outcomes.into_iter().flatten() {
            counts.add(&outcome);
            if let Outcome::Qualified(record) = outcome {
                records.push(record);
            }
        }
        // Stable sort: ties keep listing order.
        records.sort_by(|a, b| b.score.total_cmp(&a.score));

        let cancelled = cancelled.load(Ordering::Relaxed);
        let elapsed_secs = clock.elapsed().as_secs_f64();
        tracing::info!(
            class = %class,
            processed = counts.processed,
            qualified = counts.qualified,
            excluded = counts.excluded,
            fetch_failed = counts.fetch_failed,
            insufficient = counts.insufficient,
            rejected = counts.rejected,
            cancelled,
            elapsed_secs,
            "scan finished"
        );
        observer.on_phase(ScanPhase::Done);

        Ok(ScanReport {
            asset_class: class,
            window,
            records,
            counts,
            total,
            cancelled,
            started_at,
            finished_at: Utc::now(),
            elapsed_secs,
        })
    }

    /// Exclusion, routing, fetch, sanitize and evaluate one instrument.
    pub fn evaluate_instrument(&self, instrument: &Instrument, window: ScanWindow) -> Outcome {
        if let Some(exclusion) = self.profile.exclusions.check(instrument) {
            return Outcome::Excluded(exclusion);
        }
        self.fetch_and_evaluate(instrument, window).1
    }

    fn fetch_and_evaluate(
        &self,
        instrument: &Instrument,
        window: ScanWindow,
    ) -> (Option<SeriesSummary>, Outcome) {
        let Some(symbol) = route(self.profile.asset_class, &instrument.code) else {
            return (None, Outcome::Unroutable);
        };

        if !self.history.is_available() {
            return (
                None,
                Outcome::FetchFailed(format!("{} is not accepting requests", self.history.name())),
            );
        }
        let fetched = match self.history.fetch(&symbol, window.start, window.end) {
            Ok(f) => f,
            Err(e) => {
                if e.is_unavailable() {
                    tracing::warn!(symbol = %symbol, error = %e, "history provider unavailable");
                } else {
                    tracing::debug!(symbol = %symbol, error = %e, "history fetch failed");
                }
                return (None, Outcome::FetchFailed(e.to_string()));
            }
        };
        let raw_rows = fetched.bars.len();

        let series = match sanitize(fetched.bars, window.start, window.end, self.profile.min_bars()) {
            Ok(s) => s,
            Err(e) => {
                let summary = SeriesSummary {
                    symbol,
                    raw_rows,
                    bars: 0,
                    first_date: None,
                    last_date: None,
                };
                return (Some(summary), Outcome::Insufficient(e));
            }
        };
        let summary = SeriesSummary {
            symbol,
            raw_rows,
            bars: series.len(),
            first_date: series.first_date(),
            last_date: series.last_date(),
        };

        let outcome = match evaluate(&series, &self.profile.gates) {
            Ok(Verdict::Qualified(metrics)) => Outcome::Qualified(GridRecord::new(instrument, &metrics)),
            Ok(Verdict::Rejected(rejection)) => Outcome::Rejected(rejection),
            Err(e) => Outcome::Insufficient(e),
        };
        (Some(summary), outcome)
    }

    /// Run the pipeline on a single code, skipping the listing.
    ///
    /// Exclusion rules are reported but do not stop the evaluation, so the
    /// caller always sees the metrics or the exact gate that failed.
    pub fn inspect(&self, instrument: &Instrument, window: ScanWindow) -> InspectReport {
        let exclusion = self.profile.exclusions.check(instrument);
        let (series, outcome) = self.fetch_and_evaluate(instrument, window);
        InspectReport {
            instrument: instrument.clone(),
            window,
            exclusion,
            series,
            outcome,
        }
    }
}

/// Shape of the fetched series, reported by `inspect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesSummary {
    pub symbol: String,
    pub raw_rows: usize,
    pub bars: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct InspectReport {
    pub instrument: Instrument,
    pub window: ScanWindow,
    /// Exclusion rule the instrument would hit in a full scan.
    pub exclusion: Option<Exclusion>,
    pub series: Option<SeriesSummary>,
    pub outcome: Outcome,
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridscan_core::data::SyntheticProvider;

    fn window() -> ScanWindow {
        ScanWindow::ending(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(), 3)
    }

    #[test]
    fn window_spans_years_of_calendar_days() {
        let w = window();
        assert_eq!((w.end - w.start).num_days(), 3 * 365);
    }

    #[test]
    fn counts_tally_by_gate() {
        let mut counts = OutcomeCounts::default();
        counts.add(&Outcome::Unroutable);
        counts.add(&Outcome::Rejected(Rejection::DegenerateTrend));
        counts.add(&Outcome::Rejected(Rejection::DegenerateTrend));
        assert_eq!(counts.processed, 3);
        assert_eq!(counts.rejected, 2);
        assert_eq!(counts.rejected_by_gate.get("degenerate_trend"), Some(&2));
    }

    #[test]
    fn synthetic_scan_sorts_descending() {
        let profile = ScanProfile::etf();
        let provider = SyntheticProvider::new(30);
        let scanner = Scanner::new(&profile, &provider, &provider);
        let report = scanner.run(window(), &SilentObserver, None).unwrap();

        assert_eq!(report.total, 30);
        assert_eq!(report.counts.processed, 30);
        assert!(report.counts.excluded >= 3);
        assert!(report.records.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(!report.cancelled);
    }

    #[test]
    fn pre_cancelled_scan_processes_nothing() {
        let profile = ScanProfile::etf();
        let provider = SyntheticProvider::new(10);
        let scanner = Scanner::new(&profile, &provider, &provider);
        let flag = AtomicBool::new(true);
        let report = scanner.run(window(), &SilentObserver, Some(&flag)).unwrap();
        assert!(report.cancelled);
        assert_eq!(report.counts.processed, 0);
        assert!(report.records.is_empty());
    }

    #[test]
    fn inspect_reports_exclusion_but_still_evaluates() {
        let profile = ScanProfile::etf();
        let provider = SyntheticProvider::new(10);
        let scanner = Scanner::new(&profile, &provider, &provider);
        let report = scanner.inspect(&Instrument::new("511880", "货币ETF"), window());
        assert!(report.exclusion.is_some());
        let series = report.series.expect("synthetic history is always available");
        assert_eq!(series.symbol, "sh511880");
        assert!(series.bars > 0);
        assert!(!matches!(report.outcome, Outcome::Excluded(_)));
    }
}
