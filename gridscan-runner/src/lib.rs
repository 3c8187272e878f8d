//! gridscan runner: scan profiles, the market scanner, and ranked export.
//!
//! This crate builds on `gridscan-core` to provide:
//! - Serializable per-asset-class scan profiles with TOML loading
//! - The pre-fetch exclusion filter
//! - The scanner loop with observer callbacks, cancellation and optional workers
//! - CSV/manifest export and the console preview
//! - Logging initialization

pub mod config;
pub mod export;
pub mod filter;
pub mod logging;
pub mod scanner;

pub use config::{ConfigError, ExclusionRules, ScanProfile};
pub use export::{
    manifest_path_for, read_manifest, records_to_csv, render_table, write_csv, write_manifest,
    ScanManifest, CONSOLE_TOP_N, SCHEMA_VERSION,
};
pub use filter::Exclusion;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use scanner::{
    InspectReport, Outcome, OutcomeCounts, ScanError, ScanObserver, ScanPhase, ScanReport,
    ScanWindow, Scanner, SeriesSummary, SilentObserver, TracingObserver,
};
