//! gridscan core: domain types, history providers, and the metrics pipeline.
//!
//! This crate holds everything that runs per instrument:
//! - Domain types (raw and sanitized bars, instruments, metric records)
//! - History/listing provider traits with HTTP, CSV-directory and synthetic sources
//! - Venue routing for exchange identifiers
//! - The SMA indicator used for trend statistics
//! - The gated metrics pipeline: sanitize → liquidity → trend/amplitude →
//!   choppiness → composite score

pub mod data;
pub mod domain;
pub mod indicators;
pub mod metrics;

#[cfg(test)]
mod tests {
    use super::*;

    /// The scanner may evaluate instruments on a rayon pool, so everything
    /// that crosses an iteration boundary has to be Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::RawBar>();
        require_sync::<domain::RawBar>();
        require_send::<domain::Instrument>();
        require_sync::<domain::Instrument>();
        require_send::<domain::GridRecord>();
        require_sync::<domain::GridRecord>();

        require_send::<metrics::SanitizedSeries>();
        require_sync::<metrics::SanitizedSeries>();
        require_send::<metrics::GateConfig>();
        require_sync::<metrics::GateConfig>();
        require_send::<metrics::Verdict>();
        require_sync::<metrics::Verdict>();

        require_send::<data::CircuitBreaker>();
        require_sync::<data::CircuitBreaker>();
        require_send::<data::RateLimiter>();
        require_sync::<data::RateLimiter>();
        require_send::<data::SinaProvider>();
        require_sync::<data::SinaProvider>();
        require_send::<data::CsvDirProvider>();
        require_sync::<data::CsvDirProvider>();
        require_send::<data::SyntheticProvider>();
        require_sync::<data::SyntheticProvider>();
    }

    /// Providers are used behind trait objects by the scanner.
    #[test]
    fn providers_are_object_safe() {
        fn _history(p: &dyn data::HistoryProvider) -> &str {
            p.name()
        }
        fn _listing(p: &dyn data::ListingProvider) -> &str {
            p.name()
        }
    }
}
