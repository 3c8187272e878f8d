//! Market data access: provider traits, the Sina HTTP client, offline CSV
//! and synthetic sources, venue routing, and request throttling.

pub mod circuit_breaker;
pub mod csv_dir;
pub mod provider;
pub mod rate_limit;
pub mod retry;
pub mod routing;
pub mod sina;
pub mod synthetic;

pub use circuit_breaker::CircuitBreaker;
pub use csv_dir::CsvDirProvider;
pub use provider::{DataError, DataSource, FetchResult, HistoryProvider, ListingProvider};
pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;
pub use routing::{route, route_equity, route_etf};
pub use sina::{apply_forward_factors, parse_forward_factors, PriceAdjustment, SinaConfig, SinaProvider};
pub use synthetic::{SyntheticProvider, SyntheticShape};
