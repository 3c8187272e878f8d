use thiserror::Error;

/// Reasons a series cannot be evaluated at all.
///
/// Both variants disqualify the instrument; the scan itself continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricsError {
    #[error("insufficient history: {actual} usable bars, {required} required")]
    InsufficientHistory { required: usize, actual: usize },

    #[error("insufficient trailing window: {actual} bars, {required} required")]
    InsufficientWindow { required: usize, actual: usize },
}
