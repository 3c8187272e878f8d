//! Choppiness: how much a price path wiggles relative to where it ends up.
//!
//! `1 − net_displacement / (path_length + ε)`. A value of 1 means the close
//! returned exactly to its starting level; values near 0 mean the path moved
//! almost monotonically.

use super::previous_closes;
use crate::domain::Bar;

/// Guards the division when the path is perfectly flat.
pub const CHOPPINESS_EPSILON: f64 = 0.0001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Choppiness {
    /// Σ |close − previous close|, including the first bar against its own open.
    pub path_length: f64,
    /// |last close − first close|.
    pub net_displacement: f64,
    pub value: f64,
}

pub fn choppiness(bars: &[Bar]) -> Choppiness {
    let (first, last) = match (bars.first(), bars.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => {
            return Choppiness {
                path_length: 0.0,
                net_displacement: 0.0,
                value: 1.0,
            }
        }
    };

    let path_length: f64 = bars
        .iter()
        .zip(previous_closes(bars))
        .map(|(bar, prev)| (bar.close - prev).abs())
        .sum();
    let net_displacement = (last.close - first.close).abs();

    Choppiness {
        path_length,
        net_displacement,
        value: 1.0 - net_displacement / (path_length + CHOPPINESS_EPSILON),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars};

    #[test]
    fn round_trip_is_exactly_one() {
        let bars = make_bars(&[10.0, 12.0, 9.0, 11.0, 10.0]);
        let c = choppiness(&bars);
        assert!(c.path_length > 0.0);
        assert_eq!(c.net_displacement, 0.0);
        assert_eq!(c.value, 1.0);
    }

    #[test]
    fn linear_path_is_near_zero() {
        let closes: Vec<f64> = (0..200).map(|i| 10.0 + 0.5 * i as f64).collect();
        let c = choppiness(&make_bars(&closes));
        // make_bars opens the first bar at its own close, so path == net.
        assert_approx(c.path_length, c.net_displacement, 1e-9);
        assert!(c.value < 1e-5, "value = {}", c.value);
        assert!(c.value > 0.0);
    }

    #[test]
    fn first_bar_contributes_close_minus_open() {
        let mut bars = make_bars(&[10.0, 10.0]);
        bars[0].open = 9.0;
        let c = choppiness(&bars);
        assert_approx(c.path_length, 1.0, 1e-12);
    }

    #[test]
    fn flat_series_is_one() {
        let c = choppiness(&make_bars(&[7.0; 10]));
        assert_eq!(c.path_length, 0.0);
        assert_eq!(c.value, 1.0);
    }
}
