//! Relative volume normalized for elapsed session time.

use crate::session::{MarketSession, SessionSnapshot};

/// Length of the regular session in minutes.
pub const REGULAR_SESSION_MINUTES: u32 = 390;

/// Lower bound on the elapsed fraction, so the first minutes after the open
/// do not produce exploding ratios.
pub const MIN_ELAPSED_FRACTION: f64 = 0.05;

/// Fraction of the regular session elapsed, clamped to `[0.05, 1.0]`.
pub fn elapsed_fraction(minutes_since_open: u32) -> f64 {
    (f64::from(minutes_since_open) / f64::from(REGULAR_SESSION_MINUTES))
        .clamp(MIN_ELAPSED_FRACTION, 1.0)
}

/// Relative volume of `current` against the `average` daily volume.
///
/// During the regular session the average is scaled by the elapsed fraction;
/// in any other session the full-day average is used. Unknown or zero
/// averages yield `None`.
pub fn relative_volume(current: u64, average: Option<u64>, snapshot: &SessionSnapshot) -> Option<f64> {
    let average = average.filter(|value| *value > 0)? as f64;

    let expected = match snapshot.session {
        MarketSession::Regular => {
            let minutes = snapshot.minutes_since_open.unwrap_or(REGULAR_SESSION_MINUTES);
            average * elapsed_fraction(minutes)
        }
        MarketSession::Pre | MarketSession::Post | MarketSession::Closed => average,
    };

    Some(current as f64 / expected)
}
