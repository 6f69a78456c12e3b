//! Market session classification from wall-clock time.
//!
//! Sessions are evaluated in exchange-local time. US Eastern offsets follow
//! the post-2007 DST rules; exchange holidays are not modeled.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::macros::offset;
use time::{Date, Month, OffsetDateTime, Time, UtcOffset, Weekday};

use crate::ValidationError;

const PRE_OPEN: u32 = 4 * 60;
const REGULAR_OPEN: u32 = 9 * 60 + 30;
const REGULAR_CLOSE: u32 = 16 * 60;
const POST_CLOSE: u32 = 20 * 60;

/// Trading session a timestamp falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketSession {
    Pre,
    Regular,
    Post,
    Closed,
}

impl MarketSession {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pre => "PRE",
            Self::Regular => "REGULAR",
            Self::Post => "POST",
            Self::Closed => "CLOSED",
        }
    }
}

impl Display for MarketSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exchange-local timezone used for session windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExchangeTimezone {
    /// America/New_York with daylight saving.
    #[default]
    UsEastern,
    /// Fixed offset from UTC, no daylight saving.
    Fixed(UtcOffset),
}

impl ExchangeTimezone {
    /// UTC offset in effect at the given instant.
    pub fn offset_at(self, at: OffsetDateTime) -> UtcOffset {
        match self {
            Self::Fixed(offset) => offset,
            Self::UsEastern => {
                if us_daylight_saving(at) {
                    offset!(-4)
                } else {
                    offset!(-5)
                }
            }
        }
    }

    pub fn to_local(self, at: OffsetDateTime) -> OffsetDateTime {
        at.to_offset(self.offset_at(at))
    }
}

impl Display for ExchangeTimezone {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UsEastern => f.write_str("America/New_York"),
            Self::Fixed(offset) if offset.is_utc() => f.write_str("UTC"),
            Self::Fixed(offset) => {
                let (hours, minutes, _) = offset.as_hms();
                let sign = if offset.is_negative() { '-' } else { '+' };
                write!(f, "{sign}{:02}:{:02}", hours.unsigned_abs(), minutes.unsigned_abs())
            }
        }
    }
}

impl FromStr for ExchangeTimezone {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let invalid = || ValidationError::InvalidTimezone {
            value: trimmed.to_owned(),
        };

        match trimmed.to_ascii_lowercase().as_str() {
            "america/new_york" | "us/eastern" | "est5edt" => return Ok(Self::UsEastern),
            "utc" | "z" | "etc/utc" => return Ok(Self::Fixed(UtcOffset::UTC)),
            _ => {}
        }

        let (sign, rest) = match trimmed.as_bytes().first() {
            Some(b'+') => (1_i8, &trimmed[1..]),
            Some(b'-') => (-1_i8, &trimmed[1..]),
            _ => return Err(invalid()),
        };
        let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
        if hours.len() != 2 || minutes.len() != 2 {
            return Err(invalid());
        }
        let hours: i8 = hours.parse().map_err(|_| invalid())?;
        let minutes: i8 = minutes.parse().map_err(|_| invalid())?;
        if hours > 23 || minutes > 59 {
            return Err(invalid());
        }

        UtcOffset::from_hms(sign * hours, sign * minutes, 0)
            .map(Self::Fixed)
            .map_err(|_| invalid())
    }
}

/// DST runs from 02:00 local on the second Sunday of March to 02:00 local on
/// the first Sunday of November.
fn us_daylight_saving(at: OffsetDateTime) -> bool {
    let utc = at.to_offset(UtcOffset::UTC);
    let year = utc.year();
    // 02:00 EST is 07:00 UTC; 02:00 EDT is 06:00 UTC.
    let start = nth_sunday(year, Month::March, 2).map(|date| utc_at_hour(date, 7));
    let end = nth_sunday(year, Month::November, 1).map(|date| utc_at_hour(date, 6));

    match (start, end) {
        (Some(start), Some(end)) => utc >= start && utc < end,
        _ => false,
    }
}

fn utc_at_hour(date: Date, hour: i64) -> OffsetDateTime {
    date.with_time(Time::MIDNIGHT).assume_utc() + time::Duration::hours(hour)
}

fn nth_sunday(year: i32, month: Month, n: u8) -> Option<Date> {
    let first = Date::from_calendar_date(year, month, 1).ok()?;
    let until_sunday = (7 - first.weekday().number_days_from_sunday()) % 7;
    Date::from_calendar_date(year, month, 1 + until_sunday + 7 * (n - 1)).ok()
}

/// Session classification together with the local time it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session: MarketSession,
    /// Minutes since the regular open; only set during [`MarketSession::Regular`].
    pub minutes_since_open: Option<u32>,
    #[serde(with = "time::serde::rfc3339")]
    pub local_time: OffsetDateTime,
}

/// Classifies `at` into a trading session.
///
/// Windows are half-open: PRE `[04:00, 09:30)`, REGULAR `[09:30, 16:00)`,
/// POST `[16:00, 20:00)`. Weekends are always closed.
pub fn classify(at: OffsetDateTime, timezone: ExchangeTimezone) -> SessionSnapshot {
    let local_time = timezone.to_local(at);
    let minute_of_day = u32::from(local_time.hour()) * 60 + u32::from(local_time.minute());

    let weekend = matches!(local_time.weekday(), Weekday::Saturday | Weekday::Sunday);
    let session = if weekend {
        MarketSession::Closed
    } else {
        match minute_of_day {
            m if (PRE_OPEN..REGULAR_OPEN).contains(&m) => MarketSession::Pre,
            m if (REGULAR_OPEN..REGULAR_CLOSE).contains(&m) => MarketSession::Regular,
            m if (REGULAR_CLOSE..POST_CLOSE).contains(&m) => MarketSession::Post,
            _ => MarketSession::Closed,
        }
    };

    let minutes_since_open =
        (session == MarketSession::Regular).then(|| minute_of_day - REGULAR_OPEN);

    SessionSnapshot {
        session,
        minutes_since_open,
        local_time,
    }
}

/// Source of "now". Injected so session logic is testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn windows_are_half_open() {
        // 2024-01-10 is a Wednesday in EST (UTC-5).
        let tz = ExchangeTimezone::UsEastern;
        let cases = [
            (datetime!(2024-01-10 08:59 UTC), MarketSession::Closed),
            (datetime!(2024-01-10 09:00 UTC), MarketSession::Pre),
            (datetime!(2024-01-10 14:29 UTC), MarketSession::Pre),
            (datetime!(2024-01-10 14:30 UTC), MarketSession::Regular),
            (datetime!(2024-01-10 20:59 UTC), MarketSession::Regular),
            (datetime!(2024-01-10 21:00 UTC), MarketSession::Post),
            (datetime!(2024-01-11 00:59 UTC), MarketSession::Post),
            (datetime!(2024-01-11 01:00 UTC), MarketSession::Closed),
        ];

        for (at, expected) in cases {
            assert_eq!(classify(at, tz).session, expected, "at {at}");
        }
    }

    #[test]
    fn minutes_since_open_only_during_regular() {
        let tz = ExchangeTimezone::UsEastern;
        let snapshot = classify(datetime!(2024-01-10 15:15 UTC), tz);
        assert_eq!(snapshot.minutes_since_open, Some(45));
        assert_eq!(classify(datetime!(2024-01-10 12:00 UTC), tz).minutes_since_open, None);
    }

    #[test]
    fn dst_boundaries_2024() {
        let tz = ExchangeTimezone::UsEastern;
        assert_eq!(tz.offset_at(datetime!(2024-03-10 06:59 UTC)), offset!(-5));
        assert_eq!(tz.offset_at(datetime!(2024-03-10 07:00 UTC)), offset!(-4));
        assert_eq!(tz.offset_at(datetime!(2024-11-03 05:59 UTC)), offset!(-4));
        assert_eq!(tz.offset_at(datetime!(2024-11-03 06:00 UTC)), offset!(-5));
    }

    #[test]
    fn weekend_is_closed_at_midday() {
        let snapshot = classify(datetime!(2024-01-13 17:00 UTC), ExchangeTimezone::UsEastern);
        assert_eq!(snapshot.session, MarketSession::Closed);
    }

    #[test]
    fn parses_timezone_names_and_offsets() {
        assert_eq!("America/New_York".parse::<ExchangeTimezone>(), Ok(ExchangeTimezone::UsEastern));
        assert_eq!("utc".parse::<ExchangeTimezone>(), Ok(ExchangeTimezone::Fixed(UtcOffset::UTC)));
        assert_eq!("-05:00".parse::<ExchangeTimezone>(), Ok(ExchangeTimezone::Fixed(offset!(-5))));
        assert_eq!("+05:30".parse::<ExchangeTimezone>(), Ok(ExchangeTimezone::Fixed(offset!(+5:30))));
        assert!("Mars/Olympus".parse::<ExchangeTimezone>().is_err());
        assert!("+5".parse::<ExchangeTimezone>().is_err());
        assert_eq!(ExchangeTimezone::Fixed(offset!(-3:30)).to_string(), "-03:30");
    }
}
