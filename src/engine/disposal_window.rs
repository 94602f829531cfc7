//! Weekend pickup booking window.
//!
//! Pickups run on Saturdays and Sundays (UTC). Bookings for a weekend open at
//! the preceding Friday 12:00 UTC cutoff; once that cutoff has passed, the
//! earliest slot that can still be taken is 24 hours after it.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};
use thiserror::Error;

const CUTOFF_HOUR: i64 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("Pickups can only be scheduled on a Saturday or Sunday")]
    InvalidDay,
    #[error("Pickup bookings for that weekend open at {opens_at}")]
    TooEarly { opens_at: DateTime<Utc> },
    #[error("Too late to book this weekend; the earliest available slot is {earliest}")]
    TooLateForThisWeekend { earliest: DateTime<Utc> },
}

/// The Friday 12:00 UTC cutoff for the booking cycle containing `now`.
///
/// On a Friday this is the same day's noon, even if `now` is already past
/// it; on any other day it is the next Friday.
pub fn booking_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    let weekday = i64::from(now.weekday().num_days_from_sunday());
    let friday = i64::from(Weekday::Fri.num_days_from_sunday());
    let days_until_friday = (friday - weekday + 7) % 7;

    let cutoff_date = now.date_naive() + Duration::days(days_until_friday);
    let cutoff = cutoff_date.and_time(NaiveTime::default()) + Duration::hours(CUTOFF_HOUR);
    Utc.from_utc_datetime(&cutoff)
}

/// Check whether a pickup may be booked for `requested` at instant `now`.
pub fn validate(requested: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), WindowError> {
    if !matches!(requested.weekday(), Weekday::Sat | Weekday::Sun) {
        return Err(WindowError::InvalidDay);
    }

    let cutoff = booking_cutoff(now);
    if now > cutoff {
        let earliest = cutoff + Duration::hours(24);
        if requested < earliest {
            return Err(WindowError::TooLateForThisWeekend { earliest });
        }
    } else if requested < cutoff {
        return Err(WindowError::TooEarly { opens_at: cutoff });
    }

    Ok(())
}
