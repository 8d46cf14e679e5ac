//! Calendar-day arithmetic in a business zone.

use chrono::offset::LocalResult;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use super::TimePoint;

/// Calendar date of `t` as observed in `zone`.
pub fn local_date(t: TimePoint, zone: Tz) -> NaiveDate {
    t.with_timezone(&zone).date_naive()
}

/// UTC instant of local midnight on `date` in `zone`.
///
/// Zones that skip midnight on a DST change start the day at the first
/// valid local instant after it.
pub fn midnight(date: NaiveDate, zone: Tz) -> Option<TimePoint> {
    localize(date.and_hms_opt(0, 0, 0)?, zone)
}

/// Attach `zone` to a naive local time.
///
/// Ambiguous (fall-back) times resolve to the earlier instant; times inside a
/// spring-forward gap are shifted forward by one hour.
pub fn localize(naive: NaiveDateTime, zone: Tz) -> Option<TimePoint> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => match zone.from_local_datetime(&(naive + TimeDelta::hours(1))) {
            LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
            LocalResult::None => None,
        },
    }
}

/// Start of the calendar day containing `t`.
pub fn start_of_day(t: TimePoint, zone: Tz) -> TimePoint {
    midnight(local_date(t, zone), zone).unwrap_or(t)
}

/// Start of the calendar day following the one containing `t`.
pub fn start_of_next_day(t: TimePoint, zone: Tz) -> TimePoint {
    local_date(t, zone)
        .succ_opt()
        .and_then(|next| midnight(next, zone))
        .unwrap_or(t)
}
