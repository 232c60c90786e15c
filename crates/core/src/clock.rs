//! Clock and civil calendar adapter.
//!
//! Instants are stored and compared in UTC. Every notion of "day" or "month"
//! is civil: the instant is shifted by the fixed `+09:00` offset first and only
//! then truncated. No other module performs offset arithmetic.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Offset of the civil calendar from UTC, in seconds (JST).
pub const CIVIL_OFFSET_SECS: i64 = 9 * 60 * 60;

fn civil_offset() -> Duration {
    Duration::seconds(CIVIL_OFFSET_SECS)
}

/// Source of the current instant, injected so "today" is deterministic in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        civil_date_of(self.now())
    }
}

#[derive(Clone, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Clone, Debug)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

/// Half-open `[start, end)` range of absolute instants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl InstantRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// Civil wall-clock reading of an instant.
pub fn civil_datetime_of(instant: DateTime<Utc>) -> NaiveDateTime {
    instant.naive_utc() + civil_offset()
}

/// Civil `(year, month, day)` of an instant.
pub fn civil_date_of(instant: DateTime<Utc>) -> NaiveDate {
    civil_datetime_of(instant).date()
}

/// UTC instant of a civil date and time-of-day, e.g. the values of a date picker.
pub fn civil_instant(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&(date.and_time(time) - civil_offset()))
}

/// Instants covering one civil day. The end is the first instant of the next day.
pub fn civil_day_bounds(date: NaiveDate) -> InstantRange {
    let start = civil_instant(date, NaiveTime::MIN);
    let end = date
        .succ_opt()
        .map(|next| civil_instant(next, NaiveTime::MIN))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    InstantRange::new(start, end)
}

/// Instants covering one civil month: its first instant and the first instant
/// of the following month.
pub fn civil_month_bounds(month: CivilMonth) -> InstantRange {
    let start = civil_instant(month.first_day(), NaiveTime::MIN);
    let end = civil_instant(month.next().first_day(), NaiveTime::MIN);
    InstantRange::new(start, end)
}

/// A validated civil `(year, month)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CivilMonth {
    year: i32,
    month: u32,
}

impl CivilMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, DomainError> {
        let valid = (1..=12).contains(&month) && NaiveDate::from_ymd_opt(year, month, 1).is_some();
        if !valid {
            return Err(DomainError::InvalidMonth { year, month });
        }
        Ok(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self { year: date.year(), month: date.month() }
    }

    pub fn containing(instant: DateTime<Utc>) -> Self {
        Self::of(civil_date_of(instant))
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MAX)
    }

    /// December rolls over to January of the following year.
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }
}

impl fmt::Display for CivilMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for CivilMonth {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::InvalidMonth { year: 0, month: 0 };
        let (year, month) = value.trim().split_once('-').ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};

    use super::{
        civil_date_of, civil_day_bounds, civil_instant, civil_month_bounds, CivilMonth, Clock,
        FixedClock,
    };
    use crate::errors::DomainError;

    fn utc(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).expect("valid rfc3339").with_timezone(&Utc)
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn civil_date_shifts_late_utc_evening_into_next_day() {
        assert_eq!(civil_date_of(utc("2024-05-31T14:59:59Z")), date(2024, 5, 31));
        assert_eq!(civil_date_of(utc("2024-05-31T15:00:00Z")), date(2024, 6, 1));
    }

    #[test]
    fn civil_date_is_stable_under_recomputation() {
        let instant = utc("2024-12-31T20:30:00Z");
        let first = civil_date_of(instant);
        for _ in 0..3 {
            assert_eq!(civil_date_of(instant), first);
        }
        assert_eq!(first, date(2025, 1, 1));
    }

    #[test]
    fn day_bounds_start_at_civil_midnight() {
        let bounds = civil_day_bounds(date(2024, 5, 10));
        assert_eq!(bounds.start, utc("2024-05-09T15:00:00Z"));
        assert_eq!(bounds.end, utc("2024-05-10T15:00:00Z"));
        assert!(bounds.contains(utc("2024-05-10T14:59:59Z")));
        assert!(!bounds.contains(utc("2024-05-10T15:00:00Z")));
    }

    #[test]
    fn month_bounds_roll_december_into_january() {
        let december = CivilMonth::new(2024, 12).expect("valid month");
        let bounds = civil_month_bounds(december);
        assert_eq!(bounds.start, utc("2024-11-30T15:00:00Z"));
        assert_eq!(bounds.end, utc("2024-12-31T15:00:00Z"));
        assert_eq!(december.next(), CivilMonth::new(2025, 1).expect("valid month"));
    }

    #[test]
    fn civil_instant_inverts_civil_date() {
        let instant = civil_instant(date(2024, 6, 1), NaiveTime::from_hms_opt(7, 0, 0).expect("time"));
        assert_eq!(instant, utc("2024-05-31T22:00:00Z"));
        assert_eq!(civil_date_of(instant), date(2024, 6, 1));
    }

    #[test]
    fn month_parsing_rejects_out_of_range_values() {
        assert_eq!("2024-05".parse::<CivilMonth>(), CivilMonth::new(2024, 5));
        assert!(matches!("2024-13".parse::<CivilMonth>(), Err(DomainError::InvalidMonth { .. })));
        assert!("may".parse::<CivilMonth>().is_err());
        assert_eq!(CivilMonth::new(2024, 5).expect("valid").to_string(), "2024-05");
    }

    #[test]
    fn fixed_clock_reports_civil_today() {
        let clock = FixedClock::new(utc("2024-05-13T16:00:00Z"));
        assert_eq!(clock.today(), date(2024, 5, 14));
        assert_eq!(clock.today().weekday(), Weekday::Tue);
    }
}
