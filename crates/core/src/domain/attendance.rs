use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;
use crate::errors::DomainError;

/// Planned start time-of-day, `HH:MM` on the civil clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlannedStart(NaiveTime);

impl PlannedStart {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        NaiveTime::parse_from_str(raw.trim(), "%H:%M")
            .map(Self)
            .map_err(|_| DomainError::InvalidPlannedStart(raw.to_owned()))
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }
}

impl fmt::Display for PlannedStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl TryFrom<String> for PlannedStart {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PlannedStart> for String {
    fn from(value: PlannedStart) -> Self {
        value.to_string()
    }
}

/// A user's declared intent for one civil date. Unique per `(user, date)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendancePlan {
    pub user_id: UserId,
    pub date: NaiveDate,
    pub will_attend: bool,
    pub planned_start: Option<PlannedStart>,
    pub updated_at: DateTime<Utc>,
}

impl AttendancePlan {
    /// A planned start is only kept when the user will attend.
    pub fn new(
        user_id: UserId,
        date: NaiveDate,
        will_attend: bool,
        planned_start: Option<PlannedStart>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            date,
            will_attend,
            planned_start: planned_start.filter(|_| will_attend),
            updated_at: now,
        }
    }

    pub fn status(&self) -> AttendanceStatus {
        if self.will_attend {
            AttendanceStatus::Attending { planned_start: self.planned_start }
        } else {
            AttendanceStatus::Off
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttendanceStatus {
    Attending { planned_start: Option<PlannedStart> },
    Off,
    Unreported,
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::{AttendancePlan, AttendanceStatus, PlannedStart};
    use crate::domain::user::UserId;
    use crate::errors::DomainError;

    #[test]
    fn planned_start_parses_hh_mm() {
        let start = PlannedStart::parse("09:30").expect("valid time");
        assert_eq!(start.to_string(), "09:30");
        assert!(matches!(PlannedStart::parse("9時"), Err(DomainError::InvalidPlannedStart(_))));
        assert!(PlannedStart::parse("24:00").is_err());
    }

    #[test]
    fn off_plan_drops_planned_start() {
        let plan = AttendancePlan::new(
            UserId("U1".to_string()),
            NaiveDate::from_ymd_opt(2024, 5, 14).expect("date"),
            false,
            Some(PlannedStart::parse("09:00").expect("time")),
            Utc::now(),
        );

        assert_eq!(plan.planned_start, None);
        assert_eq!(plan.status(), AttendanceStatus::Off);
    }
}
