//! Worked-time arithmetic for shift records.
//!
//! A closed shift that runs past the end of the month being totalled only
//! contributes its in-month part. Its break is prorated by the in-month share of
//! the shift's duration, which models break time as spread uniformly over the
//! shift rather than taken at a measured moment.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::clock::{civil_month_bounds, CivilMonth, InstantRange};
use crate::domain::shift::ShiftRecord;

const SECONDS_PER_MINUTE: i64 = 60;
const MINUTES_PER_HOUR: i64 = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkedTime {
    /// The shift has no end yet; it is reported but never summed.
    Open,
    Closed { hours: Decimal },
}

impl WorkedTime {
    pub fn hours(&self) -> Option<Decimal> {
        match self {
            Self::Open => None,
            Self::Closed { hours } => Some(*hours),
        }
    }
}

/// Net worked hours of `record` that fall inside `bounds`.
pub fn compute_worked_hours(record: &ShiftRecord, bounds: &InstantRange) -> WorkedTime {
    let Some(end) = record.end_at else {
        return WorkedTime::Open;
    };

    let total_secs = (end - record.start_at).num_seconds();
    let effective_start = record.start_at.max(bounds.start);
    let effective_end = end.min(bounds.end);
    let work_secs = (effective_end - effective_start).num_seconds();
    if total_secs <= 0 || work_secs <= 0 {
        return WorkedTime::Closed { hours: Decimal::ZERO };
    }

    let break_minutes = Decimal::from(record.break_minutes.unwrap_or(0));
    let crosses_boundary = effective_end < end || effective_start > record.start_at;
    let effective_break = if crosses_boundary {
        break_minutes * Decimal::from(work_secs) / Decimal::from(total_secs)
    } else {
        break_minutes
    };

    let work_minutes = Decimal::from(work_secs) / Decimal::from(SECONDS_PER_MINUTE);
    let worked_minutes = (work_minutes - effective_break).max(Decimal::ZERO);
    WorkedTime::Closed { hours: worked_minutes / Decimal::from(MINUTES_PER_HOUR) }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ShiftEntry {
    pub record: ShiftRecord,
    pub worked: WorkedTime,
}

/// Shifts started in one civil month and the sum of their closed hours.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MonthlyTotal {
    pub month: CivilMonth,
    pub entries: Vec<ShiftEntry>,
    pub total_hours: Decimal,
}

impl MonthlyTotal {
    pub fn from_records(month: CivilMonth, records: Vec<ShiftRecord>) -> Self {
        let bounds = civil_month_bounds(month);
        let entries: Vec<ShiftEntry> = records
            .into_iter()
            .map(|record| {
                let worked = compute_worked_hours(&record, &bounds);
                ShiftEntry { record, worked }
            })
            .collect();
        let total_hours = entries.iter().filter_map(|entry| entry.worked.hours()).sum();

        Self { month, entries, total_hours }
    }

    pub fn records(&self) -> impl Iterator<Item = &ShiftRecord> {
        self.entries.iter().map(|entry| &entry.record)
    }

    pub fn open_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.worked == WorkedTime::Open).count()
    }
}
