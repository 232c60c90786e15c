//! Per-date attendance matrix for the team's office days.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::Serialize;
use tracing::debug;

use crate::clock::civil_date_of;
use crate::context::RequestContext;
use crate::domain::attendance::{AttendancePlan, AttendanceStatus};
use crate::domain::user::{User, UserId};
use crate::errors::{ApplicationError, DomainError};
use crate::repository::AttendancePlanRepository;

pub const OVERVIEW_WEEKDAYS: [Weekday; 2] = [Weekday::Tue, Weekday::Fri];
pub const DEFAULT_WINDOW_DAYS: u32 = 30;
/// Longest window an overview may span.
pub const MAX_WINDOW_DAYS: u32 = 366;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OverviewEntry {
    pub user_id: UserId,
    pub display_name: String,
    pub status: AttendanceStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OverviewDay {
    pub date: NaiveDate,
    pub entries: Vec<OverviewEntry>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceOverview {
    pub days: Vec<OverviewDay>,
}

impl AttendanceOverview {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Accepts `1..=MAX_WINDOW_DAYS`.
pub fn validate_window(window_days: u32) -> Result<u32, DomainError> {
    if window_days == 0 || window_days > MAX_WINDOW_DAYS {
        return Err(DomainError::InvalidOverviewWindow { days: window_days, max: MAX_WINDOW_DAYS });
    }
    Ok(window_days)
}

/// Overview weekdays in `anchor..=anchor + window_days`, the window cut to
/// [`MAX_WINDOW_DAYS`].
pub fn overview_dates(anchor: NaiveDate, window_days: u32) -> Vec<NaiveDate> {
    (0..=i64::from(window_days.min(MAX_WINDOW_DAYS)))
        .filter_map(|offset| anchor.checked_add_signed(Duration::days(offset)))
        .filter(|date| OVERVIEW_WEEKDAYS.contains(&date.weekday()))
        .collect()
}

/// Joins `users × dates` with the stored plans. Missing plans are `Unreported`.
pub fn assemble_overview(
    users: &[User],
    dates: &[NaiveDate],
    plans: Vec<AttendancePlan>,
) -> AttendanceOverview {
    let by_key: HashMap<(UserId, NaiveDate), AttendancePlan> =
        plans.into_iter().map(|plan| ((plan.user_id.clone(), plan.date), plan)).collect();

    let days = dates
        .iter()
        .map(|date| OverviewDay {
            date: *date,
            entries: users
                .iter()
                .map(|user| OverviewEntry {
                    user_id: user.id.clone(),
                    display_name: user.display_name.clone(),
                    status: by_key
                        .get(&(user.id.clone(), *date))
                        .map(AttendancePlan::status)
                        .unwrap_or(AttendanceStatus::Unreported),
                })
                .collect(),
        })
        .collect();

    AttendanceOverview { days }
}

#[derive(Clone)]
pub struct OverviewAggregator {
    plans: Arc<dyn AttendancePlanRepository>,
}

impl OverviewAggregator {
    pub fn new(plans: Arc<dyn AttendancePlanRepository>) -> Self {
        Self { plans }
    }

    pub async fn build_overview(
        &self,
        users: &[User],
        anchor: DateTime<Utc>,
        window_days: u32,
        ctx: &RequestContext,
    ) -> Result<AttendanceOverview, ApplicationError> {
        let window_days = validate_window(window_days)?;
        let dates = overview_dates(civil_date_of(anchor), window_days);
        let (Some(first), Some(last)) = (dates.first(), dates.last()) else {
            return Ok(AttendanceOverview::default());
        };

        let plans = self.plans.list_between(*first, *last).await?;
        debug!(
            event_name = "attendance.overview_built",
            correlation_id = %ctx.correlation_id,
            window_days,
            dates = dates.len(),
            plans = plans.len(),
            users = users.len(),
            "attendance overview built"
        );
        Ok(assemble_overview(users, &dates, plans))
    }
}
