use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::clock::Clock;
use crate::context::RequestContext;
use crate::domain::attendance::{AttendancePlan, PlannedStart};
use crate::domain::user::UserId;
use crate::errors::ApplicationError;
use crate::repository::AttendancePlanRepository;

/// Records attend/skip decisions per `(user, civil date)`. Last write wins.
#[derive(Clone)]
pub struct AttendanceScheduler {
    plans: Arc<dyn AttendancePlanRepository>,
    clock: Arc<dyn Clock>,
}

impl AttendanceScheduler {
    pub fn new(plans: Arc<dyn AttendancePlanRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { plans, clock }
    }

    /// A blank `planned_start` means "no planned time". The value is ignored,
    /// and never validated, when the user will not attend.
    pub async fn set_plan(
        &self,
        user_id: &UserId,
        date: NaiveDate,
        will_attend: bool,
        planned_start: Option<&str>,
        ctx: &RequestContext,
    ) -> Result<AttendancePlan, ApplicationError> {
        let planned_start = match planned_start.map(str::trim) {
            Some(raw) if will_attend && !raw.is_empty() => Some(PlannedStart::parse(raw)?),
            _ => None,
        };

        let plan = AttendancePlan::new(
            user_id.clone(),
            date,
            will_attend,
            planned_start,
            self.clock.now(),
        );
        let stored = self.plans.upsert(plan).await?;

        info!(
            event_name = "plan.upserted",
            correlation_id = %ctx.correlation_id,
            user_id = %user_id.as_str(),
            civil_date = %date,
            will_attend,
            "attendance plan stored"
        );
        Ok(stored)
    }

    pub async fn plan_for(
        &self,
        user_id: &UserId,
        date: NaiveDate,
    ) -> Result<Option<AttendancePlan>, ApplicationError> {
        Ok(self.plans.find(user_id, date).await?)
    }
}
