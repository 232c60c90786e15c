//! Shift lifecycle: start, close, peek, delete and monthly totals.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::accounting::MonthlyTotal;
use crate::clock::{civil_date_of, civil_day_bounds, civil_month_bounds, CivilMonth, Clock};
use crate::context::RequestContext;
use crate::domain::shift::{ShiftClosure, ShiftId, ShiftRecord};
use crate::domain::user::UserId;
use crate::errors::{ApplicationError, DomainError};
use crate::repository::ShiftRepository;

#[derive(Clone)]
pub struct ShiftAccountingEngine {
    shifts: Arc<dyn ShiftRepository>,
    clock: Arc<dyn Clock>,
}

/// Fields submitted by the end-of-shift form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseShiftRequest {
    pub end_at: DateTime<Utc>,
    pub break_minutes: Option<u32>,
    pub note: Option<String>,
}

impl ShiftAccountingEngine {
    pub fn new(shifts: Arc<dyn ShiftRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { shifts, clock }
    }

    /// Records a new open shift. Several open shifts per day are allowed.
    pub async fn start_shift(
        &self,
        user_id: &UserId,
        start_at: DateTime<Utc>,
        note: Option<String>,
        ctx: &RequestContext,
    ) -> Result<ShiftRecord, ApplicationError> {
        let record = ShiftRecord::open(user_id.clone(), start_at, note, self.clock.now());
        self.shifts.insert(record.clone()).await?;

        info!(
            event_name = "shift.started",
            correlation_id = %ctx.correlation_id,
            user_id = %user_id.as_str(),
            shift_id = %record.id.as_str(),
            civil_date = %record.civil_date(),
            "shift started"
        );
        Ok(record)
    }

    /// Closes the open shift with the latest start on the civil day of `end_at`.
    pub async fn close_shift(
        &self,
        user_id: &UserId,
        request: CloseShiftRequest,
        ctx: &RequestContext,
    ) -> Result<ShiftRecord, ApplicationError> {
        let note = request
            .note
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or(DomainError::MissingNote)?
            .to_owned();

        let day = civil_day_bounds(civil_date_of(request.end_at));
        let open = self
            .shifts
            .latest_open_started_within(user_id, &day)
            .await?
            .ok_or(DomainError::NoOpenShift)?;

        if request.end_at <= open.start_at {
            return Err(DomainError::InvalidTimeOrder { start: open.start_at, end: request.end_at }
                .into());
        }

        let break_minutes = request.break_minutes.unwrap_or(0);
        let duration_minutes = (request.end_at - open.start_at).num_minutes();
        let worked_minutes = duration_minutes - i64::from(break_minutes);
        if worked_minutes < 0 {
            return Err(DomainError::NegativeWorkedTime { worked_minutes }.into());
        }

        let closure = ShiftClosure {
            end_at: request.end_at,
            break_minutes,
            note,
            closed_at: self.clock.now(),
        };
        let Some(closed) = self.shifts.close_if_open(&open.id, &closure).await? else {
            warn!(
                event_name = "shift.close_conflict",
                correlation_id = %ctx.correlation_id,
                user_id = %user_id.as_str(),
                shift_id = %open.id.as_str(),
                "shift was closed concurrently"
            );
            return Err(DomainError::NoOpenShift.into());
        };

        info!(
            event_name = "shift.closed",
            correlation_id = %ctx.correlation_id,
            user_id = %user_id.as_str(),
            shift_id = %closed.id.as_str(),
            worked_minutes,
            "shift closed"
        );
        Ok(closed)
    }

    /// The open shift a close submitted at `at` would target, if any.
    pub async fn open_shift_at(
        &self,
        user_id: &UserId,
        at: DateTime<Utc>,
        ctx: &RequestContext,
    ) -> Result<Option<ShiftRecord>, ApplicationError> {
        let civil_date = civil_date_of(at);
        let open =
            self.shifts.latest_open_started_within(user_id, &civil_day_bounds(civil_date)).await?;

        debug!(
            event_name = "shift.open_lookup",
            correlation_id = %ctx.correlation_id,
            user_id = %user_id.as_str(),
            civil_date = %civil_date,
            found = open.is_some(),
            "open shift lookup"
        );
        Ok(open)
    }

    pub async fn has_open_shift_at(
        &self,
        user_id: &UserId,
        at: DateTime<Utc>,
        ctx: &RequestContext,
    ) -> Result<bool, ApplicationError> {
        Ok(self.open_shift_at(user_id, at, ctx).await?.is_some())
    }

    pub async fn open_shift_today(
        &self,
        user_id: &UserId,
        ctx: &RequestContext,
    ) -> Result<Option<ShiftRecord>, ApplicationError> {
        self.open_shift_at(user_id, self.clock.now(), ctx).await
    }

    pub async fn has_open_shift_today(
        &self,
        user_id: &UserId,
        ctx: &RequestContext,
    ) -> Result<bool, ApplicationError> {
        self.has_open_shift_at(user_id, self.clock.now(), ctx).await
    }

    pub async fn monthly_total(
        &self,
        user_id: &UserId,
        month: CivilMonth,
        ctx: &RequestContext,
    ) -> Result<MonthlyTotal, ApplicationError> {
        let records = self.shifts.list_started_within(user_id, &civil_month_bounds(month)).await?;
        let total = MonthlyTotal::from_records(month, records);

        debug!(
            event_name = "shift.monthly_total",
            correlation_id = %ctx.correlation_id,
            user_id = %user_id.as_str(),
            month = %month,
            entries = total.entries.len(),
            total_hours = %total.total_hours,
            "monthly total computed"
        );
        Ok(total)
    }

    pub async fn find_shift(&self, id: &ShiftId) -> Result<Option<ShiftRecord>, ApplicationError> {
        Ok(self.shifts.find_by_id(id).await?)
    }

    /// Removes a shift. Deleting an id that no longer exists succeeds.
    pub async fn delete_shift(
        &self,
        id: &ShiftId,
        ctx: &RequestContext,
    ) -> Result<(), ApplicationError> {
        let removed = self.shifts.delete(id).await?;
        info!(
            event_name = "shift.deleted",
            correlation_id = %ctx.correlation_id,
            shift_id = %id.as_str(),
            removed,
            "shift deleted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;
    use serde_json::Value;
    use tracing_subscriber::fmt::MakeWriter;

    use super::{CloseShiftRequest, ShiftAccountingEngine};
    use crate::clock::{CivilMonth, FixedClock};
    use crate::context::RequestContext;
    use crate::domain::user::UserId;
    use crate::errors::{ApplicationError, DomainError};
    use crate::repository::memory::InMemoryShiftRepository;

    fn utc(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).expect("valid rfc3339").with_timezone(&Utc)
    }

    /// 2024-05-14 09:30 civil.
    fn engine() -> ShiftAccountingEngine {
        ShiftAccountingEngine::new(
            Arc::new(InMemoryShiftRepository::default()),
            Arc::new(FixedClock::new(utc("2024-05-14T00:30:00Z"))),
        )
    }

    fn close(end: &str, break_minutes: Option<u32>, note: &str) -> CloseShiftRequest {
        CloseShiftRequest {
            end_at: utc(end),
            break_minutes,
            note: Some(note.to_owned()),
        }
    }

    fn domain_error(result: Result<impl std::fmt::Debug, ApplicationError>) -> DomainError {
        match result {
            Err(ApplicationError::Domain(error)) => error,
            other => panic!("expected a domain error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn shift_started_after_civil_midnight_is_open_today() {
        let engine = engine();
        let ctx = RequestContext::new("req-open");
        let user = UserId("U1".to_owned());

        // 01:00 civil on the 14th, still the 13th in UTC.
        engine.start_shift(&user, utc("2024-05-13T16:00:00Z"), None, &ctx).await.expect("start");

        assert!(engine.has_open_shift_today(&user, &ctx).await.expect("peek"));
        assert!(!engine
            .has_open_shift_at(&user, utc("2024-05-13T14:00:00Z"), &ctx)
            .await
            .expect("peek"));
    }

    #[tokio::test]
    async fn close_validates_note_order_and_break() {
        let engine = engine();
        let ctx = RequestContext::default();
        let user = UserId("U1".to_owned());

        assert_eq!(
            domain_error(engine.close_shift(&user, close("2024-05-14T08:00:00Z", None, "x"), &ctx).await),
            DomainError::NoOpenShift
        );

        engine.start_shift(&user, utc("2024-05-14T00:00:00Z"), None, &ctx).await.expect("start");
        assert_eq!(
            domain_error(engine.close_shift(&user, close("2024-05-14T08:00:00Z", None, "  "), &ctx).await),
            DomainError::MissingNote
        );
        assert!(matches!(
            domain_error(engine.close_shift(&user, close("2024-05-14T00:00:00Z", None, "x"), &ctx).await),
            DomainError::InvalidTimeOrder { .. }
        ));
        assert_eq!(
            domain_error(
                engine.close_shift(&user, close("2024-05-14T01:00:00Z", Some(90), "x"), &ctx).await
            ),
            DomainError::NegativeWorkedTime { worked_minutes: -30 }
        );

        let closed = engine
            .close_shift(&user, close("2024-05-14T08:00:00Z", Some(60), " review "), &ctx)
            .await
            .expect("close");
        assert_eq!(closed.note.as_deref(), Some("review"));
        assert_eq!(closed.break_minutes, Some(60));
    }

    #[tokio::test]
    async fn monthly_total_and_delete() {
        let engine = engine();
        let ctx = RequestContext::new("req-report");
        let user = UserId("U1".to_owned());
        let may = CivilMonth::new(2024, 5).expect("month");

        let started =
            engine.start_shift(&user, utc("2024-05-14T00:00:00Z"), None, &ctx).await.expect("start");
        engine
            .close_shift(&user, close("2024-05-14T08:00:00Z", Some(60), "stock"), &ctx)
            .await
            .expect("close");

        let total = engine.monthly_total(&user, may, &ctx).await.expect("total");
        assert_eq!(total.entries.len(), 1);
        assert_eq!(total.total_hours, Decimal::new(7, 0));

        engine.delete_shift(&started.id, &ctx).await.expect("delete");
        engine.delete_shift(&started.id, &ctx).await.expect("repeat delete");
        assert!(engine.find_shift(&started.id).await.expect("find").is_none());
        assert!(engine.monthly_total(&user, may, &ctx).await.expect("total").entries.is_empty());
    }

    /// Collects formatted log lines for assertions.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn events(&self) -> Vec<Value> {
            let bytes = self.0.lock().expect("log buffer").clone();
            String::from_utf8(bytes)
                .expect("utf8 logs")
                .lines()
                .map(|line| serde_json::from_str(line).expect("json log line"))
                .collect()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn every_engine_event_carries_the_request_correlation_id() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(logs.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let engine = engine();
        let ctx = RequestContext::new("req-trace");
        let user = UserId("U1".to_owned());
        let started =
            engine.start_shift(&user, utc("2024-05-14T00:00:00Z"), None, &ctx).await.expect("start");
        engine.open_shift_today(&user, &ctx).await.expect("peek");
        engine
            .close_shift(&user, close("2024-05-14T08:00:00Z", None, "trace"), &ctx)
            .await
            .expect("close");
        engine.close_shift(&user, close("2024-05-14T09:00:00Z", None, "again"), &ctx).await.ok();
        let may = CivilMonth::new(2024, 5).expect("month");
        engine.monthly_total(&user, may, &ctx).await.expect("total");
        engine.delete_shift(&started.id, &ctx).await.expect("delete");

        let events = logs.events();
        for name in [
            "shift.started",
            "shift.open_lookup",
            "shift.closed",
            "shift.monthly_total",
            "shift.deleted",
        ] {
            let event = events
                .iter()
                .find(|event| event["fields"]["event_name"] == name)
                .unwrap_or_else(|| panic!("missing {name} in {events:?}"));
            assert_eq!(event["fields"]["correlation_id"], "req-trace", "{name}");
        }
        let mut shift_events = events.iter().filter(|event| {
            event["fields"]["event_name"].as_str().is_some_and(|name| name.starts_with("shift."))
        });
        assert!(shift_events.all(|event| event["fields"]["correlation_id"] == "req-trace"));
    }
}
