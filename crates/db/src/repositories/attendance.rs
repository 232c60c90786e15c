use chrono::NaiveDate;
use sqlx::Row;

use kintai_core::domain::attendance::{AttendancePlan, PlannedStart};
use kintai_core::domain::user::UserId;
use kintai_core::repository::{AttendancePlanRepository, RepositoryError};

use super::{db_error, decode_error, instant_to_text, text_to_instant};
use crate::DbPool;

const CIVIL_DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqlAttendancePlanRepository {
    pool: DbPool,
}

impl SqlAttendancePlanRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn date_to_text(date: NaiveDate) -> String {
    date.format(CIVIL_DATE_FORMAT).to_string()
}

fn row_to_plan(row: &sqlx::sqlite::SqliteRow) -> Result<AttendancePlan, RepositoryError> {
    let user_id: String = row.try_get("user_id").map_err(decode_error)?;
    let civil_date: String = row.try_get("civil_date").map_err(decode_error)?;
    let will_attend: bool = row.try_get("will_attend").map_err(decode_error)?;
    let planned_start: Option<String> = row.try_get("planned_start").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    let date =
        NaiveDate::parse_from_str(&civil_date, CIVIL_DATE_FORMAT).map_err(decode_error)?;
    let planned_start =
        planned_start.as_deref().map(PlannedStart::parse).transpose().map_err(decode_error)?;

    Ok(AttendancePlan {
        user_id: UserId(user_id),
        date,
        will_attend,
        planned_start,
        updated_at: text_to_instant(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl AttendancePlanRepository for SqlAttendancePlanRepository {
    async fn upsert(&self, plan: AttendancePlan) -> Result<AttendancePlan, RepositoryError> {
        sqlx::query(
            "INSERT INTO attendance_plans (user_id, civil_date, will_attend, planned_start, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(user_id, civil_date) DO UPDATE SET
                 will_attend = excluded.will_attend,
                 planned_start = excluded.planned_start,
                 updated_at = excluded.updated_at",
        )
        .bind(&plan.user_id.0)
        .bind(date_to_text(plan.date))
        .bind(plan.will_attend)
        .bind(plan.planned_start.map(|start| start.to_string()))
        .bind(instant_to_text(plan.updated_at))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(plan)
    }

    async fn find(
        &self,
        user_id: &UserId,
        date: NaiveDate,
    ) -> Result<Option<AttendancePlan>, RepositoryError> {
        let row = sqlx::query(
            "SELECT user_id, civil_date, will_attend, planned_start, updated_at
             FROM attendance_plans WHERE user_id = ? AND civil_date = ?",
        )
        .bind(&user_id.0)
        .bind(date_to_text(date))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(row_to_plan).transpose()
    }

    async fn list_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendancePlan>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT user_id, civil_date, will_attend, planned_start, updated_at
             FROM attendance_plans
             WHERE civil_date >= ? AND civil_date <= ?
             ORDER BY civil_date ASC, user_id ASC",
        )
        .bind(date_to_text(from))
        .bind(date_to_text(to))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(row_to_plan).collect()
    }
}
