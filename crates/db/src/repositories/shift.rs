use chrono::Datelike;
use sqlx::Row;

use kintai_core::clock::InstantRange;
use kintai_core::domain::shift::{ShiftClosure, ShiftId, ShiftRecord};
use kintai_core::domain::user::UserId;
use kintai_core::repository::{RepositoryError, ShiftRepository};

use super::{db_error, decode_error, instant_to_text, text_to_instant};
use crate::DbPool;

const SHIFT_COLUMNS: &str =
    "id, user_id, start_at, end_at, break_minutes, note, created_at, updated_at";

pub struct SqlShiftRepository {
    pool: DbPool,
}

impl SqlShiftRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_shift(row: &sqlx::sqlite::SqliteRow) -> Result<ShiftRecord, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let user_id: String = row.try_get("user_id").map_err(decode_error)?;
    let start_at: String = row.try_get("start_at").map_err(decode_error)?;
    let end_at: Option<String> = row.try_get("end_at").map_err(decode_error)?;
    let break_minutes: Option<i64> = row.try_get("break_minutes").map_err(decode_error)?;
    let note: Option<String> = row.try_get("note").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    let break_minutes = break_minutes
        .map(|minutes| u32::try_from(minutes).map_err(decode_error))
        .transpose()?;

    Ok(ShiftRecord {
        id: ShiftId(id),
        user_id: UserId(user_id),
        start_at: text_to_instant(&start_at)?,
        end_at: end_at.as_deref().map(text_to_instant).transpose()?,
        break_minutes,
        note,
        created_at: text_to_instant(&created_at)?,
        updated_at: text_to_instant(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl ShiftRepository for SqlShiftRepository {
    async fn insert(&self, record: ShiftRecord) -> Result<(), RepositoryError> {
        let civil_date = record.civil_date();

        sqlx::query(
            "INSERT INTO shifts (id, user_id, start_at, end_at, break_minutes, note,
                                 civil_year, civil_month, civil_day, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id.0)
        .bind(&record.user_id.0)
        .bind(instant_to_text(record.start_at))
        .bind(record.end_at.map(instant_to_text))
        .bind(record.break_minutes.map(i64::from))
        .bind(&record.note)
        .bind(civil_date.year())
        .bind(civil_date.month())
        .bind(civil_date.day())
        .bind(instant_to_text(record.created_at))
        .bind(instant_to_text(record.updated_at))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &ShiftId) -> Result<Option<ShiftRecord>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.as_ref().map(row_to_shift).transpose()
    }

    async fn latest_open_started_within(
        &self,
        user_id: &UserId,
        range: &InstantRange,
    ) -> Result<Option<ShiftRecord>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts
             WHERE user_id = ? AND end_at IS NULL AND start_at >= ? AND start_at < ?
             ORDER BY start_at DESC
             LIMIT 1"
        ))
        .bind(&user_id.0)
        .bind(instant_to_text(range.start))
        .bind(instant_to_text(range.end))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(row_to_shift).transpose()
    }

    async fn close_if_open(
        &self,
        id: &ShiftId,
        closure: &ShiftClosure,
    ) -> Result<Option<ShiftRecord>, RepositoryError> {
        let row = sqlx::query(&format!(
            "UPDATE shifts
             SET end_at = ?, break_minutes = ?, note = ?, updated_at = ?
             WHERE id = ? AND end_at IS NULL
             RETURNING {SHIFT_COLUMNS}"
        ))
        .bind(instant_to_text(closure.end_at))
        .bind(i64::from(closure.break_minutes))
        .bind(&closure.note)
        .bind(instant_to_text(closure.closed_at))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(row_to_shift).transpose()
    }

    async fn list_started_within(
        &self,
        user_id: &UserId,
        range: &InstantRange,
    ) -> Result<Vec<ShiftRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts
             WHERE user_id = ? AND start_at >= ? AND start_at < ?
             ORDER BY start_at ASC"
        ))
        .bind(&user_id.0)
        .bind(instant_to_text(range.start))
        .bind(instant_to_text(range.end))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(row_to_shift).collect()
    }

    async fn delete(&self, id: &ShiftId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shifts WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }
}
