use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::Row;

use kintai_core::domain::user::{User, UserId};
use kintai_core::repository::{RepositoryError, UserRepository};

use super::{db_error, decode_error, instant_to_text, text_to_instant};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_amount(raw: Option<String>) -> Result<Option<Decimal>, RepositoryError> {
    raw.map(|value| Decimal::from_str(&value).map_err(decode_error)).transpose()
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let display_name: String = row.try_get("display_name").map_err(decode_error)?;
    let contact: Option<String> = row.try_get("contact").map_err(decode_error)?;
    let work_type: Option<String> = row.try_get("work_type").map_err(decode_error)?;
    let transportation_cost: Option<String> =
        row.try_get("transportation_cost").map_err(decode_error)?;
    let hourly_wage: Option<String> = row.try_get("hourly_wage").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    Ok(User {
        id: UserId(id),
        display_name,
        contact,
        work_type,
        transportation_cost: parse_amount(transportation_cost)?,
        hourly_wage: parse_amount(hourly_wage)?,
        created_at: text_to_instant(&created_at)?,
        updated_at: text_to_instant(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, display_name, contact, work_type, transportation_cost, hourly_wage,
                    created_at, updated_at
             FROM users WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn save(&self, user: User) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO users (id, display_name, contact, work_type, transportation_cost,
                                hourly_wage, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 display_name = excluded.display_name,
                 contact = excluded.contact,
                 work_type = excluded.work_type,
                 transportation_cost = excluded.transportation_cost,
                 hourly_wage = excluded.hourly_wage,
                 updated_at = excluded.updated_at",
        )
        .bind(&user.id.0)
        .bind(&user.display_name)
        .bind(&user.contact)
        .bind(&user.work_type)
        .bind(user.transportation_cost.map(|amount| amount.to_string()))
        .bind(user.hourly_wage.map(|amount| amount.to_string()))
        .bind(instant_to_text(user.created_at))
        .bind(instant_to_text(user.updated_at))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, display_name, contact, work_type, transportation_cost, hourly_wage,
                    created_at, updated_at
             FROM users ORDER BY display_name ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(row_to_user).collect()
    }
}
