//! Persistence contracts consumed by the services.
//!
//! SQLite implementations live in `kintai-db`, map-backed ones in [`memory`].
//! Every call is expected to be bounded by the implementation's own timeout and
//! to report `Unavailable` when it expires.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::clock::InstantRange;
use crate::domain::attendance::AttendancePlan;
use crate::domain::shift::{ShiftClosure, ShiftId, ShiftRecord};
use crate::domain::user::{User, UserId};

pub mod memory;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    async fn save(&self, user: User) -> Result<(), RepositoryError>;
    /// All users ordered by display name, then id.
    async fn list(&self) -> Result<Vec<User>, RepositoryError>;
}

#[async_trait]
pub trait ShiftRepository: Send + Sync {
    async fn insert(&self, record: ShiftRecord) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &ShiftId) -> Result<Option<ShiftRecord>, RepositoryError>;

    /// The open shift of `user_id` with the latest start inside `range`.
    async fn latest_open_started_within(
        &self,
        user_id: &UserId,
        range: &InstantRange,
    ) -> Result<Option<ShiftRecord>, RepositoryError>;

    /// Closes `id` only if it is still open. `None` means no row was affected.
    async fn close_if_open(
        &self,
        id: &ShiftId,
        closure: &ShiftClosure,
    ) -> Result<Option<ShiftRecord>, RepositoryError>;

    /// Shifts of `user_id` whose start lies in `range`, ordered by start.
    async fn list_started_within(
        &self,
        user_id: &UserId,
        range: &InstantRange,
    ) -> Result<Vec<ShiftRecord>, RepositoryError>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: &ShiftId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait AttendancePlanRepository: Send + Sync {
    /// Insert or overwrite the plan keyed by `(user_id, date)`.
    async fn upsert(&self, plan: AttendancePlan) -> Result<AttendancePlan, RepositoryError>;

    async fn find(
        &self,
        user_id: &UserId,
        date: NaiveDate,
    ) -> Result<Option<AttendancePlan>, RepositoryError>;

    /// Plans of every user for dates in `from..=to`.
    async fn list_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendancePlan>, RepositoryError>;
}
