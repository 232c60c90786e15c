//! Map-backed repositories for tests and local runs.

use std::collections::HashMap;

use chrono::NaiveDate;
use tokio::sync::RwLock;

use crate::clock::InstantRange;
use crate::domain::attendance::AttendancePlan;
use crate::domain::shift::{ShiftClosure, ShiftId, ShiftRecord};
use crate::domain::user::{User, UserId};
use crate::repository::{
    AttendancePlanRepository, RepositoryError, ShiftRepository, UserRepository,
};

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.get(&id.0).cloned())
    }

    async fn save(&self, user: User) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        match users.get_mut(&user.id.0) {
            Some(existing) => {
                let created_at = existing.created_at;
                *existing = User { created_at, ..user };
            }
            None => {
                users.insert(user.id.0.clone(), user);
            }
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let users = self.users.read().await;
        let mut listed: Vec<User> = users.values().cloned().collect();
        listed.sort_by(|a, b| a.display_name.cmp(&b.display_name).then_with(|| a.id.cmp(&b.id)));
        Ok(listed)
    }
}

#[derive(Default)]
pub struct InMemoryShiftRepository {
    shifts: RwLock<HashMap<String, ShiftRecord>>,
}

#[async_trait::async_trait]
impl ShiftRepository for InMemoryShiftRepository {
    async fn insert(&self, record: ShiftRecord) -> Result<(), RepositoryError> {
        let mut shifts = self.shifts.write().await;
        shifts.insert(record.id.0.clone(), record);
        Ok(())
    }

    async fn find_by_id(&self, id: &ShiftId) -> Result<Option<ShiftRecord>, RepositoryError> {
        let shifts = self.shifts.read().await;
        Ok(shifts.get(&id.0).cloned())
    }

    async fn latest_open_started_within(
        &self,
        user_id: &UserId,
        range: &InstantRange,
    ) -> Result<Option<ShiftRecord>, RepositoryError> {
        let shifts = self.shifts.read().await;
        Ok(shifts
            .values()
            .filter(|record| {
                record.user_id == *user_id && record.is_open() && range.contains(record.start_at)
            })
            .max_by_key(|record| record.start_at)
            .cloned())
    }

    async fn close_if_open(
        &self,
        id: &ShiftId,
        closure: &ShiftClosure,
    ) -> Result<Option<ShiftRecord>, RepositoryError> {
        let mut shifts = self.shifts.write().await;
        match shifts.get_mut(&id.0) {
            Some(record) if record.is_open() => {
                closure.apply(record);
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_started_within(
        &self,
        user_id: &UserId,
        range: &InstantRange,
    ) -> Result<Vec<ShiftRecord>, RepositoryError> {
        let shifts = self.shifts.read().await;
        let mut listed: Vec<ShiftRecord> = shifts
            .values()
            .filter(|record| record.user_id == *user_id && range.contains(record.start_at))
            .cloned()
            .collect();
        listed.sort_by_key(|record| record.start_at);
        Ok(listed)
    }

    async fn delete(&self, id: &ShiftId) -> Result<bool, RepositoryError> {
        let mut shifts = self.shifts.write().await;
        Ok(shifts.remove(&id.0).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryAttendancePlanRepository {
    plans: RwLock<HashMap<(String, NaiveDate), AttendancePlan>>,
}

#[async_trait::async_trait]
impl AttendancePlanRepository for InMemoryAttendancePlanRepository {
    async fn upsert(&self, plan: AttendancePlan) -> Result<AttendancePlan, RepositoryError> {
        let mut plans = self.plans.write().await;
        plans.insert((plan.user_id.0.clone(), plan.date), plan.clone());
        Ok(plan)
    }

    async fn find(
        &self,
        user_id: &UserId,
        date: NaiveDate,
    ) -> Result<Option<AttendancePlan>, RepositoryError> {
        let plans = self.plans.read().await;
        Ok(plans.get(&(user_id.0.clone(), date)).cloned())
    }

    async fn list_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendancePlan>, RepositoryError> {
        let plans = self.plans.read().await;
        let mut listed: Vec<AttendancePlan> = plans
            .values()
            .filter(|plan| from <= plan.date && plan.date <= to)
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.user_id.cmp(&b.user_id)));
        Ok(listed)
    }
}
