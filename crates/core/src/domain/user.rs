use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Stable messaging-platform account key (the Slack user id).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub contact: Option<String>,
    pub work_type: Option<String>,
    pub transportation_cost: Option<Decimal>,
    pub hourly_wage: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: UserId, display_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        let display_name = display_name.into();
        let display_name =
            if display_name.trim().is_empty() { id.0.clone() } else { display_name.trim().to_owned() };
        Self {
            id,
            display_name,
            contact: None,
            work_type: None,
            transportation_cost: None,
            hourly_wage: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Replacement values for the editable profile fields. `None` clears a field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub contact: Option<String>,
    pub work_type: Option<String>,
    pub transportation_cost: Option<Decimal>,
    pub hourly_wage: Option<Decimal>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<(), DomainError> {
        for (field, value) in
            [("transportation_cost", self.transportation_cost), ("hourly_wage", self.hourly_wage)]
        {
            if value.is_some_and(|amount| amount < Decimal::ZERO) {
                return Err(DomainError::InvalidProfileField {
                    field: field.to_owned(),
                    reason: "must not be negative".to_owned(),
                });
            }
        }
        Ok(())
    }

    pub fn apply(self, user: &mut User, now: DateTime<Utc>) {
        user.contact = non_blank(self.contact);
        user.work_type = non_blank(self.work_type);
        user.transportation_cost = self.transportation_cost;
        user.hourly_wage = self.hourly_wage;
        user.updated_at = now;
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|text| text.trim().to_owned()).filter(|text| !text.is_empty())
}
