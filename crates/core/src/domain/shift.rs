use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::civil_date_of;
use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShiftId(pub String);

impl ShiftId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftState {
    Open,
    Closed,
}

/// One work shift. `end_at == None` means the shift is still open.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftRecord {
    pub id: ShiftId,
    pub user_id: UserId,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub break_minutes: Option<u32>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShiftRecord {
    pub fn open(
        user_id: UserId,
        start_at: DateTime<Utc>,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ShiftId::generate(),
            user_id,
            start_at,
            end_at: None,
            break_minutes: None,
            note: note.map(|text| text.trim().to_owned()).filter(|text| !text.is_empty()),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> ShiftState {
        if self.end_at.is_some() {
            ShiftState::Closed
        } else {
            ShiftState::Open
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == ShiftState::Open
    }

    /// Civil day the shift belongs to, derived from its start instant.
    pub fn civil_date(&self) -> NaiveDate {
        civil_date_of(self.start_at)
    }
}

/// Values written when an open shift is closed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShiftClosure {
    pub end_at: DateTime<Utc>,
    pub break_minutes: u32,
    pub note: String,
    pub closed_at: DateTime<Utc>,
}

impl ShiftClosure {
    pub fn apply(&self, record: &mut ShiftRecord) {
        record.end_at = Some(self.end_at);
        record.break_minutes = Some(self.break_minutes);
        record.note = Some(self.note.clone());
        record.updated_at = self.closed_at;
    }
}
