use chrono::{DateTime, SecondsFormat, Utc};

use kintai_core::repository::RepositoryError;

pub mod attendance;
pub mod shift;
pub mod user;

pub use attendance::SqlAttendancePlanRepository;
pub use shift::SqlShiftRepository;
pub use user::SqlUserRepository;

/// Pool exhaustion, lock timeouts and I/O all mean the store cannot answer right now.
pub(crate) fn db_error(error: sqlx::Error) -> RepositoryError {
    match error {
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. } => RepositoryError::Decode(error.to_string()),
        other => RepositoryError::Unavailable(other.to_string()),
    }
}

pub(crate) fn decode_error(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

/// Fixed-width UTC text so lexical order in SQL equals chronological order.
pub(crate) fn instant_to_text(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn text_to_instant(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)).map_err(decode_error)
}
