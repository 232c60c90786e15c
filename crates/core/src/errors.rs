use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::repository::RepositoryError;

/// Failures the user can correct by re-submitting the form.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("no open shift exists for the civil day")]
    NoOpenShift,
    #[error("end instant {end} must be after start instant {start}")]
    InvalidTimeOrder { start: DateTime<Utc>, end: DateTime<Utc> },
    #[error("a note is required to close a shift")]
    MissingNote,
    #[error("break time exceeds the shift duration (worked minutes would be {worked_minutes})")]
    NegativeWorkedTime { worked_minutes: i64 },
    #[error("invalid planned start time `{0}` (expected HH:MM)")]
    InvalidPlannedStart(String),
    #[error("invalid civil month {year}-{month}")]
    InvalidMonth { year: i32, month: u32 },
    #[error("invalid value for `{field}`: {reason}")]
    InvalidProfileField { field: String, reason: String },
    #[error("overview window of {days} days is outside 1..={max}")]
    InvalidOverviewWindow { days: u32, max: u32 },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, Self::Domain(_))
    }

    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain(error) => Some(error),
            _ => None,
        }
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        Self::PersistenceUnavailable(value.to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) => Self::BadRequest {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::PersistenceUnavailable(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError, InterfaceError};
    use crate::repository::RepositoryError;

    #[test]
    fn domain_error_maps_to_bad_request_interface_error() {
        let interface = ApplicationError::from(DomainError::MissingNote).into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn repository_failure_becomes_persistence_unavailable() {
        let error = ApplicationError::from(RepositoryError::Unavailable("pool timed out".into()));

        assert!(matches!(error, ApplicationError::PersistenceUnavailable(_)));
        assert!(!error.is_user_correctable());

        let interface = error.into_interface("req-2");
        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.correlation_id(), "req-2");
    }

    #[test]
    fn user_correctable_kinds_are_domain_errors() {
        for error in [
            DomainError::NoOpenShift,
            DomainError::MissingNote,
            DomainError::NegativeWorkedTime { worked_minutes: -15 },
        ] {
            assert!(ApplicationError::from(error).is_user_correctable());
        }
    }

    #[test]
    fn negative_worked_time_reports_overrun() {
        let message = DomainError::NegativeWorkedTime { worked_minutes: -15 }.to_string();
        assert!(message.contains("would be -15"));
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface =
            ApplicationError::Configuration("invalid bot token".to_owned()).into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
