pub mod accounting;
pub mod clock;
pub mod config;
pub mod context;
pub mod directory;
pub mod domain;
pub mod errors;
pub mod overview;
pub mod repository;
pub mod scheduler;
pub mod shift_engine;

pub use accounting::{compute_worked_hours, MonthlyTotal, ShiftEntry, WorkedTime};
pub use clock::{
    civil_date_of, civil_day_bounds, civil_instant, civil_month_bounds, CivilMonth, Clock,
    FixedClock, InstantRange, SystemClock,
};
pub use context::RequestContext;
pub use directory::UserDirectory;
pub use domain::attendance::{AttendancePlan, AttendanceStatus, PlannedStart};
pub use domain::shift::{ShiftClosure, ShiftId, ShiftRecord, ShiftState};
pub use domain::user::{ProfileUpdate, User, UserId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use overview::{AttendanceOverview, OverviewAggregator, OverviewDay, OverviewEntry};
pub use repository::{
    AttendancePlanRepository, RepositoryError, ShiftRepository, UserRepository,
};
pub use scheduler::AttendanceScheduler;
pub use shift_engine::{CloseShiftRequest, ShiftAccountingEngine};
