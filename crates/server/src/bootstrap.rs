use std::sync::Arc;

use kintai_core::clock::{Clock, SystemClock};
use kintai_core::config::{AppConfig, ConfigError};
use kintai_core::directory::UserDirectory;
use kintai_core::overview::OverviewAggregator;
use kintai_core::repository::{AttendancePlanRepository, ShiftRepository, UserRepository};
use kintai_core::scheduler::AttendanceScheduler;
use kintai_core::shift_engine::ShiftAccountingEngine;
use kintai_db::{
    connect_with_settings, migrations, DbPool, SqlAttendancePlanRepository, SqlShiftRepository,
    SqlUserRepository,
};
use kintai_slack::{
    CommandRouter, CommandServices, EventProcessor, SignatureVerifier, SlackApi, SlackApiError,
    SlackWebClient,
};
use thiserror::Error;
use tracing::info;

use crate::http::{BackgroundTasks, SlackState};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("slack client could not be built: {0}")]
    SlackClient(#[source] SlackApiError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    Ok(Application { config, db_pool, clock: Arc::new(SystemClock) })
}

impl Application {
    /// Engines over the SQLite repositories, sharing one clock.
    pub fn command_services(&self) -> CommandServices {
        let users: Arc<dyn UserRepository> = Arc::new(SqlUserRepository::new(self.db_pool.clone()));
        let shifts: Arc<dyn ShiftRepository> =
            Arc::new(SqlShiftRepository::new(self.db_pool.clone()));
        let plans: Arc<dyn AttendancePlanRepository> =
            Arc::new(SqlAttendancePlanRepository::new(self.db_pool.clone()));

        CommandServices {
            shifts: ShiftAccountingEngine::new(shifts, self.clock.clone()),
            scheduler: AttendanceScheduler::new(plans.clone(), self.clock.clone()),
            overview: OverviewAggregator::new(plans),
            directory: UserDirectory::new(users, self.clock.clone()),
            clock: self.clock.clone(),
        }
    }

    pub fn slack_client(&self) -> Result<Arc<dyn SlackApi>, BootstrapError> {
        let client = SlackWebClient::new(&self.config.slack).map_err(BootstrapError::SlackClient)?;
        Ok(Arc::new(client))
    }

    pub fn slack_state(&self, api: Arc<dyn SlackApi>, tasks: BackgroundTasks) -> SlackState {
        let router = CommandRouter::new(self.command_services())
            .with_overview_window(self.config.attendance.overview_window_days);
        SlackState {
            verifier: SignatureVerifier::new(self.config.slack.signing_secret.clone()),
            processor: EventProcessor::new(Arc::new(router), api),
            tasks,
            clock: self.clock.clone(),
        }
    }
}
