use std::sync::Arc;

use kintai_core::clock::{Clock, SystemClock};
use kintai_core::context::RequestContext;
use kintai_core::directory::UserDirectory;
use kintai_core::errors::ApplicationError;
use kintai_core::overview::{validate_window, OverviewAggregator};
use kintai_db::{SqlAttendancePlanRepository, SqlUserRepository};

use crate::commands::{load_config, open_database, runtime, to_data, CommandResult};

pub fn run(days: Option<u32>) -> CommandResult {
    let config = match load_config("overview") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let window_days = days.unwrap_or(config.attendance.overview_window_days);
    if let Err(error) = validate_window(window_days) {
        return CommandResult::failure("overview", "invalid_argument", error.to_string(), 6);
    }
    let runtime = match runtime("overview") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let directory = UserDirectory::new(Arc::new(SqlUserRepository::new(pool.clone())), clock.clone());
        let aggregator =
            OverviewAggregator::new(Arc::new(SqlAttendancePlanRepository::new(pool.clone())));

        let ctx = RequestContext::generate("cli-overview");
        let overview = async {
            let users = directory.list_users().await?;
            aggregator.build_overview(&users, clock.now(), window_days, &ctx).await
        }
        .await
        .map_err(|error| match error {
            ApplicationError::Domain(error) => ("invalid_argument", error.to_string(), 6u8),
            other => ("persistence", other.to_string(), 7u8),
        });
        pool.close().await;

        let overview = overview?;
        Ok((overview.days.len(), to_data(&overview)?))
    });

    match result {
        Ok((dates, data)) => CommandResult::success_with_data(
            "overview",
            format!("{dates} Tuesday/Friday dates in the next {window_days} days"),
            Some(data),
        ),
        Err(failure) => CommandResult::from_failure("overview", failure),
    }
}
