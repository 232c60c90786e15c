use std::sync::Arc;

use kintai_core::clock::{CivilMonth, Clock, SystemClock};
use kintai_core::context::RequestContext;
use kintai_core::domain::user::UserId;
use kintai_core::shift_engine::ShiftAccountingEngine;
use kintai_db::SqlShiftRepository;
use serde_json::json;

use crate::commands::{load_config, open_database, runtime, to_data, CommandResult};

/// MonthlyTotal for one user as JSON. `month` defaults to the current civil month.
pub fn run(user: &str, month: Option<&str>) -> CommandResult {
    let user = user.trim();
    if user.is_empty() {
        return CommandResult::failure("report", "invalid_argument", "--user must not be empty", 6);
    }
    let clock = SystemClock;
    let month = match month.map(str::parse::<CivilMonth>) {
        None => CivilMonth::containing(clock.now()),
        Some(Ok(month)) => month,
        Some(Err(error)) => {
            return CommandResult::failure("report", "invalid_argument", error.to_string(), 6);
        }
    };

    let config = match load_config("report") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("report") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let user_id = UserId(user.to_string());
    let ctx = RequestContext::generate("cli-report");
    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let engine =
            ShiftAccountingEngine::new(Arc::new(SqlShiftRepository::new(pool.clone())), Arc::new(clock));
        let total = engine
            .monthly_total(&user_id, month, &ctx)
            .await
            .map_err(|error| ("persistence", error.to_string(), 7u8));
        pool.close().await;
        let total = total?;
        let data = to_data(&total)?;
        Ok((total.entries.len(), total.total_hours, data))
    });

    match result {
        Ok((shifts, hours, data)) => CommandResult::success_with_data(
            "report",
            format!("{shifts} shifts, {hours} hours in {month}"),
            Some(json!({ "user_id": user_id.as_str(), "report": data })),
        ),
        Err(failure) => CommandResult::from_failure("report", failure),
    }
}
