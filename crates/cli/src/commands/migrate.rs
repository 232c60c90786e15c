use std::sync::Arc;

use kintai_core::clock::SystemClock;
use kintai_core::directory::UserDirectory;
use kintai_db::SqlUserRepository;

use crate::commands::{load_config, open_database, runtime, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("migrate") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("migrate") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let directory =
            UserDirectory::new(Arc::new(SqlUserRepository::new(pool.clone())), Arc::new(SystemClock));
        let users = directory
            .list_users()
            .await
            .map_err(|error| ("persistence", error.to_string(), 7u8))?;
        pool.close().await;
        Ok(users.len())
    });

    match result {
        Ok(users) => CommandResult::success(
            "migrate",
            format!("applied pending migrations ({users} registered users)"),
        ),
        Err(failure) => CommandResult::from_failure("migrate", failure),
    }
}
