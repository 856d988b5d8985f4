use palaver_core::config::{AppConfig, LoadOptions};
use palaver_db::{connect, migrations};

use crate::commands::{CommandResult, FailureKind};

pub fn run() -> CommandResult {
    match apply() {
        Ok(message) => CommandResult::success("migrate", message),
        Err((kind, message)) => CommandResult::failure("migrate", kind, message),
    }
}

fn apply() -> Result<String, (FailureKind, String)> {
    let config = AppConfig::load(LoadOptions::default())
        .map_err(|error| (FailureKind::ConfigValidation, format!("configuration issue: {error}")))?;

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(
        |error| (FailureKind::RuntimeInit, format!("failed to initialize async runtime: {error}")),
    )?;

    runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| (FailureKind::DbConnectivity, error.to_string()))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| (FailureKind::Migration, error.to_string()))?;
        pool.close().await;
        Ok(format!("migrations up to date for {}", config.database.url))
    })
}
