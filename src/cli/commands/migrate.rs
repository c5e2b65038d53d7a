use anyhow::Context;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config;
use crate::database::DatabaseManager;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let database = &config::config().database;
    let pool = DatabaseManager::connect(database)
        .await
        .context("failed to connect to DATABASE_URL")?;

    let result = DatabaseManager::migrate(&pool).await;
    DatabaseManager::close(pool).await;
    result.context("failed to apply migrations")?;

    output_success(
        output_format,
        "Migrations applied",
        Some(json!({ "database": config::config().redacted().database.url })),
    )
}
