//! Identra bootstrap composition root.
//!
//! Applies migrations and seeds the baseline roles and the system profile
//! through the unauthenticated bootstrap path. Intended to run once per
//! environment before the API layer starts; re-runs are idempotent.

#![forbid(unsafe_code)]

mod bootstrap_config;
mod seed;

use identra_core::AppError;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::bootstrap_config::BootstrapConfig;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    bootstrap_config::init_tracing();

    let config = BootstrapConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .map_err(|error| {
            AppError::Persistence(format!("failed to connect to database: {error}"))
        })?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Persistence(format!("failed to run migrations: {error}")))?;
    info!("database migrations applied");

    seed::run(pool, &config).await?;

    info!("bootstrap completed");
    Ok(())
}
