use std::env;

use identra_core::AppError;
use tracing_subscriber::EnvFilter;

/// Environment-derived configuration for the bootstrap run.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Uid of the system actor the seeded roles are created under.
    pub system_uid: String,
    /// Display name for the system actor's profile.
    pub system_display_name: String,
    /// Optional contact email for the system actor's profile.
    pub system_email: Option<String>,
}

impl BootstrapConfig {
    /// Loads configuration from the environment.
    pub fn load() -> Result<Self, AppError> {
        let database_url = required_env("DATABASE_URL")?;
        let system_uid = env::var("BOOTSTRAP_UID").unwrap_or_else(|_| "system".to_owned());
        let system_display_name = env::var("BOOTSTRAP_DISPLAY_NAME")
            .unwrap_or_else(|_| "Platform Bootstrap".to_owned());
        let system_email = env::var("BOOTSTRAP_EMAIL")
            .ok()
            .filter(|value| !value.trim().is_empty());

        Ok(Self {
            database_url,
            system_uid,
            system_display_name,
            system_email,
        })
    }
}

/// Initializes the process-wide tracing subscriber.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}
