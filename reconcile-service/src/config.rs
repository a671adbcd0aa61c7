//! Environment-driven settings for one reconciliation run.

use crate::error::ServiceError;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub firefly_database_url: String,
    pub firefly_base_path: String,
    pub firefly_api_key: String,
    pub akahu_app_token: String,
    pub akahu_user_token: String,
    pub load_akahu_data: bool,
    pub dry_run: bool,
}

fn required(name: &str) -> Result<String, ServiceError> {
    std::env::var(name).map_err(|_| ServiceError::Configuration(format!("missing required env var {name}")))
}

fn truthy(name: &str) -> bool {
    std::env::var(name).map(|v| v == "true").unwrap_or(false)
}

impl Settings {
    pub fn from_env() -> Result<Self, ServiceError> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            firefly_database_url: required("FIREFLY_DATABASE_URL")?,
            firefly_base_path: required("FIREFLY_BASE_PATH")?,
            firefly_api_key: required("FIREFLY_API_KEY")?,
            akahu_app_token: required("AKAHU_APP_TOKEN")?,
            akahu_user_token: required("AKAHU_USER_TOKEN")?,
            load_akahu_data: truthy("LOAD_AKAHU_DATA"),
            dry_run: truthy("DRY_RUN"),
        })
    }
}
