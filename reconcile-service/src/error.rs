//! Service-layer errors: wraps the core's domain errors and adds the
//! failure modes that only exist once there's a process around it.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] reconcile_core::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("ledger write API returned {status}: {body}")]
    RemoteWrite { status: u16, body: String },

    #[error("database error: {0}")]
    Database(String),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
