use crate::config::ConfigError;
use crate::instance_lock::InstanceLockError;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum HealthMergeError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    InstanceLock(#[from] InstanceLockError),

    #[error("Invalid state snapshot: {0}")]
    InvalidSnapshot(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HealthMergeError>;
