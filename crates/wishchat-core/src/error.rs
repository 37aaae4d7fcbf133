use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Snapshot error: {path}: {message}")]
    Snapshot { path: String, message: String },

    #[error("Activity log error: {0}")]
    ActivityLog(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Invalid month (expected YYYY-MM): {0}")]
    InvalidMonth(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AdminError>;
