pub mod activity_log;
pub mod commands;
pub mod config;
pub mod error;
pub mod snapshot;
pub mod types;

pub use activity_log::{ActivityLog, ActivityLogSink, JsonlLogSink, MemoryLogSink};
pub use commands::AdminCommand;
pub use config::AppConfig;
pub use error::AdminError;
pub use snapshot::Snapshot;
