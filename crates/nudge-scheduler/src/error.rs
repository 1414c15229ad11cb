use thiserror::Error;

use crate::types::ErrorCode;

/// Persistence failures of the job table and run log.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The table exists but cannot be parsed. Never replaced by an empty table.
    #[error("Job table {path} is corrupt: {reason}")]
    DataCorrupt { path: String, reason: String },

    #[error("Store I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Job not found: {id}")]
    JobNotFound { id: String },
}

impl StoreError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// The schedule definition cannot produce fire times.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },

    #[error("Invalid timezone '{0}': expected an IANA name such as Asia/Shanghai")]
    InvalidTimezone(String),

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),
}

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The table failed to load at startup; mutations are refused.
    #[error("Scheduler degraded: {0}")]
    Degraded(String),

    /// Another process holds the daemon lease on the state directory.
    #[error("Daemon pid {pid} holds the state lease until {expires_at_ms}")]
    DaemonActive { pid: u32, expires_at_ms: i64 },
}

impl SchedulerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SchedulerError::Store(StoreError::DataCorrupt { .. }) => ErrorCode::DataCorrupt,
            SchedulerError::Store(StoreError::JobNotFound { .. }) => ErrorCode::JobNotFound,
            SchedulerError::Store(_) => ErrorCode::StoreIo,
            SchedulerError::Schedule(_) => ErrorCode::ScheduleInvalid,
            SchedulerError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            SchedulerError::Degraded(_) => ErrorCode::SchedulerDegraded,
            SchedulerError::DaemonActive { .. } => ErrorCode::DaemonActive,
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
