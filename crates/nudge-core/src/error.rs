use thiserror::Error;

#[derive(Debug, Error)]
pub enum NudgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The session backend itself is not usable (binary missing, not configured).
    #[error("Session backend unavailable: {0}")]
    SessionUnavailable(String),

    #[error("Session start failed ({session}): {reason}")]
    SessionStart { session: String, reason: String },

    #[error("Session not found: {session}")]
    SessionNotFound { session: String },

    #[error("Session I/O error ({session}): {reason}")]
    SessionIo { session: String, reason: String },

    #[error("Relay error ({route}): {reason}")]
    Relay { route: String, reason: String },

    #[error("Route registry error: {0}")]
    Routing(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request timeout after {ms}ms")]
    Timeout { ms: u64 },
}

impl NudgeError {
    /// Short error code string, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            NudgeError::Config(_) => "CONFIG_ERROR",
            NudgeError::SessionUnavailable(_) => "SESSION_UNAVAILABLE",
            NudgeError::SessionStart { .. } => "SESSION_START_FAILED",
            NudgeError::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            NudgeError::SessionIo { .. } => "SESSION_IO",
            NudgeError::Relay { .. } => "RELAY_ERROR",
            NudgeError::Routing(_) => "ROUTING_ERROR",
            NudgeError::Serialization(_) => "SERIALIZATION_ERROR",
            NudgeError::Io(_) => "IO_ERROR",
            NudgeError::Timeout { .. } => "TIMEOUT",
        }
    }
}

pub type Result<T> = std::result::Result<T, NudgeError>;
