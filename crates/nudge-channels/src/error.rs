use thiserror::Error;

/// Errors that can occur while relaying a reply to the messaging gateway.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The request never got a response (DNS, connect, reset).
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The gateway answered with a non-success status.
    #[error("Gateway rejected message with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The gateway rejected the configured token.
    #[error("Authentication failed: HTTP {0}")]
    AuthFailed(u16),

    /// An operation exceeded its allowed time budget.
    #[error("Operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// No relay is configured, or the configuration is unusable.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl RelayError {
    /// Transport failures and 5xx/429 are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            RelayError::SendFailed(_) | RelayError::Timeout { .. } => true,
            RelayError::Rejected { status, .. } => *status >= 500 || *status == 429,
            RelayError::AuthFailed(_) | RelayError::ConfigError(_) => false,
        }
    }

    pub fn into_nudge(self, route: &str) -> nudge_core::NudgeError {
        nudge_core::NudgeError::Relay {
            route: route.to_string(),
            reason: self.to_string(),
        }
    }
}
