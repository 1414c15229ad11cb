//! Error types for the nudge-terminal crate.

use nudge_core::NudgeError;
use thiserror::Error;

/// All errors that can originate from tmux operations.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// The tmux binary could not be executed at all.
    #[error("tmux binary '{0}' not found or not executable")]
    BinaryMissing(String),

    /// tmux ran but reported failure.
    #[error("tmux {command} failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// The named session does not exist.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Rejected before reaching tmux.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Underlying I/O failure while talking to tmux.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Operation exceeded its time budget.
    #[error("Operation timed out after {ms}ms")]
    Timeout { ms: u64 },
}

impl TerminalError {
    /// Fold into the collaborator error, tagging it with the session involved.
    pub fn into_nudge(self, session: &str) -> NudgeError {
        match self {
            TerminalError::BinaryMissing(bin) => {
                NudgeError::SessionUnavailable(format!("tmux binary '{bin}' not found"))
            }
            TerminalError::SessionNotFound(session) => NudgeError::SessionNotFound { session },
            TerminalError::Timeout { ms } => NudgeError::Timeout { ms },
            other => NudgeError::SessionIo {
                session: session.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, TerminalError>;
