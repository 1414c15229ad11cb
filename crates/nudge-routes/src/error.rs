use thiserror::Error;

/// Errors that can occur while reading the route registry.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The registry file exists but could not be read.
    #[error("cannot read route registry {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The registry file is not valid JSON of the expected shape.
    #[error("malformed route registry {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The same route reference appears twice in one source.
    #[error("duplicate route reference: {0}")]
    Duplicate(String),
}

impl From<RouteError> for nudge_core::NudgeError {
    fn from(e: RouteError) -> Self {
        nudge_core::NudgeError::Routing(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RouteError>;
