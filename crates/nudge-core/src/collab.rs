//! Collaborator contracts shared between the scheduler and the crates that
//! implement routing, sessions and outbound relay.
//!
//! The scheduler only ever talks to these traits; concrete implementations
//! live in `nudge-routes`, `nudge-terminal`, and `nudge-channels`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Lifecycle state of a route as reported by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteState {
    Active,
    Paused,
    Archived,
}

impl std::fmt::Display for RouteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RouteState::Active => "active",
            RouteState::Paused => "paused",
            RouteState::Archived => "archived",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RouteState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(RouteState::Active),
            "paused" => Ok(RouteState::Paused),
            "archived" => Ok(RouteState::Archived),
            other => Err(format!("unknown route state: {other}")),
        }
    }
}

/// What a route reference resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRoute {
    /// Name of the long-lived session bound to this route.
    pub session_ref: String,
    pub state: RouteState,
    /// Working directory for sessions started on behalf of this route.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
}

/// Maps an opaque route reference to its session.
#[async_trait]
pub trait RouteResolver: Send + Sync {
    /// `Ok(None)` means the route does not exist (any more).
    async fn resolve_route(&self, route_ref: &str) -> Result<Option<ResolvedRoute>>;
}

/// A long-lived interactive process that accepts text and produces a reply.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Whether a live session with this name exists right now.
    async fn is_alive(&self, session_ref: &str) -> Result<bool>;

    /// Start the session if it is not running. Idempotent.
    async fn ensure_started(&self, session_ref: &str, workspace: Option<&str>) -> Result<()>;

    /// Type `text` into the session and wait (at most `timeout`) for its reply.
    async fn send_and_receive(
        &self,
        session_ref: &str,
        text: &str,
        timeout: Duration,
    ) -> Result<String>;

    /// Stop and discard a session. Missing sessions are not an error.
    async fn teardown(&self, session_ref: &str) -> Result<()>;
}

/// Outbound messaging gateway used to relay a run's reply.
#[async_trait]
pub trait MessageRelay: Send + Sync {
    async fn relay(&self, route_ref: &str, text: &str) -> Result<()>;
}
