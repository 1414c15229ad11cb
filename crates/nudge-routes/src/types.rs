use nudge_core::{config::StaticRoute, ResolvedRoute, RouteState};
use serde::{Deserialize, Serialize};

/// One binding of a route reference to its session.
///
/// Route references are opaque to the scheduler; the control plane decides
/// what they look like (`telegram:12345`, `chat-1`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEntry {
    pub route_ref: String,
    pub session_ref: String,
    #[serde(default = "default_status")]
    pub status: RouteState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
}

fn default_status() -> RouteState {
    RouteState::Active
}

impl RouteEntry {
    pub fn resolved(&self) -> ResolvedRoute {
        ResolvedRoute {
            session_ref: self.session_ref.clone(),
            state: self.status,
            workspace: self.workspace.clone(),
        }
    }
}

impl From<&StaticRoute> for RouteEntry {
    fn from(r: &StaticRoute) -> Self {
        Self {
            route_ref: r.route_ref.clone(),
            session_ref: r.session_ref.clone(),
            status: r.state,
            workspace: r.workspace.clone(),
        }
    }
}

/// On-disk shape of the registry file: `{ "routes": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryFile {
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
}
