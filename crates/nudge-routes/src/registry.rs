use std::{collections::HashMap, path::PathBuf};

use async_trait::async_trait;
use nudge_core::{config::RoutesConfig, ResolvedRoute, RouteResolver};
use tracing::{debug, instrument};

use crate::{
    error::{Result, RouteError},
    types::{RegistryFile, RouteEntry},
};

/// File-backed [`RouteResolver`].
///
/// The registry file is re-read on every lookup so route changes made by the
/// control plane (pause, archive, delete) are seen without a restart. A
/// missing file just means "no dynamic routes".
pub struct RouteRegistry {
    file: Option<PathBuf>,
    static_routes: HashMap<String, RouteEntry>,
}

impl RouteRegistry {
    pub fn new(file: Option<PathBuf>, static_routes: Vec<RouteEntry>) -> Result<Self> {
        let mut map = HashMap::with_capacity(static_routes.len());
        for entry in static_routes {
            if map.contains_key(&entry.route_ref) {
                return Err(RouteError::Duplicate(entry.route_ref));
            }
            map.insert(entry.route_ref.clone(), entry);
        }
        Ok(Self {
            file,
            static_routes: map,
        })
    }

    pub fn from_config(config: &RoutesConfig) -> Result<Self> {
        Self::new(
            config.file.as_ref().map(PathBuf::from),
            config.static_routes.iter().map(RouteEntry::from).collect(),
        )
    }

    /// Read the registry file. Missing file ⇒ empty.
    pub async fn load_file(&self) -> Result<Vec<RouteEntry>> {
        let Some(path) = &self.file else {
            return Ok(Vec::new());
        };
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "route registry file absent");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(RouteError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        let parsed: RegistryFile =
            serde_json::from_str(&raw).map_err(|source| RouteError::Malformed {
                path: path.display().to_string(),
                source,
            })?;
        Ok(parsed.routes)
    }

    /// Registry file first, then static routes.
    pub async fn lookup(&self, route_ref: &str) -> Result<Option<RouteEntry>> {
        let from_file = self
            .load_file()
            .await?
            .into_iter()
            .find(|r| r.route_ref == route_ref);
        Ok(from_file.or_else(|| self.static_routes.get(route_ref).cloned()))
    }
}

#[async_trait]
impl RouteResolver for RouteRegistry {
    #[instrument(skip(self))]
    async fn resolve_route(&self, route_ref: &str) -> nudge_core::Result<Option<ResolvedRoute>> {
        let found = self.lookup(route_ref).await?;
        debug!(found = found.is_some(), "route resolved");
        Ok(found.map(|r| r.resolved()))
    }
}
