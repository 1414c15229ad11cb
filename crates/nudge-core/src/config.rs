use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::collab::RouteState;

pub const DEFAULT_STUCK_THRESHOLD_MS: u64 = 2 * 60 * 60 * 1000; // 2 h
pub const DEFAULT_EXEC_TIMEOUT_MS: u64 = 10 * 60 * 1000; // 10 min hard cap per run
pub const DEFAULT_REPLY_TIMEOUT_MS: u64 = 5 * 60 * 1000;
pub const DEFAULT_RELAY_TIMEOUT_MS: u64 = 15_000;
pub const JOBS_FILE: &str = "jobs.json";
pub const RUNS_FILE: &str = "runs.jsonl";
pub const LEASE_FILE: &str = "daemon.lease";
pub const DEFAULT_LEASE_TTL_MS: u64 = 15_000;

/// Top-level config (nudge.toml + NUDGE_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NudgeConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Directory holding `jobs.json` and `runs.jsonl`.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    /// A run whose in-flight marker is older than this is force-cleared.
    #[serde(default = "default_stuck_threshold_ms")]
    pub stuck_threshold_ms: u64,
    /// Upper bound for one executor call, collaborators included.
    #[serde(default = "default_exec_timeout_ms")]
    pub exec_timeout_ms: u64,
    /// How long to wait for a session reply.
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
    /// Applied by the explicit `prune-runs` maintenance command only.
    #[serde(default)]
    pub retention: Option<RetentionPolicy>,
    /// The daemon lease counts as abandoned this long after its last renewal.
    #[serde(default = "default_lease_ttl_ms")]
    pub lease_ttl_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            stuck_threshold_ms: DEFAULT_STUCK_THRESHOLD_MS,
            exec_timeout_ms: DEFAULT_EXEC_TIMEOUT_MS,
            reply_timeout_ms: DEFAULT_REPLY_TIMEOUT_MS,
            retention: None,
            lease_ttl_ms: DEFAULT_LEASE_TTL_MS,
        }
    }
}

impl SchedulerConfig {
    pub fn jobs_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.state_dir).join(JOBS_FILE)
    }

    pub fn runs_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.state_dir).join(RUNS_FILE)
    }

    pub fn lease_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.state_dir).join(LEASE_FILE)
    }
}

/// Run-log retention: keep entries younger than N days, or the newest N lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RetentionPolicy {
    MaxAge { days: u32 },
    MaxLines { lines: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_tmux_bin")]
    pub tmux_bin: String,
    /// Command launched inside a freshly created session (e.g. the agent CLI).
    /// `None` starts the user's default shell.
    pub start_command: Option<String>,
    /// Pane polling cadence while waiting for a reply.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// The pane must be unchanged for this long before the reply is taken.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_max_reply_chars")]
    pub max_reply_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tmux_bin: default_tmux_bin(),
            start_command: None,
            poll_interval_ms: default_poll_interval_ms(),
            settle_ms: default_settle_ms(),
            max_reply_chars: default_max_reply_chars(),
        }
    }
}

/// Outbound gateway. Relay is disabled when `url` is unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub url: Option<String>,
    pub token: Option<String>,
    #[serde(default = "default_relay_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            timeout_ms: DEFAULT_RELAY_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RoutesConfig {
    /// Route registry maintained by the control plane (JSON).
    pub file: Option<String>,
    /// Routes declared inline; the registry file wins on conflicts.
    #[serde(default, rename = "static")]
    pub static_routes: Vec<StaticRoute>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StaticRoute {
    pub route_ref: String,
    pub session_ref: String,
    #[serde(default = "default_route_state")]
    pub state: RouteState,
    pub workspace: Option<String>,
}

fn default_state_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.nudge", home)
}
fn default_stuck_threshold_ms() -> u64 {
    DEFAULT_STUCK_THRESHOLD_MS
}
fn default_exec_timeout_ms() -> u64 {
    DEFAULT_EXEC_TIMEOUT_MS
}
fn default_reply_timeout_ms() -> u64 {
    DEFAULT_REPLY_TIMEOUT_MS
}
fn default_lease_ttl_ms() -> u64 {
    DEFAULT_LEASE_TTL_MS
}
fn default_relay_timeout_ms() -> u64 {
    DEFAULT_RELAY_TIMEOUT_MS
}
fn default_tmux_bin() -> String {
    "tmux".to_string()
}
fn default_poll_interval_ms() -> u64 {
    500
}
fn default_settle_ms() -> u64 {
    3_000
}
fn default_max_reply_chars() -> usize {
    30_000
}
fn default_route_state() -> RouteState {
    RouteState::Active
}

impl NudgeConfig {
    /// Load config from a TOML file with NUDGE_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.nudge/nudge.toml
    ///
    /// A missing file is not an error; every key has a default. Nested keys
    /// in the environment use a double underscore:
    /// `NUDGE_SCHEDULER__STUCK_THRESHOLD_MS=600000`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        if !std::path::Path::new(&path).exists() {
            tracing::debug!(path = %path, "no config file, using defaults and environment");
        }

        let config: NudgeConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("NUDGE_").split("__"))
            .extract()
            .map_err(|e| crate::error::NudgeError::Config(e.to_string()))?;

        config.validate()?;
        tracing::debug!(
            path = %path,
            state_dir = %config.scheduler.state_dir,
            relay = config.relay.url.is_some(),
            static_routes = config.routes.static_routes.len(),
            "config loaded"
        );
        Ok(config)
    }

    fn validate(&self) -> crate::error::Result<()> {
        use crate::error::NudgeError;

        if self.scheduler.stuck_threshold_ms == 0 {
            return Err(NudgeError::Config(
                "scheduler.stuck_threshold_ms must be greater than zero".to_string(),
            ));
        }
        if self.scheduler.lease_ttl_ms == 0 {
            return Err(NudgeError::Config(
                "scheduler.lease_ttl_ms must be greater than zero".to_string(),
            ));
        }
        if self.scheduler.exec_timeout_ms < self.scheduler.reply_timeout_ms {
            return Err(NudgeError::Config(format!(
                "scheduler.exec_timeout_ms ({}) must be >= scheduler.reply_timeout_ms ({})",
                self.scheduler.exec_timeout_ms, self.scheduler.reply_timeout_ms
            )));
        }
        if self.scheduler.stuck_threshold_ms < self.scheduler.exec_timeout_ms {
            return Err(NudgeError::Config(
                "scheduler.stuck_threshold_ms must be >= scheduler.exec_timeout_ms".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.nudge/nudge.toml", home)
}
