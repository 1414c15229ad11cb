//! Building the scheduler and its collaborators from configuration.

use std::{path::Path, sync::Arc, time::Duration};

use anyhow::Context;
use nudge_channels::build_relay;
use nudge_core::{config::SchedulerConfig, NudgeConfig};
use nudge_routes::RouteRegistry;
use nudge_scheduler::{
    ensure_no_daemon, EngineSettings, ErrorCode, JobExecutor, JobOp, JobStore, OpResult,
    SchedulerEngine, SystemClock,
};
use nudge_terminal::TmuxBackend;
use tracing::info;

/// Load the config and build the engine. Either failure comes back as an
/// `INVALID_ARGUMENT` result ready to print.
pub fn load_engine(
    config_path: Option<&str>,
) -> Result<(NudgeConfig, SchedulerEngine), OpResult> {
    let config = NudgeConfig::load(config_path)
        .map_err(|e| OpResult::failure(ErrorCode::InvalidArgument, e.to_string()))?;
    let engine = build_engine(&config)
        .map_err(|e| OpResult::failure(ErrorCode::InvalidArgument, format!("{e:#}")))?;
    Ok((config, engine))
}

/// `Some(DAEMON_ACTIVE)` when `op` would write state a live daemon owns.
pub fn refuse_if_daemon_active(
    config: &SchedulerConfig,
    op: &JobOp,
    now_ms: i64,
) -> Option<OpResult> {
    if !op.writes_state() {
        return None;
    }
    ensure_no_daemon(&config.lease_path(), now_ms)
        .err()
        .map(|e| OpResult::from_error(&e))
}

pub fn build_engine(config: &NudgeConfig) -> anyhow::Result<SchedulerEngine> {
    let state_dir = &config.scheduler.state_dir;
    std::fs::create_dir_all(state_dir)
        .with_context(|| format!("creating state directory {state_dir}"))?;

    let resolver = RouteRegistry::from_config(&config.routes).context("loading static routes")?;
    let sessions = TmuxBackend::new(config.session.clone());
    let relay = build_relay(&config.relay).context("configuring relay")?;

    let executor = JobExecutor::new(
        Arc::new(resolver),
        Arc::new(sessions),
        relay,
        Duration::from_millis(config.scheduler.reply_timeout_ms),
    );
    let store = JobStore::from_config(&config.scheduler);
    info!(
        jobs = %store.jobs_path().display(),
        runs = %store.runs_path().display(),
        "job store"
    );

    Ok(SchedulerEngine::new(
        store,
        executor,
        Arc::new(SystemClock),
        EngineSettings::from(&config.scheduler),
    ))
}

/// Resolve the config path: `--config`, then `NUDGE_CONFIG`.
pub fn config_path(flag: Option<String>) -> Option<String> {
    flag.or_else(|| std::env::var("NUDGE_CONFIG").ok())
        .filter(|p| !p.trim().is_empty())
}

pub fn config_exists(path: Option<&str>) -> bool {
    path.is_some_and(|p| Path::new(p).exists())
}
