use std::time::Duration;

use clap::Parser;
use nudge_scheduler::{Clock, DaemonLease, ErrorCode, OpResult, SystemClock};
use tracing::warn;

mod args;
mod cli;
mod daemon;
mod wiring;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the JSON result; logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nudge=info,nudge_scheduler=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config_path = wiring::config_path(cli.config);
    if config_path.is_some() && !wiring::config_exists(config_path.as_deref()) {
        warn!(path = ?config_path, "config file not found, using defaults");
    }
    let (config, mut engine) = match wiring::load_engine(config_path.as_deref()) {
        Ok(loaded) => loaded,
        Err(result) => return finish(result),
    };

    if matches!(cli.command, Commands::Daemon) {
        let mut lease = DaemonLease::new(
            config.scheduler.lease_path(),
            Duration::from_millis(config.scheduler.lease_ttl_ms),
        );
        if let Err(e) = lease.acquire(SystemClock.now_ms()) {
            return finish(OpResult::from_error(&e));
        }
        return daemon::run(engine, lease).await;
    }

    let now_ms = SystemClock.now_ms();
    let result = match args::to_op(cli.command, now_ms) {
        Ok(Some(op)) => match wiring::refuse_if_daemon_active(&config.scheduler, &op, now_ms) {
            Some(refused) => refused,
            None => {
                if let Err(e) = engine.open() {
                    warn!(code = %e.code(), error = %e, "job table unavailable, read-only");
                }
                engine.apply(op).await
            }
        },
        Ok(None) => OpResult::ok("nothing to do", serde_json::Value::Null),
        Err(msg) => OpResult::failure(ErrorCode::InvalidArgument, msg),
    };
    finish(result)
}

/// Print the JSON result on stdout and exit with its code.
fn finish(result: OpResult) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&result)?);
    std::process::exit(result.exit_code());
}
