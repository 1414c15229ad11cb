//! Long-running mode: the scheduler loop plus process signal handling.

use nudge_scheduler::{Clock, DaemonLease, JobOp, SchedulerEngine, SchedulerHandle, SystemClock};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Run until a signal arrives or the lease is lost. `lease` must already be
/// acquired; it is released on the way out.
pub async fn run(engine: SchedulerEngine, lease: DaemonLease) -> anyhow::Result<()> {
    let (handle, commands) = SchedulerHandle::channel(32);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    spawn_reload_on_hangup(handle);

    let stop = async {
        tokio::select! {
            _ = wait_for_shutdown() => {}
            _ = keep_lease(&lease) => {}
        }
        let _ = shutdown_tx.send(true);
    };
    tokio::join!(engine.run(commands, shutdown_rx), stop);

    if let Err(e) = lease.release() {
        warn!(error = %e, "could not release daemon lease");
    }
    info!("nudge daemon stopped");
    Ok(())
}

/// Renew the lease on its heartbeat. Returns only when renewal fails.
async fn keep_lease(lease: &DaemonLease) {
    let mut heartbeat = tokio::time::interval(lease.renew_interval());
    heartbeat.tick().await;
    loop {
        heartbeat.tick().await;
        if let Err(e) = lease.renew(SystemClock.now_ms()) {
            error!(code = %e.code(), error = %e, "daemon lease lost, shutting down");
            return;
        }
    }
}

/// SIGHUP re-reads the job table written by operator commands.
#[cfg(unix)]
fn spawn_reload_on_hangup(handle: SchedulerHandle) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGHUP; reload disabled");
            return;
        }
    };
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            let result = handle.request(JobOp::Reload).await;
            info!(status = ?result.status, message = %result.message, "reload on SIGHUP");
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(_handle: SchedulerHandle) {}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("interrupt received"),
        _ = terminate => info!("terminate received"),
    }
}
