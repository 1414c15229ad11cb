//! Daemon lease on the state directory.
//!
//! The daemon writes `daemon.lease` when it starts and renews it on a fixed
//! heartbeat. While the record is unexpired, one-shot CLI commands that would
//! write `jobs.json` or `runs.jsonl` are refused with `DAEMON_ACTIVE`, so an
//! operator edit can never be overwritten by the daemon's in-memory table.
//! A daemon that dies without releasing leaves a record that simply expires.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::{Result, SchedulerError, StoreError},
    store::{sibling_tmp, write_synced},
};

/// On-disk lease record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseRecord {
    pub instance_id: String,
    pub pid: u32,
    pub started_at_ms: i64,
    pub renewed_at_ms: i64,
    pub expires_at_ms: i64,
}

impl LeaseRecord {
    pub fn is_live(&self, now_ms: i64) -> bool {
        self.expires_at_ms > now_ms
    }
}

/// Lease held by one daemon process.
pub struct DaemonLease {
    path: PathBuf,
    instance_id: String,
    pid: u32,
    ttl_ms: i64,
    started_at_ms: Option<i64>,
}

impl DaemonLease {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            instance_id: Uuid::new_v4().to_string(),
            pid: std::process::id(),
            ttl_ms: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            started_at_ms: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Heartbeat cadence: three renewals per TTL.
    pub fn renew_interval(&self) -> Duration {
        Duration::from_millis(u64::try_from(self.ttl_ms / 3).unwrap_or(1).max(1))
    }

    /// Claim the lease. Fails with [`SchedulerError::DaemonActive`] while
    /// another instance holds an unexpired record; an expired one is taken over.
    pub fn acquire(&mut self, now_ms: i64) -> Result<LeaseRecord> {
        if let Some(existing) = read_record(&self.path)? {
            if existing.instance_id != self.instance_id && existing.is_live(now_ms) {
                return Err(held_by(&existing));
            }
            if existing.instance_id != self.instance_id {
                info!(
                    previous_pid = existing.pid,
                    expired_at_ms = existing.expires_at_ms,
                    "taking over expired daemon lease"
                );
            }
        }

        let record = self.record(now_ms, now_ms);
        write_record(&self.path, &record)?;
        self.started_at_ms = Some(now_ms);
        info!(path = %self.path.display(), pid = self.pid, "daemon lease acquired");
        Ok(record)
    }

    /// Push the expiry forward. Fails when another instance has taken the
    /// lease over in the meantime; the caller must stop writing.
    pub fn renew(&self, now_ms: i64) -> Result<()> {
        if let Some(existing) = read_record(&self.path)? {
            if existing.instance_id != self.instance_id && existing.is_live(now_ms) {
                return Err(held_by(&existing));
            }
        }
        let started = self.started_at_ms.unwrap_or(now_ms);
        write_record(&self.path, &self.record(started, now_ms))?;
        debug!(now_ms, "daemon lease renewed");
        Ok(())
    }

    /// Remove the lease file if it is still ours.
    pub fn release(&self) -> Result<()> {
        match read_record(&self.path)? {
            Some(existing) if existing.instance_id == self.instance_id => {
                fs::remove_file(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
                info!(path = %self.path.display(), "daemon lease released");
            }
            Some(existing) => {
                warn!(holder_pid = existing.pid, "lease belongs to another daemon; left in place");
            }
            None => {}
        }
        Ok(())
    }

    fn record(&self, started_at_ms: i64, now_ms: i64) -> LeaseRecord {
        LeaseRecord {
            instance_id: self.instance_id.clone(),
            pid: self.pid,
            started_at_ms,
            renewed_at_ms: now_ms,
            expires_at_ms: now_ms.saturating_add(self.ttl_ms),
        }
    }
}

/// The unexpired lease record at `path`, if any.
pub fn live_holder(path: &Path, now_ms: i64) -> Result<Option<LeaseRecord>> {
    Ok(read_record(path)?.filter(|r| r.is_live(now_ms)))
}

/// `Err(DaemonActive)` while a daemon holds the lease at `path`.
pub fn ensure_no_daemon(path: &Path, now_ms: i64) -> Result<()> {
    match live_holder(path, now_ms)? {
        Some(holder) => Err(held_by(&holder)),
        None => Ok(()),
    }
}

fn held_by(record: &LeaseRecord) -> SchedulerError {
    SchedulerError::DaemonActive {
        pid: record.pid,
        expires_at_ms: record.expires_at_ms,
    }
}

fn read_record(path: &Path) -> Result<Option<LeaseRecord>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e).into()),
    };
    match serde_json::from_slice::<LeaseRecord>(&bytes) {
        Ok(record) => Ok(Some(record)),
        Err(e) => {
            // a torn or foreign file never blocks the state directory
            warn!(path = %path.display(), error = %e, "ignoring malformed daemon lease");
            Ok(None)
        }
    }
}

fn write_record(path: &Path, record: &LeaseRecord) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(record).map_err(StoreError::from)?;
    let tmp = sibling_tmp(path);
    write_synced(&tmp, &bytes)?;
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))?;
    Ok(())
}
