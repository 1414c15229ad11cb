use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use nudge_core::config::{RetentionPolicy, SchedulerConfig};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    error::StoreError,
    types::{Job, JobTable, RunLogEntry, TABLE_VERSION},
};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Outcome of a retention pass over the run log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub kept: usize,
    pub removed: usize,
}

/// File-backed job table plus the append-only run log.
///
/// The table lives in memory and is written wholesale on every save through a
/// temp-file + fsync + rename sequence, so a crash leaves either the old or
/// the new file, never a torn one.
pub struct JobStore {
    jobs_path: PathBuf,
    runs_path: PathBuf,
    table: JobTable,
}

impl JobStore {
    pub fn new(jobs_path: impl Into<PathBuf>, runs_path: impl Into<PathBuf>) -> Self {
        Self {
            jobs_path: jobs_path.into(),
            runs_path: runs_path.into(),
            table: JobTable::default(),
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.jobs_path(), config.runs_path())
    }

    pub fn jobs_path(&self) -> &Path {
        &self.jobs_path
    }

    pub fn runs_path(&self) -> &Path {
        &self.runs_path
    }

    /// Replace the in-memory table with the file contents.
    ///
    /// A missing file is an empty table. A malformed one is `DataCorrupt` and
    /// the in-memory table is left untouched.
    pub fn load(&mut self) -> Result<(), StoreError> {
        let raw = match fs::read_to_string(&self.jobs_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.jobs_path.display(), "no job table yet, starting empty");
                self.table = JobTable::default();
                return Ok(());
            }
            Err(e) => return Err(StoreError::io(&self.jobs_path, e)),
        };

        let table: JobTable =
            serde_json::from_str(&raw).map_err(|e| self.corrupt(e.to_string()))?;
        if table.version > TABLE_VERSION {
            return Err(self.corrupt(format!(
                "table version {} is newer than supported version {TABLE_VERSION}",
                table.version
            )));
        }
        let mut ids = std::collections::HashSet::new();
        if let Some(dup) = table.jobs.iter().find(|j| !ids.insert(j.id.as_str())) {
            return Err(self.corrupt(format!("duplicate job id {}", dup.id)));
        }

        debug!(jobs = table.jobs.len(), "job table loaded");
        self.table = table;
        Ok(())
    }

    /// Write the whole table atomically.
    pub fn save(&self) -> Result<(), StoreError> {
        self.write_table(&self.table)
    }

    fn write_table(&self, table: &JobTable) -> Result<(), StoreError> {
        if let Some(parent) = self.jobs_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
            }
        }

        let json = serde_json::to_vec_pretty(table)?;
        let tmp = sibling_tmp(&self.jobs_path);
        write_synced(&tmp, &json)?;
        fs::rename(&tmp, &self.jobs_path).map_err(|e| StoreError::io(&self.jobs_path, e))?;
        Ok(())
    }

    /// Append one line to the run log. Callers treat failure as a warning.
    pub fn append_run(&self, entry: &RunLogEntry) -> Result<(), StoreError> {
        if let Some(parent) = self.runs_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
            }
        }
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.runs_path)
            .map_err(|e| StoreError::io(&self.runs_path, e))?;
        file.write_all(&line)
            .map_err(|e| StoreError::io(&self.runs_path, e))?;
        Ok(())
    }

    pub fn table(&self) -> &JobTable {
        &self.table
    }

    pub fn list_jobs(&self) -> &[Job] {
        &self.table.jobs
    }

    pub fn get_job(&self, id: &str) -> Option<&Job> {
        self.table.jobs.iter().find(|j| j.id == id)
    }

    pub(crate) fn get_job_mut(&mut self, id: &str) -> Option<&mut Job> {
        self.table.jobs.iter_mut().find(|j| j.id == id)
    }

    /// Insert or replace by id. The in-memory table only changes once the
    /// new table is on disk.
    pub fn upsert_job(&mut self, job: Job) -> Result<(), StoreError> {
        let mut next = self.table.clone();
        match next.jobs.iter_mut().find(|j| j.id == job.id) {
            Some(existing) => *existing = job,
            None => next.jobs.push(job),
        }
        self.write_table(&next)?;
        self.table = next;
        Ok(())
    }

    /// Delete a job row once the table without it is saved. Prior run-log
    /// lines are kept.
    pub fn remove_job(&mut self, id: &str) -> Result<Job, StoreError> {
        let pos = self
            .table
            .jobs
            .iter()
            .position(|j| j.id == id)
            .ok_or_else(|| StoreError::JobNotFound { id: id.to_string() })?;
        let mut next = self.table.clone();
        let removed = next.jobs.remove(pos);
        self.write_table(&next)?;
        self.table = next;
        Ok(removed)
    }

    /// Newest-last slice of the run log, at most `limit` entries.
    ///
    /// Unparseable lines (e.g. a torn final line after a crash) are skipped.
    pub fn read_runs(
        &self,
        job_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RunLogEntry>, StoreError> {
        let file = match File::open(&self.runs_path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.runs_path, e)),
        };

        let mut entries = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| StoreError::io(&self.runs_path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RunLogEntry>(&line) {
                Ok(entry) if job_id.map_or(true, |id| entry.job_id == id) => entries.push(entry),
                Ok(_) => {}
                Err(e) => warn!(line = lineno + 1, error = %e, "skipping unreadable run-log line"),
            }
        }

        let skip = entries.len().saturating_sub(limit);
        Ok(entries.split_off(skip))
    }

    /// Explicit retention pass. Rewrites the log atomically; never runs on its own.
    pub fn prune_runs(
        &self,
        policy: RetentionPolicy,
        now_ms: i64,
    ) -> Result<PruneReport, StoreError> {
        let raw = match fs::read_to_string(&self.runs_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PruneReport { kept: 0, removed: 0 })
            }
            Err(e) => return Err(StoreError::io(&self.runs_path, e)),
        };
        let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();

        let kept: Vec<&str> = match policy {
            RetentionPolicy::MaxLines { lines: max } => {
                let skip = lines.len().saturating_sub(max);
                lines[skip..].to_vec()
            }
            RetentionPolicy::MaxAge { days } => {
                let cutoff = now_ms.saturating_sub(i64::from(days) * DAY_MS);
                lines
                    .iter()
                    .copied()
                    .filter(|l| match serde_json::from_str::<RunLogEntry>(l) {
                        Ok(entry) => entry.ts_ms >= cutoff,
                        // Never drop what we cannot date.
                        Err(_) => true,
                    })
                    .collect()
            }
        };

        let report = PruneReport {
            kept: kept.len(),
            removed: lines.len() - kept.len(),
        };
        if report.removed == 0 {
            return Ok(report);
        }

        let mut body = kept.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        let tmp = sibling_tmp(&self.runs_path);
        write_synced(&tmp, body.as_bytes())?;
        fs::rename(&tmp, &self.runs_path).map_err(|e| StoreError::io(&self.runs_path, e))?;

        info!(kept = report.kept, removed = report.removed, "run log pruned");
        Ok(report)
    }

    fn corrupt(&self, reason: String) -> StoreError {
        StoreError::DataCorrupt {
            path: self.jobs_path.display().to_string(),
            reason,
        }
    }
}

/// `dir/.name.tmp`: same directory so the rename never crosses filesystems.
pub(crate) fn sibling_tmp(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "nudge".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

pub(crate) fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut file = File::create(path).map_err(|e| StoreError::io(path, e))?;
    file.write_all(bytes).map_err(|e| StoreError::io(path, e))?;
    file.sync_all().map_err(|e| StoreError::io(path, e))?;
    Ok(())
}
