use std::{sync::Arc, time::Duration};

use nudge_core::{
    config::{RetentionPolicy, SchedulerConfig},
    RouteState,
};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::{
    clock::Clock,
    error::{Result, SchedulerError, StoreError},
    executor::JobExecutor,
    ops::{JobOp, OpResult},
    schedule::{self, next_fire_after, next_wake_across_jobs},
    store::JobStore,
    summary::SchedulerSummary,
    timer::WakeTimer,
    types::{ErrorCode, Job, JobPatch, NewJob, RouteStatus, RunLogEntry, RunResult, RunStatus},
};

/// Tunables the loop needs from `[scheduler]`.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub stuck_threshold_ms: u64,
    pub exec_timeout_ms: u64,
    pub retention: Option<RetentionPolicy>,
}

impl From<&SchedulerConfig> for EngineSettings {
    fn from(cfg: &SchedulerConfig) -> Self {
        Self {
            stuck_threshold_ms: cfg.stuck_threshold_ms,
            exec_timeout_ms: cfg.exec_timeout_ms,
            retention: cfg.retention,
        }
    }
}

/// A request delivered to the running loop, answered on `reply`.
pub struct SchedulerCommand {
    pub op: JobOp,
    pub reply: oneshot::Sender<OpResult>,
}

/// Cloneable front door to a running [`SchedulerEngine`].
///
/// The loop stays the single owner of the job table; callers only ever send
/// requests and wait for the structured result.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SchedulerCommand>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub async fn request(&self, op: JobOp) -> OpResult {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(SchedulerCommand { op, reply }).await.is_err() {
            return OpResult::failure(ErrorCode::SchedulerDegraded, "scheduler loop is not running");
        }
        rx.await.unwrap_or_else(|_| {
            OpResult::failure(ErrorCode::SchedulerDegraded, "scheduler loop dropped the request")
        })
    }
}

/// The scheduler loop: owns the table, the single wake timer, and drives the
/// executor one job at a time.
pub struct SchedulerEngine {
    store: JobStore,
    executor: JobExecutor,
    clock: Arc<dyn Clock>,
    timer: WakeTimer,
    settings: EngineSettings,
    /// Set when the table failed to load. Nothing fires and nothing is saved.
    degraded: Option<String>,
}

impl SchedulerEngine {
    pub fn new(
        store: JobStore,
        executor: JobExecutor,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            executor,
            clock,
            timer: WakeTimer::new(),
            settings,
            degraded: None,
        }
    }

    pub fn jobs(&self) -> &[Job] {
        self.store.list_jobs()
    }

    pub fn timer(&self) -> &WakeTimer {
        &self.timer
    }

    pub fn degraded(&self) -> Option<&str> {
        self.degraded.as_deref()
    }

    pub fn summary(&self) -> SchedulerSummary {
        SchedulerSummary::compute(
            self.store.list_jobs(),
            self.clock.now_ms(),
            self.settings.stuck_threshold_ms,
            self.degraded(),
        )
    }

    /// Load the table for one-shot operator commands, without recovery.
    pub fn open(&mut self) -> Result<()> {
        self.load_or_degrade()
    }

    /// Startup recovery. Safe to run twice: the second pass changes nothing.
    pub async fn recover(&mut self) -> Result<()> {
        self.load_or_degrade()?;
        let now = self.clock.now_ms();

        let in_flight: Vec<Job> = self
            .store
            .list_jobs()
            .iter()
            .filter(|j| j.is_running())
            .cloned()
            .collect();
        for job in &in_flight {
            warn!(job_id = %job.id, running_at_ms = ?job.state.running_at_ms, "clearing run interrupted by restart");
            let aborted = RunResult::error(
                ErrorCode::RunAborted,
                "process stopped while the run was in flight",
                0,
            );
            self.record_outcome(&job.id, now, &aborted);
            self.skip_interrupted_slot(&job.id, now);
            self.append_log(job, now, &aborted);
            self.teardown_leftover(job, now).await;
        }

        self.refresh_all(now).await;
        self.persist();
        self.arm();
        info!(
            jobs = self.store.list_jobs().len(),
            aborted = in_flight.len(),
            next_wake = ?self.timer.deadline(),
            "scheduler recovered"
        );
        Ok(())
    }

    /// Main event loop. Runs until `shutdown` broadcasts `true`.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<SchedulerCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("scheduler engine started");
        if let Err(e) = self.recover().await {
            error!(code = %e.code(), error = %e, "startup recovery failed, running degraded");
        }

        let clock = Arc::clone(&self.clock);
        loop {
            tokio::select! {
                _ = self.timer.wait(clock.as_ref()) => {
                    self.tick().await;
                }
                Some(cmd) = commands.recv() => {
                    let result = self.apply(cmd.op).await;
                    let _ = cmd.reply.send(result);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One timer firing: clear stuck runs, then execute every due job in
    /// `(nextRunAtMs, id)` order. Returns how many jobs ran.
    pub async fn tick(&mut self) -> usize {
        if self.degraded.is_some() {
            self.timer.cancel();
            return 0;
        }
        let now = self.clock.now_ms();
        self.sweep_stuck(now).await;

        let mut due: Vec<(i64, String)> = self
            .store
            .list_jobs()
            .iter()
            .filter(|j| j.is_due(now))
            .filter_map(|j| j.state.next_run_at_ms.map(|t| (t, j.id.clone())))
            .collect();
        due.sort();

        let mut ran = 0;
        for (_, id) in due {
            if !self.store.get_job(&id).is_some_and(|j| j.is_due(now)) {
                continue;
            }
            if self.run_job(&id).await.is_some() {
                ran += 1;
            }
            self.arm();
        }
        self.arm();
        ran
    }

    pub async fn apply(&mut self, op: JobOp) -> OpResult {
        match self.apply_inner(op).await {
            Ok(result) => result,
            Err(e) => {
                debug!(code = %e.code(), error = %e, "operation refused");
                OpResult::from_error(&e)
            }
        }
    }

    async fn apply_inner(&mut self, op: JobOp) -> Result<OpResult> {
        if op.is_mutation() {
            if let Some(reason) = &self.degraded {
                return Err(SchedulerError::Degraded(reason.clone()));
            }
        }

        match op {
            JobOp::Summary => Ok(OpResult::ok("scheduler summary", self.summary())),
            JobOp::List => {
                let jobs = self.store.list_jobs();
                Ok(OpResult::ok(format!("{} job(s)", jobs.len()), jobs))
            }
            JobOp::Show { id } => {
                let job = self.require_job(&id)?;
                Ok(OpResult::ok(format!("job {}", job.name), job))
            }
            JobOp::Runs { job_id, limit } => {
                let runs = self.store.read_runs(job_id.as_deref(), limit)?;
                Ok(OpResult::ok(format!("{} run(s)", runs.len()), runs))
            }
            JobOp::PruneRuns { policy } => {
                let policy = policy.or(self.settings.retention).ok_or_else(|| {
                    SchedulerError::InvalidArgument(
                        "no retention policy given or configured".to_string(),
                    )
                })?;
                let report = self.store.prune_runs(policy, self.clock.now_ms())?;
                Ok(OpResult::ok(
                    format!("pruned {} run(s)", report.removed),
                    report,
                ))
            }
            JobOp::Reload => self.reload().await,
            JobOp::Add(new) => self.add_job(new).await,
            JobOp::Edit { id, patch } => self.edit_job(&id, patch).await,
            JobOp::Enable { id } => self.set_enabled(&id, true).await,
            JobOp::Disable { id } => self.set_enabled(&id, false).await,
            JobOp::Remove { id } => {
                let removed = self.store.remove_job(&id)?;
                info!(job_id = %id, name = %removed.name, "job removed");
                self.arm();
                Ok(OpResult::ok(format!("removed job {}", removed.name), removed))
            }
            JobOp::ForceRun { id } => self.force_run(&id).await,
        }
    }

    // --- operations ------------------------------------------------------

    async fn add_job(&mut self, new: NewJob) -> Result<OpResult> {
        validate_definition(&new.name, &new.route, &new.payload, new.delivery.max_chars)?;
        schedule::validate(&new.schedule)?;

        let now = self.clock.now_ms();
        let mut job = Job::new(new, now);
        if let Some(status) = self.route_status_of(&job.route).await {
            job.state.route_status = status;
        }
        let exhausted = self.place_next(&mut job, now)?;

        let mut result = OpResult::ok(format!("added job {}", job.name), &job);
        if exhausted {
            result = result.with_warning(
                ErrorCode::ScheduleExhausted,
                "the one-shot time has already passed; the job was created disabled",
            );
        }
        result = with_route_warning(result, &job);

        info!(job_id = %job.id, name = %job.name, route = %job.route, next_run_at_ms = ?job.state.next_run_at_ms, "job added");
        self.store.upsert_job(job)?;
        self.arm();
        Ok(result)
    }

    async fn edit_job(&mut self, id: &str, patch: JobPatch) -> Result<OpResult> {
        if patch.is_empty() {
            return Err(SchedulerError::InvalidArgument("nothing to change".to_string()));
        }
        let mut job = self.require_job(id)?.clone();
        if job.is_running() {
            return Err(SchedulerError::InvalidArgument(format!(
                "job {id} is running; edit it after the run finishes"
            )));
        }

        let schedule_changed = patch.schedule.as_ref().is_some_and(|s| *s != job.schedule);
        let route_changed = patch.route.as_ref().is_some_and(|r| *r != job.route);
        let JobPatch {
            name,
            description,
            route,
            schedule: new_schedule,
            session_target,
            payload,
            delivery,
        } = patch;
        if let Some(v) = name {
            job.name = v;
        }
        if let Some(v) = description {
            job.description = v;
        }
        if let Some(v) = route {
            job.route = v;
        }
        if let Some(v) = new_schedule {
            job.schedule = v;
        }
        if let Some(v) = session_target {
            job.session_target = v;
        }
        if let Some(v) = payload {
            job.payload = v;
        }
        if let Some(v) = delivery {
            v.apply_to(&mut job.delivery);
        }
        validate_definition(&job.name, &job.route, &job.payload, job.delivery.max_chars)?;
        schedule::validate(&job.schedule)?;

        let now = self.clock.now_ms();
        if route_changed {
            if let Some(status) = self.route_status_of(&job.route).await {
                job.state.route_status = status;
            }
        }
        let mut exhausted = false;
        if schedule_changed {
            exhausted = self.place_next(&mut job, now)?;
        }
        job.updated_at_ms = now;

        let mut result = OpResult::ok(format!("updated job {}", job.name), &job);
        if exhausted {
            result = result.with_warning(
                ErrorCode::ScheduleExhausted,
                "the new one-shot time has already passed; the job was disabled",
            );
        }
        result = with_route_warning(result, &job);

        info!(job_id = %id, schedule_changed, route_changed, "job edited");
        self.store.upsert_job(job)?;
        self.arm();
        Ok(result)
    }

    async fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<OpResult> {
        let mut job = self.require_job(id)?.clone();
        let now = self.clock.now_ms();
        let mut exhausted = false;

        if enabled {
            if let Some(status) = self.route_status_of(&job.route).await {
                job.state.route_status = status;
            }
            job.enabled = true;
            exhausted = self.place_next(&mut job, now)?;
        } else {
            job.enabled = false;
        }
        job.updated_at_ms = now;

        let verb = if enabled { "enabled" } else { "disabled" };
        let mut result = OpResult::ok(format!("{verb} job {}", job.name), &job);
        if exhausted {
            result = result.with_warning(
                ErrorCode::ScheduleExhausted,
                "the one-shot time has already passed; the job stays disabled",
            );
        }
        result = with_route_warning(result, &job);

        info!(job_id = %id, enabled = job.enabled, "job toggled");
        self.store.upsert_job(job)?;
        self.arm();
        Ok(result)
    }

    /// Run a job now, regardless of its schedule or enabled flag.
    async fn force_run(&mut self, id: &str) -> Result<OpResult> {
        let job = self.require_job(id)?.clone();
        if job.is_running() {
            return Err(SchedulerError::InvalidArgument(format!(
                "job {id} is already running"
            )));
        }
        if let Some(status) = self.route_status_of(&job.route).await {
            if let Some(j) = self.store.get_job_mut(id) {
                j.state.route_status = status;
            }
        }

        info!(job_id = %id, name = %job.name, "forced run");
        let result = self
            .run_job(id)
            .await
            .ok_or_else(|| StoreError::JobNotFound { id: id.to_string() })?;
        self.arm();

        let entry = RunLogEntry::from_result(&job, self.clock.now_ms(), &result);
        let op = match (result.status, result.error_code) {
            (RunStatus::Error, Some(code)) => OpResult::failure(
                code,
                result
                    .error_message
                    .clone()
                    .unwrap_or_else(|| code.hint().to_string()),
            )
            .with_data(&entry),
            (RunStatus::Skipped, Some(code)) => {
                OpResult::ok(format!("run of {} skipped", job.name), &entry)
                    .with_warning(code, result.error_message.clone().unwrap_or_default())
            }
            _ => OpResult::ok(format!("ran job {}", job.name), &entry),
        };
        Ok(result
            .warnings
            .iter()
            .fold(op, |op, w| op.with_warning(w.code, w.message.clone())))
    }

    /// Re-read the table from disk (SIGHUP). A degraded engine gets a full
    /// recovery; otherwise in-flight markers are kept for the stuck sweep.
    async fn reload(&mut self) -> Result<OpResult> {
        if self.degraded.is_some() {
            self.recover().await?;
            return Ok(OpResult::ok("job table reloaded, scheduler recovered", self.summary()));
        }
        self.load_or_degrade()?;
        let now = self.clock.now_ms();
        self.refresh_all(now).await;
        self.persist();
        self.arm();
        info!(jobs = self.store.list_jobs().len(), "job table reloaded");
        Ok(OpResult::ok("job table reloaded", self.summary()))
    }

    // --- execution -------------------------------------------------------

    /// Mark running, persist, execute under the hard timeout, record.
    async fn run_job(&mut self, id: &str) -> Option<RunResult> {
        let started_at = self.clock.now_ms();
        let snapshot = {
            let job = self.store.get_job_mut(id)?;
            job.state.running_at_ms = Some(started_at);
            job.clone()
        };
        self.persist();
        debug!(job_id = %id, name = %snapshot.name, "job started");

        let limit = Duration::from_millis(self.settings.exec_timeout_ms);
        let result = match tokio::time::timeout(limit, self.executor.execute(&snapshot)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(job_id = %id, timeout_ms = self.settings.exec_timeout_ms, "job exceeded execution timeout");
                self.executor.cleanup_isolated(&snapshot).await;
                RunResult::error(
                    ErrorCode::ExecTimeout,
                    format!("run exceeded {} ms", self.settings.exec_timeout_ms),
                    self.settings.exec_timeout_ms,
                )
            }
        };

        self.finish_run(&snapshot, started_at, &result).await;
        Some(result)
    }

    async fn finish_run(&mut self, snapshot: &Job, started_at: i64, result: &RunResult) {
        let finished = self.clock.now_ms();

        let learned_status = match (result.status, result.error_code) {
            (RunStatus::Ok, _) => Some(RouteStatus::Valid),
            (_, Some(ErrorCode::RouteNotFound | ErrorCode::RouteInactive)) => {
                self.route_status_of(&snapshot.route).await
            }
            _ => None,
        };

        let Some(job) = self.store.get_job_mut(&snapshot.id) else {
            warn!(job_id = %snapshot.id, "job removed while running, result only logged");
            self.append_log(snapshot, finished, result);
            return;
        };
        job.state.running_at_ms = None;
        job.state.last_run_at_ms = Some(started_at);
        job.state.last_status = result.status;
        job.state.last_error_code = result.error_code;
        job.state.last_error = result.error_message.clone();
        job.state.last_duration_ms = Some(result.duration_ms);
        if let Some(status) = learned_status {
            job.state.route_status = status;
        }

        if job.schedule.is_one_shot() && result.status == RunStatus::Ok {
            job.enabled = false;
            job.state.next_run_at_ms = None;
        } else {
            job.state.next_run_at_ms = match next_fire_after(&job.schedule, finished) {
                Ok(next) => next,
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "schedule no longer evaluates");
                    None
                }
            };
        }
        job.updated_at_ms = finished;

        match result.status {
            RunStatus::Ok => info!(
                job_id = %job.id,
                duration_ms = result.duration_ms,
                warnings = result.warnings.len(),
                next_run_at_ms = ?job.state.next_run_at_ms,
                "job finished"
            ),
            _ => warn!(
                job_id = %job.id,
                status = %result.status,
                code = ?result.error_code,
                error = result.error_message.as_deref().unwrap_or(""),
                "job did not complete"
            ),
        }

        self.persist();
        self.append_log(snapshot, finished, result);
    }

    /// Force-clear runs older than the stuck threshold.
    async fn sweep_stuck(&mut self, now: i64) {
        let threshold = i64::try_from(self.settings.stuck_threshold_ms).unwrap_or(i64::MAX);
        let stuck: Vec<(Job, i64)> = self
            .store
            .list_jobs()
            .iter()
            .filter_map(|j| j.state.running_at_ms.map(|t| (j, t)))
            .filter(|(_, t)| now.saturating_sub(*t) >= threshold)
            .map(|(j, t)| (j.clone(), t))
            .collect();
        if stuck.is_empty() {
            return;
        }

        for (job, since) in &stuck {
            let age = now.saturating_sub(*since);
            warn!(job_id = %job.id, age_ms = age, "clearing stuck run");
            let cleared = RunResult::error(
                ErrorCode::StuckCleared,
                format!("run in flight for {age} ms was force-cleared"),
                0,
            );
            self.record_outcome(&job.id, now, &cleared);
            self.skip_interrupted_slot(&job.id, now);
            self.append_log(job, now, &cleared);
            self.teardown_leftover(job, now).await;
        }
        self.persist();
    }

    /// The slot an interrupted run was started for counts as spent: the next
    /// fire time moves strictly past `now`, and a one-shot with nothing left
    /// is disabled.
    fn skip_interrupted_slot(&mut self, id: &str, now: i64) {
        let Some(job) = self.store.get_job_mut(id) else {
            return;
        };
        job.state.next_run_at_ms = match next_fire_after(&job.schedule, now) {
            Ok(next) => next,
            Err(e) => {
                warn!(job_id = %id, error = %e, "schedule does not evaluate");
                None
            }
        };
        if job.state.next_run_at_ms.is_none() && job.schedule.is_one_shot() {
            job.enabled = false;
        }
    }

    /// Tear down the disposable session an interrupted isolated run may have
    /// left behind, logging it under `ISOLATED_TEARDOWN`.
    async fn teardown_leftover(&self, job: &Job, now: i64) {
        if let Some(session) = self.executor.cleanup_isolated(job).await {
            info!(job_id = %job.id, %session, "leftover isolated session torn down");
            let note = RunResult::error(
                ErrorCode::IsolatedTeardown,
                format!("removed leftover session {session}"),
                0,
            );
            self.append_log(job, now, &note);
        }
    }

    /// Clear the in-flight marker and store a synthetic outcome.
    fn record_outcome(&mut self, id: &str, now: i64, result: &RunResult) {
        if let Some(job) = self.store.get_job_mut(id) {
            job.state.running_at_ms = None;
            job.state.last_status = result.status;
            job.state.last_error_code = result.error_code;
            job.state.last_error = result.error_message.clone();
            job.updated_at_ms = now;
        }
    }

    // --- helpers ---------------------------------------------------------

    fn load_or_degrade(&mut self) -> Result<()> {
        match self.store.load() {
            Ok(()) => {
                self.degraded = None;
                Ok(())
            }
            Err(e) => {
                error!(path = %self.store.jobs_path().display(), error = %e, "job table failed to load, scheduler degraded");
                self.degraded = Some(e.to_string());
                self.timer.cancel();
                Err(e.into())
            }
        }
    }

    /// Recompute route status and next fire time of every idle job.
    ///
    /// A persisted `nextRunAtMs` that is already due is kept so the most
    /// recent missed slot fires once; future values are recomputed. Slots
    /// whose run was interrupted have already been moved past `now`.
    async fn refresh_all(&mut self, now: i64) {
        let targets: Vec<(String, String)> = self
            .store
            .list_jobs()
            .iter()
            .filter(|j| !j.is_running())
            .map(|j| (j.id.clone(), j.route.clone()))
            .collect();

        for (id, route) in targets {
            let status = self.route_status_of(&route).await;
            let Some(job) = self.store.get_job_mut(&id) else {
                continue;
            };
            let next = match job.state.next_run_at_ms {
                Some(t) if t <= now && job.enabled => Some(t),
                _ => match next_fire_after(&job.schedule, now) {
                    Ok(next) => next,
                    Err(e) => {
                        warn!(job_id = %id, error = %e, "schedule does not evaluate");
                        None
                    }
                },
            };

            let mut changed = false;
            if let Some(status) = status {
                if job.state.route_status != status {
                    info!(job_id = %id, from = %job.state.route_status, to = %status, "route status changed");
                    job.state.route_status = status;
                    changed = true;
                }
            }
            if job.state.next_run_at_ms != next {
                job.state.next_run_at_ms = next;
                changed = true;
            }
            if changed {
                job.updated_at_ms = now;
            }
        }
    }

    /// `None` when routing could not be consulted; the caller keeps what it had.
    async fn route_status_of(&self, route: &str) -> Option<RouteStatus> {
        match self.executor.resolver().resolve_route(route).await {
            Ok(Some(r)) if r.state == RouteState::Active => Some(RouteStatus::Valid),
            Ok(Some(_)) => Some(RouteStatus::Invalid),
            Ok(None) => Some(RouteStatus::Orphaned),
            Err(e) => {
                warn!(%route, code = e.code(), error = %e, "route lookup failed");
                None
            }
        }
    }

    /// Compute `nextRunAtMs` from `now`. Returns `true` when a one-shot is
    /// already exhausted, in which case the job is disabled.
    fn place_next(&self, job: &mut Job, now: i64) -> Result<bool> {
        let next = next_fire_after(&job.schedule, now)?;
        job.state.next_run_at_ms = next;
        if next.is_none() && job.schedule.is_one_shot() {
            job.enabled = false;
            return Ok(true);
        }
        Ok(false)
    }

    fn require_job(&self, id: &str) -> Result<&Job> {
        self.store
            .get_job(id)
            .ok_or_else(|| StoreError::JobNotFound { id: id.to_string() }.into())
    }

    /// Save, reporting failure through the log only. Never saves while degraded.
    fn persist(&self) {
        if self.degraded.is_some() {
            return;
        }
        if let Err(e) = self.store.save() {
            error!(error = %e, "failed to save job table");
        }
    }

    fn append_log(&self, job: &Job, ts_ms: i64, result: &RunResult) {
        let entry = RunLogEntry::from_result(job, ts_ms, result);
        if let Err(e) = self.store.append_run(&entry) {
            warn!(job_id = %job.id, error = %e, "failed to append run log entry");
        }
    }

    /// Arm the single timer for the earliest wake: the next due idle job, or
    /// the moment an in-flight marker turns stuck.
    fn arm(&mut self) {
        if self.degraded.is_some() {
            self.timer.cancel();
            return;
        }
        let threshold = i64::try_from(self.settings.stuck_threshold_ms).unwrap_or(i64::MAX);
        let jobs = self.store.list_jobs();
        let wake = next_wake_across_jobs(jobs.iter().filter(|j| !j.is_running()));
        let stuck_check = jobs
            .iter()
            .filter_map(|j| j.state.running_at_ms)
            .map(|t| t.saturating_add(threshold))
            .min();
        let deadline = [wake, stuck_check].into_iter().flatten().min();
        self.timer.arm(deadline);
        debug!(next_wake = ?deadline, "timer armed");
    }
}

fn validate_definition(
    name: &str,
    route: &str,
    payload: &crate::types::Payload,
    max_chars: usize,
) -> Result<()> {
    if name.trim().is_empty() {
        return Err(SchedulerError::InvalidArgument("name must not be empty".to_string()));
    }
    if route.trim().is_empty() {
        return Err(SchedulerError::InvalidArgument("route must not be empty".to_string()));
    }
    if payload.text().trim().is_empty() {
        return Err(SchedulerError::InvalidArgument(
            "payload text must not be empty".to_string(),
        ));
    }
    if max_chars == 0 {
        return Err(SchedulerError::InvalidArgument(
            "delivery.maxChars must be positive".to_string(),
        ));
    }
    Ok(())
}

fn with_route_warning(result: OpResult, job: &Job) -> OpResult {
    match job.state.route_status {
        RouteStatus::Valid => result,
        RouteStatus::Invalid => result.with_warning(
            ErrorCode::RouteInactive,
            format!("route {} is not active; runs will be skipped", job.route),
        ),
        RouteStatus::Orphaned => result.with_warning(
            ErrorCode::RouteNotFound,
            format!("route {} does not exist; the job will not fire", job.route),
        ),
    }
}
