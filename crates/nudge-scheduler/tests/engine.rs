use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use nudge_core::{MessageRelay, NudgeError, ResolvedRoute, RouteResolver, RouteState, SessionBackend};
use nudge_scheduler::{
    engine::EngineSettings, Clock, Delivery, DeliveryMode, DeliveryPatch, ErrorCode, Job,
    JobExecutor, JobOp, JobPatch, JobStore, ManualClock, NewJob, OpStatus, Payload, RouteStatus,
    RunLogEntry, RunStatus, Schedule, SchedulerEngine, SchedulerHandle, SessionTarget,
};
use tempfile::TempDir;

const HOUR: i64 = 3_600_000;
/// 2024-03-01T00:00:00Z
const T0: i64 = 1_709_251_200_000;

// --- fakes ----------------------------------------------------------------

#[derive(Default)]
struct FakeRoutes {
    routes: Mutex<HashMap<String, ResolvedRoute>>,
    broken: Mutex<bool>,
}

impl FakeRoutes {
    fn with(self, route: &str, session: &str, state: RouteState) -> Self {
        self.routes.lock().unwrap().insert(
            route.to_string(),
            ResolvedRoute {
                session_ref: session.to_string(),
                state,
                workspace: Some("/tmp".to_string()),
            },
        );
        self
    }
}

#[async_trait]
impl RouteResolver for FakeRoutes {
    async fn resolve_route(&self, route_ref: &str) -> nudge_core::Result<Option<ResolvedRoute>> {
        if *self.broken.lock().unwrap() {
            return Err(NudgeError::Routing("registry file is malformed".to_string()));
        }
        Ok(self.routes.lock().unwrap().get(route_ref).cloned())
    }
}

#[derive(Default)]
struct FakeSessions {
    alive: Mutex<HashSet<String>>,
    started: Mutex<Vec<String>>,
    sent: Mutex<Vec<(String, String)>>,
    torn_down: Mutex<Vec<String>>,
    reply: String,
    delay: Option<Duration>,
}

#[async_trait]
impl SessionBackend for FakeSessions {
    async fn is_alive(&self, session_ref: &str) -> nudge_core::Result<bool> {
        Ok(self.alive.lock().unwrap().contains(session_ref))
    }

    async fn ensure_started(&self, session_ref: &str, _workspace: Option<&str>) -> nudge_core::Result<()> {
        self.started.lock().unwrap().push(session_ref.to_string());
        self.alive.lock().unwrap().insert(session_ref.to_string());
        Ok(())
    }

    async fn send_and_receive(
        &self,
        session_ref: &str,
        text: &str,
        _timeout: Duration,
    ) -> nudge_core::Result<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sent
            .lock()
            .unwrap()
            .push((session_ref.to_string(), text.to_string()));
        Ok(self.reply.clone())
    }

    async fn teardown(&self, session_ref: &str) -> nudge_core::Result<()> {
        self.alive.lock().unwrap().remove(session_ref);
        self.torn_down.lock().unwrap().push(session_ref.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct FakeRelay {
    fail: bool,
    relayed: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl MessageRelay for FakeRelay {
    async fn relay(&self, route_ref: &str, text: &str) -> nudge_core::Result<()> {
        if self.fail {
            return Err(NudgeError::Relay {
                route: route_ref.to_string(),
                reason: "gateway returned 502".to_string(),
            });
        }
        self.relayed
            .lock()
            .unwrap()
            .push((route_ref.to_string(), text.to_string()));
        Ok(())
    }
}

// --- harness --------------------------------------------------------------

struct Harness {
    dir: TempDir,
    clock: Arc<ManualClock>,
    routes: Arc<FakeRoutes>,
    sessions: Arc<FakeSessions>,
    relay: Arc<FakeRelay>,
    settings: EngineSettings,
}

impl Harness {
    fn new() -> Self {
        Self::with(FakeSessions::default(), FakeRelay::default())
    }

    fn with(mut sessions: FakeSessions, relay: FakeRelay) -> Self {
        let routes = FakeRoutes::default()
            .with("chat-1", "agent-1", RouteState::Active)
            .with("chat-paused", "agent-2", RouteState::Paused);
        if sessions.reply.is_empty() {
            sessions.reply = "all green".to_string();
        }
        sessions.alive.lock().unwrap().insert("agent-1".to_string());
        Self {
            dir: tempfile::tempdir().unwrap(),
            clock: Arc::new(ManualClock::new(T0)),
            routes: Arc::new(routes),
            sessions: Arc::new(sessions),
            relay: Arc::new(relay),
            settings: EngineSettings {
                stuck_threshold_ms: 2 * HOUR as u64,
                exec_timeout_ms: 5_000,
                retention: None,
            },
        }
    }

    fn store(&self) -> JobStore {
        JobStore::new(self.jobs_path(), self.dir.path().join("runs.jsonl"))
    }

    fn jobs_path(&self) -> std::path::PathBuf {
        self.dir.path().join("jobs.json")
    }

    fn engine(&self) -> SchedulerEngine {
        let executor = JobExecutor::new(
            self.routes.clone(),
            self.sessions.clone(),
            self.relay.clone(),
            Duration::from_secs(1),
        );
        let clock: Arc<dyn Clock> = self.clock.clone();
        SchedulerEngine::new(self.store(), executor, clock, self.settings.clone())
    }

    fn runs(&self) -> Vec<RunLogEntry> {
        self.store().read_runs(None, usize::MAX).unwrap()
    }

    fn seed(&self, jobs: Vec<Job>) {
        let mut store = self.store();
        for job in jobs {
            store.upsert_job(job).unwrap();
        }
    }
}

fn new_job(name: &str, route: &str, schedule: Schedule) -> NewJob {
    NewJob {
        name: name.to_string(),
        description: String::new(),
        route: route.to_string(),
        schedule,
        session_target: SessionTarget::Main,
        payload: Payload::TmuxMessage {
            text: format!("wake up: {name}"),
        },
        delivery: Delivery::default(),
        enabled: true,
    }
}

fn every_hour() -> Schedule {
    Schedule::Every {
        every_ms: HOUR,
        anchor_ms: T0,
    }
}

async fn add(engine: &mut SchedulerEngine, new: NewJob) -> Job {
    let result = engine.apply(JobOp::Add(new)).await;
    assert_eq!(result.status, OpStatus::Ok, "{result:?}");
    serde_json::from_value(result.data).unwrap()
}

fn read_file(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

// --- recovery -------------------------------------------------------------

#[tokio::test]
async fn recovery_twice_yields_identical_table() {
    let h = Harness::new();

    let mut in_flight = Job::new(new_job("in-flight", "chat-1", every_hour()), T0 - HOUR);
    in_flight.state.running_at_ms = Some(T0 - 60_000);
    in_flight.state.next_run_at_ms = Some(T0 - 60_000);
    let mut stale_future = Job::new(new_job("future", "chat-1", every_hour()), T0 - HOUR);
    stale_future.state.next_run_at_ms = Some(T0 + 99 * HOUR);
    let mut gone = Job::new(new_job("gone", "chat-deleted", every_hour()), T0 - HOUR);
    gone.state.next_run_at_ms = Some(T0 + HOUR);
    h.seed(vec![in_flight.clone(), stale_future.clone(), gone.clone()]);

    h.clock.set(T0 + 30 * 60_000);
    let mut first = h.engine();
    first.recover().await.unwrap();
    let after_first = read_file(&h.jobs_path());

    let mut second = h.engine();
    second.recover().await.unwrap();
    let after_second = read_file(&h.jobs_path());
    assert_eq!(after_first, after_second);

    let jobs = second.jobs();
    let by_name = |n: &str| jobs.iter().find(|j| j.name == n).unwrap();
    assert!(!by_name("in-flight").is_running());
    assert_eq!(by_name("in-flight").state.last_error_code, Some(ErrorCode::RunAborted));
    // The interrupted slot is spent; the next one is on the anchor grid.
    assert_eq!(by_name("in-flight").state.next_run_at_ms, Some(T0 + HOUR));
    // Future value recomputed onto the anchor grid.
    assert_eq!(by_name("future").state.next_run_at_ms, Some(T0 + HOUR));
    assert_eq!(by_name("gone").state.route_status, RouteStatus::Orphaned);

    let aborted: Vec<_> = h
        .runs()
        .into_iter()
        .filter(|e| e.error_code == Some(ErrorCode::RunAborted))
        .collect();
    assert_eq!(aborted.len(), 1);
    assert_eq!(aborted[0].job_id, in_flight.id);
}

#[tokio::test]
async fn interrupted_slot_is_not_fired_again_after_restart() {
    let h = Harness::new();
    let mut job = Job::new(new_job("interrupted", "chat-1", every_hour()), T0);
    job.state.running_at_ms = Some(T0 + HOUR);
    job.state.next_run_at_ms = Some(T0 + HOUR);
    h.seed(vec![job]);

    h.clock.set(T0 + HOUR + 60_000);
    let mut engine = h.engine();
    engine.recover().await.unwrap();
    assert_eq!(engine.jobs()[0].state.next_run_at_ms, Some(T0 + 2 * HOUR));
    assert_eq!(engine.timer().deadline(), Some(T0 + 2 * HOUR));

    assert_eq!(engine.tick().await, 0);
    assert!(h.sessions.sent.lock().unwrap().is_empty());

    h.clock.set(T0 + 2 * HOUR);
    assert_eq!(engine.tick().await, 1);
    assert_eq!(h.sessions.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn interrupted_one_shot_is_disabled_after_restart() {
    let h = Harness::new();
    let mut job = Job::new(
        new_job("once", "chat-1", Schedule::At { at_ms: T0 + HOUR }),
        T0,
    );
    job.state.running_at_ms = Some(T0 + HOUR);
    job.state.next_run_at_ms = Some(T0 + HOUR);
    h.seed(vec![job]);

    h.clock.set(T0 + HOUR + 60_000);
    let mut engine = h.engine();
    engine.recover().await.unwrap();

    let job = &engine.jobs()[0];
    assert!(!job.enabled);
    assert_eq!(job.state.next_run_at_ms, None);
    assert_eq!(engine.tick().await, 0);
    assert!(h.sessions.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missed_fire_runs_once_after_restart() {
    let h = Harness::new();
    let mut missed = Job::new(new_job("missed", "chat-1", every_hour()), T0);
    missed.state.next_run_at_ms = Some(T0 + HOUR);
    h.seed(vec![missed.clone()]);

    // Down for five slots.
    h.clock.set(T0 + 5 * HOUR + 10);
    let mut engine = h.engine();
    engine.recover().await.unwrap();
    assert_eq!(engine.timer().deadline(), Some(T0 + HOUR));

    assert_eq!(engine.tick().await, 1);
    assert_eq!(engine.tick().await, 0);
    assert_eq!(engine.jobs()[0].state.next_run_at_ms, Some(T0 + 6 * HOUR));
    assert_eq!(h.runs().len(), 1);
}

#[tokio::test]
async fn isolated_run_interrupted_by_restart_is_torn_down() {
    let h = Harness::new();
    let mut job = Job::new(
        NewJob {
            session_target: SessionTarget::Isolated,
            ..new_job("iso", "chat-1", every_hour())
        },
        T0,
    );
    job.state.running_at_ms = Some(T0);
    h.seed(vec![job.clone()]);

    let mut engine = h.engine();
    engine.recover().await.unwrap();

    let expected = job.isolated_session_ref("agent-1");
    assert_eq!(*h.sessions.torn_down.lock().unwrap(), vec![expected]);
    let codes: Vec<_> = h.runs().iter().filter_map(|e| e.error_code).collect();
    assert_eq!(codes, vec![ErrorCode::RunAborted, ErrorCode::IsolatedTeardown]);
}

#[tokio::test]
async fn corrupt_table_degrades_without_overwriting() {
    let h = Harness::new();
    std::fs::write(h.jobs_path(), "{\"version\":1,\"jobs\":[{").unwrap();

    let mut engine = h.engine();
    assert!(engine.recover().await.is_err());
    assert!(engine.degraded().is_some());
    assert_eq!(engine.timer().deadline(), None);

    let refused = engine
        .apply(JobOp::Add(new_job("x", "chat-1", every_hour())))
        .await;
    assert_eq!(refused.code, Some(ErrorCode::SchedulerDegraded));
    assert_eq!(refused.exit_code(), 3);

    let summary = engine.apply(JobOp::Summary).await;
    assert_eq!(summary.status, OpStatus::Ok);
    assert!(summary.data["degraded"].is_string());

    assert_eq!(engine.tick().await, 0);
    assert_eq!(read_file(&h.jobs_path()), "{\"version\":1,\"jobs\":[{");
}

// --- stuck detection ------------------------------------------------------

#[tokio::test]
async fn stuck_run_is_cleared_and_rescheduled() {
    let h = Harness::new();
    let mut engine = h.engine();
    engine.recover().await.unwrap();

    // Another writer left a run marker three hours old.
    let mut stuck = Job::new(new_job("stuck", "chat-1", every_hour()), T0);
    stuck.state.running_at_ms = Some(T0);
    stuck.state.next_run_at_ms = Some(T0);
    h.seed(vec![stuck.clone()]);
    assert_eq!(engine.apply(JobOp::Reload).await.status, OpStatus::Ok);
    assert_eq!(engine.timer().deadline(), Some(T0 + 2 * HOUR));

    h.clock.set(T0 + 3 * HOUR);
    engine.tick().await;

    let job = &engine.jobs()[0];
    assert!(!job.is_running());
    assert_eq!(job.state.last_error_code, Some(ErrorCode::StuckCleared));
    assert_eq!(job.state.next_run_at_ms, Some(T0 + 4 * HOUR));

    let runs = h.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].error_code, Some(ErrorCode::StuckCleared));

    h.clock.set(T0 + 4 * HOUR);
    assert_eq!(engine.tick().await, 1);
}

#[tokio::test]
async fn stuck_isolated_run_is_torn_down() {
    let h = Harness::new();
    let mut engine = h.engine();
    engine.recover().await.unwrap();

    let mut stuck = Job::new(
        NewJob {
            session_target: SessionTarget::Isolated,
            ..new_job("iso-stuck", "chat-1", every_hour())
        },
        T0,
    );
    stuck.state.running_at_ms = Some(T0);
    h.seed(vec![stuck.clone()]);
    assert_eq!(engine.apply(JobOp::Reload).await.status, OpStatus::Ok);

    h.clock.set(T0 + 3 * HOUR);
    engine.tick().await;

    assert_eq!(
        *h.sessions.torn_down.lock().unwrap(),
        vec![stuck.isolated_session_ref("agent-1")]
    );
    let codes: Vec<_> = h.runs().iter().filter_map(|e| e.error_code).collect();
    assert_eq!(codes, vec![ErrorCode::StuckCleared, ErrorCode::IsolatedTeardown]);
}

// --- firing ---------------------------------------------------------------

#[tokio::test]
async fn same_millisecond_jobs_run_in_id_order() {
    let h = Harness::new();
    let mut engine = h.engine();
    engine.recover().await.unwrap();

    let at = Schedule::At { at_ms: T0 + 1_000 };
    let a = add(&mut engine, new_job("a", "chat-1", at.clone())).await;
    let b = add(&mut engine, new_job("b", "chat-1", at)).await;
    assert_eq!(engine.timer().deadline(), Some(T0 + 1_000));

    h.clock.set(T0 + 1_000);
    assert_eq!(engine.tick().await, 2);

    let mut expected = vec![a.id.clone(), b.id.clone()];
    expected.sort();
    let logged: Vec<_> = h.runs().into_iter().map(|e| e.job_id).collect();
    assert_eq!(logged, expected);
    assert_eq!(h.sessions.sent.lock().unwrap().len(), 2);

    // Successful one-shots are retired.
    assert!(engine.jobs().iter().all(|j| !j.enabled && j.state.next_run_at_ms.is_none()));
    assert_eq!(engine.timer().deadline(), None);
}

#[tokio::test]
async fn best_effort_relay_failure_still_counts_ok() {
    let h = Harness::with(
        FakeSessions::default(),
        FakeRelay {
            fail: true,
            ..Default::default()
        },
    );
    let mut engine = h.engine();
    engine.recover().await.unwrap();

    let job = add(
        &mut engine,
        NewJob {
            delivery: Delivery {
                mode: DeliveryMode::Reply,
                best_effort: true,
                max_chars: 100,
            },
            ..new_job("standup", "chat-1", every_hour())
        },
    )
    .await;

    h.clock.set(T0 + HOUR);
    assert_eq!(engine.tick().await, 1);

    let stored = engine.jobs().iter().find(|j| j.id == job.id).unwrap();
    assert_eq!(stored.state.last_status, RunStatus::Ok);
    let runs = h.runs();
    assert_eq!(runs[0].status, RunStatus::Ok);
    assert_eq!(runs[0].warnings[0].code, ErrorCode::RelayFailed);
    assert!(runs[0].output.is_some());
}

#[tokio::test]
async fn strict_relay_failure_is_an_error() {
    let h = Harness::with(
        FakeSessions::default(),
        FakeRelay {
            fail: true,
            ..Default::default()
        },
    );
    let mut engine = h.engine();
    engine.recover().await.unwrap();
    add(
        &mut engine,
        NewJob {
            delivery: Delivery {
                mode: DeliveryMode::Reply,
                best_effort: false,
                max_chars: 100,
            },
            ..new_job("strict", "chat-1", every_hour())
        },
    )
    .await;

    h.clock.set(T0 + HOUR);
    engine.tick().await;
    let job = &engine.jobs()[0];
    assert_eq!(job.state.last_status, RunStatus::Error);
    assert_eq!(job.state.last_error_code, Some(ErrorCode::RelayFailed));
    assert_eq!(job.state.next_run_at_ms, Some(T0 + 2 * HOUR));
}

#[tokio::test]
async fn long_reply_is_truncated_before_relay() {
    let h = Harness::with(
        FakeSessions {
            reply: "x".repeat(50),
            ..Default::default()
        },
        FakeRelay::default(),
    );
    let mut engine = h.engine();
    engine.recover().await.unwrap();
    add(
        &mut engine,
        NewJob {
            delivery: Delivery {
                mode: DeliveryMode::Reply,
                best_effort: true,
                max_chars: 10,
            },
            ..new_job("chatty", "chat-1", every_hour())
        },
    )
    .await;

    h.clock.set(T0 + HOUR);
    engine.tick().await;

    let relayed = h.relay.relayed.lock().unwrap().clone();
    assert_eq!(relayed.len(), 1);
    assert!(relayed[0].1.starts_with(&"x".repeat(10)));
    assert!(relayed[0].1.contains("truncated"));
    let runs = h.runs();
    assert_eq!(runs[0].warnings[0].code, ErrorCode::OutputTruncated);
    // Digest describes the full reply; the raw text is never logged.
    assert_eq!(runs[0].output.as_ref().unwrap().chars, 50);
    assert!(!read_file(&h.dir.path().join("runs.jsonl")).contains("xxxxxxxxxx"));
}

#[tokio::test]
async fn exhausted_one_shot_is_flagged_and_never_fires() {
    let h = Harness::new();
    let mut engine = h.engine();
    engine.recover().await.unwrap();

    let result = engine
        .apply(JobOp::Add(new_job(
            "late",
            "chat-1",
            Schedule::At { at_ms: T0 - 1 },
        )))
        .await;
    assert_eq!(result.status, OpStatus::Ok);
    assert_eq!(result.warnings[0].code, ErrorCode::ScheduleExhausted);
    let job: Job = serde_json::from_value(result.data).unwrap();
    assert!(!job.enabled);
    assert_eq!(job.state.next_run_at_ms, None);

    h.clock.set(T0 + 10 * HOUR);
    assert_eq!(engine.tick().await, 0);
    assert!(h.runs().is_empty());
}

#[tokio::test]
async fn orphaned_route_is_never_selected() {
    let h = Harness::new();
    let mut engine = h.engine();
    engine.recover().await.unwrap();

    let result = engine
        .apply(JobOp::Add(new_job("orphan", "chat-missing", every_hour())))
        .await;
    assert_eq!(result.warnings[0].code, ErrorCode::RouteNotFound);
    assert_eq!(engine.timer().deadline(), None);

    h.clock.set(T0 + 3 * HOUR);
    assert_eq!(engine.tick().await, 0);
    assert_eq!(engine.summary().orphaned, 1);
}

#[tokio::test]
async fn routing_outage_is_not_reported_as_missing_route() {
    let h = Harness::new();
    let mut engine = h.engine();
    engine.recover().await.unwrap();
    let job = add(&mut engine, new_job("j", "chat-1", every_hour())).await;

    *h.routes.broken.lock().unwrap() = true;
    h.clock.set(T0 + HOUR);
    assert_eq!(engine.tick().await, 1);

    let job = engine.jobs().iter().find(|j| j.id == job.id).unwrap();
    assert_eq!(job.state.last_error_code, Some(ErrorCode::RouteLookupFailed));
    assert_eq!(job.state.route_status, RouteStatus::Valid);
    assert_eq!(job.state.next_run_at_ms, Some(T0 + 2 * HOUR));
    assert!(h.sessions.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn paused_route_run_is_skipped() {
    let h = Harness::new();
    let mut engine = h.engine();
    engine.recover().await.unwrap();
    add(&mut engine, new_job("paused", "chat-paused", every_hour())).await;

    h.clock.set(T0 + HOUR);
    assert_eq!(engine.tick().await, 1);

    let job = &engine.jobs()[0];
    assert_eq!(job.state.last_status, RunStatus::Skipped);
    assert_eq!(job.state.last_error_code, Some(ErrorCode::RouteInactive));
    assert_eq!(job.state.route_status, RouteStatus::Invalid);
    assert!(h.sessions.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn dead_main_session_is_started_first() {
    let h = Harness::new();
    h.sessions.alive.lock().unwrap().clear();
    let mut engine = h.engine();
    engine.recover().await.unwrap();
    add(&mut engine, new_job("wake", "chat-1", every_hour())).await;

    h.clock.set(T0 + HOUR);
    engine.tick().await;
    assert_eq!(*h.sessions.started.lock().unwrap(), vec!["agent-1".to_string()]);
    assert_eq!(engine.jobs()[0].state.last_status, RunStatus::Ok);
}

#[tokio::test]
async fn isolated_run_uses_disposable_session() {
    let h = Harness::new();
    let mut engine = h.engine();
    engine.recover().await.unwrap();
    let job = add(
        &mut engine,
        NewJob {
            session_target: SessionTarget::Isolated,
            ..new_job("iso", "chat-1", every_hour())
        },
    )
    .await;

    h.clock.set(T0 + HOUR);
    engine.tick().await;

    let iso = job.isolated_session_ref("agent-1");
    assert_eq!(h.sessions.sent.lock().unwrap()[0].0, iso);
    assert_eq!(*h.sessions.torn_down.lock().unwrap(), vec![iso]);
}

#[tokio::test]
async fn executor_timeout_clears_running_marker() {
    let mut h = Harness::with(
        FakeSessions {
            delay: Some(Duration::from_secs(5)),
            ..Default::default()
        },
        FakeRelay::default(),
    );
    h.settings.exec_timeout_ms = 50;
    let mut engine = h.engine();
    engine.recover().await.unwrap();
    add(&mut engine, new_job("slow", "chat-1", every_hour())).await;

    h.clock.set(T0 + HOUR);
    engine.tick().await;

    let job = &engine.jobs()[0];
    assert!(!job.is_running());
    assert_eq!(job.state.last_error_code, Some(ErrorCode::ExecTimeout));
    assert_eq!(job.state.next_run_at_ms, Some(T0 + 2 * HOUR));
}

// --- operations -----------------------------------------------------------

#[tokio::test]
async fn edit_reschedules_and_validates() {
    let h = Harness::new();
    let mut engine = h.engine();
    engine.recover().await.unwrap();
    let job = add(&mut engine, new_job("j", "chat-1", every_hour())).await;

    let bad = engine
        .apply(JobOp::Edit {
            id: job.id.clone(),
            patch: JobPatch {
                schedule: Some(Schedule::Cron {
                    expr: "0 9 * * *".into(),
                    tz: "Nowhere/Special".into(),
                }),
                ..Default::default()
            },
        })
        .await;
    assert_eq!(bad.code, Some(ErrorCode::ScheduleInvalid));
    assert!(bad.hint.is_some());

    let ok = engine
        .apply(JobOp::Edit {
            id: job.id.clone(),
            patch: JobPatch {
                schedule: Some(Schedule::Every {
                    every_ms: 10 * 60_000,
                    anchor_ms: T0,
                }),
                ..Default::default()
            },
        })
        .await;
    assert_eq!(ok.status, OpStatus::Ok);
    assert_eq!(engine.jobs()[0].state.next_run_at_ms, Some(T0 + 10 * 60_000));

    let empty = engine
        .apply(JobOp::Edit {
            id: job.id,
            patch: JobPatch::default(),
        })
        .await;
    assert_eq!(empty.exit_code(), 2);
}

#[tokio::test]
async fn delivery_edit_changes_only_given_fields() {
    let h = Harness::new();
    let mut engine = h.engine();
    engine.recover().await.unwrap();
    let job = add(
        &mut engine,
        NewJob {
            delivery: Delivery {
                mode: DeliveryMode::Reply,
                best_effort: false,
                max_chars: 2_000,
            },
            ..new_job("strict", "chat-1", every_hour())
        },
    )
    .await;

    let res = engine
        .apply(JobOp::Edit {
            id: job.id.clone(),
            patch: JobPatch {
                delivery: Some(DeliveryPatch {
                    max_chars: Some(500),
                    ..Default::default()
                }),
                ..Default::default()
            },
        })
        .await;
    assert_eq!(res.status, OpStatus::Ok, "{res:?}");

    let delivery = &engine.jobs()[0].delivery;
    assert_eq!(delivery.mode, DeliveryMode::Reply);
    assert!(!delivery.best_effort);
    assert_eq!(delivery.max_chars, 500);

    let noop = engine
        .apply(JobOp::Edit {
            id: job.id,
            patch: JobPatch {
                delivery: Some(DeliveryPatch::default()),
                ..Default::default()
            },
        })
        .await;
    assert_eq!(noop.exit_code(), 2);
}

#[tokio::test]
async fn disable_then_enable_and_remove() {
    let h = Harness::new();
    let mut engine = h.engine();
    engine.recover().await.unwrap();
    let job = add(&mut engine, new_job("j", "chat-1", every_hour())).await;

    engine.apply(JobOp::Disable { id: job.id.clone() }).await;
    assert_eq!(engine.timer().deadline(), None);

    h.clock.set(T0 + 90 * 60_000);
    engine.apply(JobOp::Enable { id: job.id.clone() }).await;
    assert_eq!(engine.timer().deadline(), Some(T0 + 2 * HOUR));

    let removed = engine.apply(JobOp::Remove { id: job.id.clone() }).await;
    assert_eq!(removed.status, OpStatus::Ok);
    assert!(engine.jobs().is_empty());

    let missing = engine.apply(JobOp::Remove { id: job.id }).await;
    assert_eq!(missing.code, Some(ErrorCode::JobNotFound));
    assert_eq!(missing.exit_code(), 1);
}

#[tokio::test]
async fn handle_drives_running_loop() {
    let h = Harness::new();
    let engine = h.engine();
    let (handle, commands) = SchedulerHandle::channel(8);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let task = tokio::spawn(engine.run(commands, shutdown_rx));

    let added = handle
        .request(JobOp::Add(new_job("via-handle", "chat-1", every_hour())))
        .await;
    assert_eq!(added.status, OpStatus::Ok);
    let job: Job = serde_json::from_value(added.data).unwrap();

    let ran = handle.request(JobOp::ForceRun { id: job.id.clone() }).await;
    assert_eq!(ran.status, OpStatus::Ok, "{ran:?}");

    let runs = handle
        .request(JobOp::Runs {
            job_id: Some(job.id),
            limit: 10,
        })
        .await;
    assert_eq!(runs.data.as_array().unwrap().len(), 1);

    shutdown_tx.send(true).unwrap();
    task.await.unwrap();

    let after = handle.request(JobOp::Summary).await;
    assert_eq!(after.code, Some(ErrorCode::SchedulerDegraded));
}
