use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Schema version written into every job table.
pub const TABLE_VERSION: u32 = 1;

/// Default cap on relayed reply length.
pub const DEFAULT_DELIVERY_MAX_CHARS: usize = 2_000;

/// Defines when a job fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Schedule {
    /// Fire once at an absolute instant (ms since the Unix epoch).
    At { at_ms: i64 },

    /// Fire on `anchor_ms + k * every_ms`, k >= 0.
    Every { every_ms: i64, anchor_ms: i64 },

    /// Crontab expression evaluated in the IANA timezone `tz`.
    Cron { expr: String, tz: String },
}

impl Schedule {
    pub fn kind(&self) -> &'static str {
        match self {
            Schedule::At { .. } => "at",
            Schedule::Every { .. } => "every",
            Schedule::Cron { .. } => "cron",
        }
    }

    pub fn is_one_shot(&self) -> bool {
        matches!(self, Schedule::At { .. })
    }
}

/// What gets delivered when a job fires. Closed on purpose: no command payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Payload {
    /// Text typed into the target session.
    #[serde(rename = "tmuxMessage")]
    TmuxMessage { text: String },
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::TmuxMessage { .. } => "tmuxMessage",
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Payload::TmuxMessage { text } => text,
        }
    }
}

/// Which session receives the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionTarget {
    /// The route's persistent session.
    #[default]
    Main,
    /// A disposable session created for this run and torn down afterwards.
    Isolated,
}

impl std::fmt::Display for SessionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionTarget::Main => write!(f, "main"),
            SessionTarget::Isolated => write!(f, "isolated"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Keep the reply local; nothing is relayed.
    #[default]
    None,
    /// Relay the session's reply through the messaging gateway.
    Reply,
}

/// Relay policy for the textual result of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    #[serde(default)]
    pub mode: DeliveryMode,
    /// A failed relay does not fail the run.
    #[serde(default = "bool_true")]
    pub best_effort: bool,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for Delivery {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::None,
            best_effort: true,
            max_chars: DEFAULT_DELIVERY_MAX_CHARS,
        }
    }
}

fn bool_true() -> bool {
    true
}

fn default_max_chars() -> usize {
    DEFAULT_DELIVERY_MAX_CHARS
}

/// Route health as last computed against the routing collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    #[default]
    Valid,
    /// The route exists but is not active.
    Invalid,
    /// The route no longer exists.
    Orphaned,
}

impl std::fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RouteStatus::Valid => "valid",
            RouteStatus::Invalid => "invalid",
            RouteStatus::Orphaned => "orphaned",
        };
        write!(f, "{s}")
    }
}

/// Outcome of the most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Never run yet.
    #[default]
    Pending,
    Ok,
    Skipped,
    Error,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Pending => "pending",
            RunStatus::Ok => "ok",
            RunStatus::Skipped => "skipped",
            RunStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Closed failure taxonomy. Every failure the scheduler can produce maps to
/// exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RouteNotFound,
    /// The routing collaborator itself failed; the route may still exist.
    RouteLookupFailed,
    RouteInactive,
    ScheduleInvalid,
    /// Warning: a one-shot whose time had already passed.
    ScheduleExhausted,
    PayloadEmpty,
    SessionBackendMissing,
    SessionStartFailed,
    SessionUnreachable,
    ExecTimeout,
    RelayFailed,
    /// Warning: the relayed text was cut to `delivery.maxChars`.
    OutputTruncated,
    StuckCleared,
    RunAborted,
    IsolatedTeardown,
    DataCorrupt,
    StoreIo,
    JobNotFound,
    InvalidArgument,
    SchedulerDegraded,
    /// A running daemon holds the state lease; direct writes are refused.
    DaemonActive,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::RouteNotFound => "ROUTE_NOT_FOUND",
            ErrorCode::RouteLookupFailed => "ROUTE_LOOKUP_FAILED",
            ErrorCode::RouteInactive => "ROUTE_INACTIVE",
            ErrorCode::ScheduleInvalid => "SCHEDULE_INVALID",
            ErrorCode::ScheduleExhausted => "SCHEDULE_EXHAUSTED",
            ErrorCode::PayloadEmpty => "PAYLOAD_EMPTY",
            ErrorCode::SessionBackendMissing => "SESSION_BACKEND_MISSING",
            ErrorCode::SessionStartFailed => "SESSION_START_FAILED",
            ErrorCode::SessionUnreachable => "SESSION_UNREACHABLE",
            ErrorCode::ExecTimeout => "EXEC_TIMEOUT",
            ErrorCode::RelayFailed => "RELAY_FAILED",
            ErrorCode::OutputTruncated => "OUTPUT_TRUNCATED",
            ErrorCode::StuckCleared => "STUCK_CLEARED",
            ErrorCode::RunAborted => "RUN_ABORTED",
            ErrorCode::IsolatedTeardown => "ISOLATED_TEARDOWN",
            ErrorCode::DataCorrupt => "DATA_CORRUPT",
            ErrorCode::StoreIo => "STORE_IO",
            ErrorCode::JobNotFound => "JOB_NOT_FOUND",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::SchedulerDegraded => "SCHEDULER_DEGRADED",
            ErrorCode::DaemonActive => "DAEMON_ACTIVE",
        }
    }

    /// Warnings annotate a run or operation without failing it.
    pub fn is_warning(&self) -> bool {
        matches!(self, ErrorCode::OutputTruncated | ErrorCode::ScheduleExhausted)
    }

    /// One-line operator hint surfaced next to the code.
    pub fn hint(&self) -> &'static str {
        match self {
            ErrorCode::RouteNotFound => "the route was removed; re-point the job or remove it",
            ErrorCode::RouteLookupFailed => "check routes.file; the job is retried at its next slot",
            ErrorCode::RouteInactive => "the route is paused or archived; reactivate it",
            ErrorCode::ScheduleInvalid => {
                "check the cron expression and use an IANA timezone such as Europe/Berlin"
            }
            ErrorCode::ScheduleExhausted => "the one-shot time is in the past; it will never fire",
            ErrorCode::PayloadEmpty => "give the job some text to send",
            ErrorCode::SessionBackendMissing => "install tmux or fix session.tmux_bin",
            ErrorCode::SessionStartFailed => "check session.start_command and the route workspace",
            ErrorCode::SessionUnreachable => "the session did not answer; inspect it with tmux attach",
            ErrorCode::ExecTimeout => "raise scheduler.exec_timeout_ms or shorten the prompt",
            ErrorCode::RelayFailed => "check relay.url and the gateway logs",
            ErrorCode::OutputTruncated => "raise delivery.maxChars to relay more text",
            ErrorCode::StuckCleared => "a run exceeded scheduler.stuck_threshold_ms and was reclaimed",
            ErrorCode::RunAborted => "the process stopped while this run was in flight",
            ErrorCode::IsolatedTeardown => "a disposable session left over from a crash was removed",
            ErrorCode::DataCorrupt => "jobs.json is malformed; restore it from a backup or fix it by hand",
            ErrorCode::StoreIo => "check permissions and free space in scheduler.state_dir",
            ErrorCode::JobNotFound => "list jobs to find the right id",
            ErrorCode::InvalidArgument => "see --help for the expected arguments",
            ErrorCode::SchedulerDegraded => "the job table failed to load; nothing will fire until it is fixed",
            ErrorCode::DaemonActive => "stop the running daemon first; read-only commands still work",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mutable run-state embedded in every job.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    #[serde(default)]
    pub route_status: RouteStatus,
    /// Cached calculator output. Written only by the scheduler.
    #[serde(default)]
    pub next_run_at_ms: Option<i64>,
    /// Set exactly while a run is in flight.
    #[serde(default)]
    pub running_at_ms: Option<i64>,
    #[serde(default)]
    pub last_run_at_ms: Option<i64>,
    #[serde(default)]
    pub last_status: RunStatus,
    #[serde(default)]
    pub last_error_code: Option<ErrorCode>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub last_duration_ms: Option<u64>,
}

/// A persisted, independently schedulable unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub enabled: bool,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Opaque reference to a conversation owned by the routing collaborator.
    pub route: String,
    pub schedule: Schedule,
    #[serde(default)]
    pub session_target: SessionTarget,
    pub payload: Payload,
    #[serde(default)]
    pub delivery: Delivery,
    #[serde(default)]
    pub state: RunState,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl Job {
    /// Build a fresh job; run-state is filled in by the scheduler.
    pub fn new(def: NewJob, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            enabled: def.enabled,
            name: def.name,
            description: def.description,
            route: def.route,
            schedule: def.schedule,
            session_target: def.session_target,
            payload: def.payload,
            delivery: def.delivery,
            state: RunState::default(),
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.running_at_ms.is_some()
    }

    /// Selected by the timer: enabled, route not gone, idle, and due at `now_ms`.
    pub fn is_due(&self, now_ms: i64) -> bool {
        self.enabled
            && self.state.route_status != RouteStatus::Orphaned
            && !self.is_running()
            && self.state.next_run_at_ms.is_some_and(|t| t <= now_ms)
    }

    /// Name of the disposable session used for isolated runs of this job.
    pub fn isolated_session_ref(&self, base_session_ref: &str) -> String {
        let short: String = self.id.chars().filter(|c| *c != '-').take(8).collect();
        format!("{base_session_ref}-iso-{short}")
    }
}

/// On-disk table: `{version, jobs}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTable {
    pub version: u32,
    #[serde(default)]
    pub jobs: Vec<Job>,
}

impl Default for JobTable {
    fn default() -> Self {
        Self {
            version: TABLE_VERSION,
            jobs: Vec::new(),
        }
    }
}

/// Everything needed to create a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub route: String,
    pub schedule: Schedule,
    #[serde(default)]
    pub session_target: SessionTarget,
    pub payload: Payload,
    #[serde(default)]
    pub delivery: Delivery,
    #[serde(default = "bool_true")]
    pub enabled: bool,
}

/// Partial update for an existing job. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub route: Option<String>,
    pub schedule: Option<Schedule>,
    pub session_target: Option<SessionTarget>,
    pub payload: Option<Payload>,
    pub delivery: Option<DeliveryPatch>,
}

impl JobPatch {
    pub fn is_empty(&self) -> bool {
        let JobPatch {
            name,
            description,
            route,
            schedule,
            session_target,
            payload,
            delivery,
        } = self;
        name.is_none()
            && description.is_none()
            && route.is_none()
            && schedule.is_none()
            && session_target.is_none()
            && payload.is_none()
            && delivery.as_ref().map_or(true, DeliveryPatch::is_empty)
    }
}

/// Field-wise change to a job's [`Delivery`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryPatch {
    pub mode: Option<DeliveryMode>,
    pub best_effort: Option<bool>,
    pub max_chars: Option<usize>,
}

impl DeliveryPatch {
    pub fn is_empty(&self) -> bool {
        *self == DeliveryPatch::default()
    }

    pub fn apply_to(&self, delivery: &mut Delivery) {
        if let Some(mode) = self.mode {
            delivery.mode = mode;
        }
        if let Some(best_effort) = self.best_effort {
            delivery.best_effort = best_effort;
        }
        if let Some(max_chars) = self.max_chars {
            delivery.max_chars = max_chars;
        }
    }
}

/// A non-fatal annotation on a run (truncation, best-effort relay failure).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunWarning {
    pub code: ErrorCode,
    pub message: String,
}

/// Content-free fingerprint of a reply. The raw text never reaches the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDigest {
    pub sha256: String,
    pub chars: usize,
}

impl OutputDigest {
    pub fn of(text: &str) -> Self {
        Self {
            sha256: hex::encode(Sha256::digest(text.as_bytes())),
            chars: text.chars().count(),
        }
    }
}

/// Typed outcome of one executor call. Collaborator errors never escape the
/// executor in any other form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub status: RunStatus,
    pub error_code: Option<ErrorCode>,
    pub error_message: Option<String>,
    pub duration_ms: u64,
    pub warnings: Vec<RunWarning>,
    pub output: Option<OutputDigest>,
}

impl RunResult {
    pub fn ok(duration_ms: u64) -> Self {
        Self {
            status: RunStatus::Ok,
            error_code: None,
            error_message: None,
            duration_ms,
            warnings: Vec::new(),
            output: None,
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            status: RunStatus::Error,
            error_code: Some(code),
            error_message: Some(message.into()),
            duration_ms,
            warnings: Vec::new(),
            output: None,
        }
    }

    pub fn skipped(code: ErrorCode, message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            status: RunStatus::Skipped,
            ..Self::error(code, message, duration_ms)
        }
    }

    pub fn with_warning(mut self, code: ErrorCode, message: impl Into<String>) -> Self {
        self.warnings.push(RunWarning {
            code,
            message: message.into(),
        });
        self
    }
}

/// One line of `runs.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunLogEntry {
    pub ts_ms: i64,
    pub job_id: String,
    pub route: String,
    pub session_target: SessionTarget,
    pub status: RunStatus,
    pub duration_ms: u64,
    pub error_code: Option<ErrorCode>,
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<RunWarning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputDigest>,
}

impl RunLogEntry {
    pub fn from_result(job: &Job, ts_ms: i64, result: &RunResult) -> Self {
        Self {
            ts_ms,
            job_id: job.id.clone(),
            route: job.route.clone(),
            session_target: job.session_target,
            status: result.status,
            duration_ms: result.duration_ms,
            error_code: result.error_code,
            error_message: result.error_message.clone(),
            warnings: result.warnings.clone(),
            output: result.output.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_wire_format_uses_camel_case() {
        let s = Schedule::Every {
            every_ms: 60_000,
            anchor_ms: 0,
        };
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, r#"{"kind":"every","everyMs":60000,"anchorMs":0}"#);

        let cron: Schedule =
            serde_json::from_str(r#"{"kind":"cron","expr":"0 9 * * *","tz":"UTC"}"#).unwrap();
        assert_eq!(cron.kind(), "cron");
    }

    #[test]
    fn cron_without_tz_is_rejected() {
        let r: Result<Schedule, _> = serde_json::from_str(r#"{"kind":"cron","expr":"0 9 * * *"}"#);
        assert!(r.is_err());
    }

    #[test]
    fn unknown_payload_kind_is_rejected() {
        let r: Result<Payload, _> = serde_json::from_str(r#"{"kind":"shell","cmd":"rm -rf /"}"#);
        assert!(r.is_err());
    }

    #[test]
    fn error_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::StuckCleared).unwrap();
        assert_eq!(json, r#""STUCK_CLEARED""#);
        assert_eq!(ErrorCode::StuckCleared.as_str(), "STUCK_CLEARED");
    }

    #[test]
    fn digest_hides_content() {
        let d = OutputDigest::of("secret reply");
        assert_eq!(d.chars, 12);
        assert_eq!(d.sha256.len(), 64);
        assert!(!d.sha256.contains("secret"));
    }

    #[test]
    fn isolated_session_ref_is_stable() {
        let job = Job::new(
            NewJob {
                name: "n".into(),
                description: String::new(),
                route: "r".into(),
                schedule: Schedule::At { at_ms: 1 },
                session_target: SessionTarget::Isolated,
                payload: Payload::TmuxMessage { text: "hi".into() },
                delivery: Delivery::default(),
                enabled: true,
            },
            0,
        );
        let a = job.isolated_session_ref("main");
        assert_eq!(a, job.isolated_session_ref("main"));
        assert!(a.starts_with("main-iso-"));
        assert_eq!(a.len(), "main-iso-".len() + 8);
    }
}
