//! Executes one job snapshot against the collaborators and folds every
//! outcome into a [`RunResult`]. Nothing returned from here is a raw error.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use nudge_core::{MessageRelay, NudgeError, RouteResolver, RouteState, SessionBackend};
use tracing::{debug, info, instrument, warn};

use crate::types::{
    DeliveryMode, ErrorCode, Job, OutputDigest, RouteStatus, RunResult, SessionTarget,
};

/// Appended to a relayed reply that was cut short.
pub const TRUNCATION_MARKER: &str = "\n…[truncated]";

pub struct JobExecutor {
    resolver: Arc<dyn RouteResolver>,
    sessions: Arc<dyn SessionBackend>,
    relay: Arc<dyn MessageRelay>,
    reply_timeout: Duration,
}

impl JobExecutor {
    pub fn new(
        resolver: Arc<dyn RouteResolver>,
        sessions: Arc<dyn SessionBackend>,
        relay: Arc<dyn MessageRelay>,
        reply_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            sessions,
            relay,
            reply_timeout,
        }
    }

    pub fn resolver(&self) -> &Arc<dyn RouteResolver> {
        &self.resolver
    }

    #[instrument(skip_all, fields(job_id = %job.id, route = %job.route, target = %job.session_target))]
    pub async fn execute(&self, job: &Job) -> RunResult {
        let started = Instant::now();
        let mut result = self.run_steps(job).await;
        result.duration_ms = elapsed_ms(started);
        debug!(status = %result.status, duration_ms = result.duration_ms, "job executed");
        result
    }

    async fn run_steps(&self, job: &Job) -> RunResult {
        // 1. Preconditions; no collaborator is contacted.
        match job.state.route_status {
            RouteStatus::Orphaned => {
                return RunResult::error(
                    ErrorCode::RouteNotFound,
                    format!("route {} no longer exists", job.route),
                    0,
                )
            }
            RouteStatus::Invalid => {
                return RunResult::skipped(
                    ErrorCode::RouteInactive,
                    format!("route {} is not active", job.route),
                    0,
                )
            }
            RouteStatus::Valid => {}
        }
        let text = job.payload.text();
        if text.trim().is_empty() {
            return RunResult::error(ErrorCode::PayloadEmpty, "payload text is empty", 0);
        }

        // 2. Resolve the session.
        let route = match self.resolver.resolve_route(&job.route).await {
            Ok(Some(route)) => route,
            Ok(None) => {
                return RunResult::error(
                    ErrorCode::RouteNotFound,
                    format!("route {} no longer exists", job.route),
                    0,
                )
            }
            Err(e) => {
                warn!(job_id = %job.id, route = %job.route, error = %e, "route lookup failed");
                return RunResult::error(ErrorCode::RouteLookupFailed, e.to_string(), 0);
            }
        };
        if route.state != RouteState::Active {
            return RunResult::skipped(
                ErrorCode::RouteInactive,
                format!("route {} is {}", job.route, route.state),
                0,
            );
        }

        let session_ref = match job.session_target {
            SessionTarget::Main => route.session_ref.clone(),
            SessionTarget::Isolated => job.isolated_session_ref(&route.session_ref),
        };
        if let Err(result) = self
            .prepare_session(job.session_target, &session_ref, route.workspace.as_deref())
            .await
        {
            if job.session_target == SessionTarget::Isolated {
                self.teardown_quietly(&session_ref).await;
            }
            return result;
        }

        // 3. Deliver and capture the reply.
        let reply = self
            .sessions
            .send_and_receive(&session_ref, text, self.reply_timeout)
            .await;

        if job.session_target == SessionTarget::Isolated {
            self.teardown_quietly(&session_ref).await;
        }

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => return RunResult::error(ErrorCode::SessionUnreachable, e.to_string(), 0),
        };

        // 4. Optional relay.
        let mut result = RunResult::ok(0);
        result.output = Some(OutputDigest::of(&reply));

        if job.delivery.mode == DeliveryMode::Reply {
            let (relayed, cut) = truncate_reply(&reply, job.delivery.max_chars);
            if cut {
                result = result.with_warning(
                    ErrorCode::OutputTruncated,
                    format!("reply cut to {} chars", job.delivery.max_chars),
                );
            }
            if let Err(e) = self.relay.relay(&job.route, &relayed).await {
                if job.delivery.best_effort {
                    warn!(error = %e, "relay failed, run still counted ok");
                    result = result.with_warning(ErrorCode::RelayFailed, e.to_string());
                } else {
                    let mut failed = RunResult::error(ErrorCode::RelayFailed, e.to_string(), 0);
                    failed.output = result.output;
                    failed.warnings = result.warnings;
                    return failed;
                }
            }
        }

        result
    }

    /// `main` gets a best-effort start when dead. `isolated` always starts
    /// fresh in the route's workspace.
    async fn prepare_session(
        &self,
        target: SessionTarget,
        session_ref: &str,
        workspace: Option<&str>,
    ) -> Result<(), RunResult> {
        if target == SessionTarget::Main {
            match self.sessions.is_alive(session_ref).await {
                Ok(true) => return Ok(()),
                Ok(false) => info!(session = %session_ref, "main session not running, starting it"),
                Err(e) => return Err(start_failure(e)),
            }
        }
        self.sessions
            .ensure_started(session_ref, workspace)
            .await
            .map_err(start_failure)
    }

    /// Tear down the disposable session of an isolated job, if its route still
    /// resolves. Used after an executor timeout and during recovery.
    pub async fn cleanup_isolated(&self, job: &Job) -> Option<String> {
        if job.session_target != SessionTarget::Isolated {
            return None;
        }
        let base = match self.resolver.resolve_route(&job.route).await {
            Ok(Some(route)) => route.session_ref,
            Ok(None) => {
                warn!(job_id = %job.id, route = %job.route, "cannot name isolated session, route is gone");
                return None;
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "cannot name isolated session");
                return None;
            }
        };
        let session_ref = job.isolated_session_ref(&base);
        self.teardown_quietly(&session_ref).await;
        Some(session_ref)
    }

    async fn teardown_quietly(&self, session_ref: &str) {
        if let Err(e) = self.sessions.teardown(session_ref).await {
            warn!(session = %session_ref, error = %e, "isolated session teardown failed");
        }
    }
}

fn start_failure(e: NudgeError) -> RunResult {
    let code = match e {
        NudgeError::SessionUnavailable(_) => ErrorCode::SessionBackendMissing,
        _ => ErrorCode::SessionStartFailed,
    };
    RunResult::error(code, e.to_string(), 0)
}

/// Keep the first `max_chars` characters; report whether anything was cut.
pub fn truncate_reply(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        None => (text.to_string(), false),
        Some((byte_idx, _)) => (format!("{}{TRUNCATION_MARKER}", &text[..byte_idx]), true),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
