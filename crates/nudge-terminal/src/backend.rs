//! `TmuxBackend`: the [`SessionBackend`] used in production.
//!
//! Delivery is request/reply over a terminal: capture the pane, type the
//! payload, then poll the pane until it stops changing for `settle_ms`. The
//! difference between the two captures is the reply.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use nudge_core::{config::SessionConfig, NudgeError, SessionBackend};
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{Result, TerminalError},
    reply::extract_reply,
    safety,
    tmux::Tmux,
    truncate,
};

pub struct TmuxBackend {
    tmux: Tmux,
    config: SessionConfig,
}

impl TmuxBackend {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            tmux: Tmux::new(config.tmux_bin.clone()),
            config,
        }
    }

    async fn start(&self, name: &str, workspace: Option<&str>) -> Result<()> {
        safety::check_session_name(name).map_err(TerminalError::InvalidInput)?;
        if self.tmux.has_session(name).await? {
            return Ok(());
        }
        if let Some(dir) = workspace {
            if !std::path::Path::new(dir).is_dir() {
                return Err(TerminalError::InvalidInput(format!(
                    "workspace {dir} is not a directory"
                )));
            }
        }
        self.tmux
            .new_session(name, workspace, self.config.start_command.as_deref())
            .await?;
        info!(session = %name, workspace = workspace.unwrap_or("-"), "tmux session started");
        Ok(())
    }

    async fn exchange(&self, name: &str, text: &str, timeout: Duration) -> Result<String> {
        safety::check_session_name(name).map_err(TerminalError::InvalidInput)?;
        safety::check_payload(text).map_err(TerminalError::InvalidInput)?;
        if !self.tmux.has_session(name).await? {
            return Err(TerminalError::SessionNotFound(name.to_string()));
        }

        let baseline = self.tmux.capture_pane(name).await?;
        self.tmux.send_text(name, text).await?;

        let poll = Duration::from_millis(self.config.poll_interval_ms.max(50));
        let settle = Duration::from_millis(self.config.settle_ms);
        let started = Instant::now();
        let mut last = baseline.clone();
        let mut last_change = Instant::now();

        loop {
            if started.elapsed() >= timeout {
                return Err(TerminalError::Timeout {
                    ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(poll).await;

            let current = self.tmux.capture_pane(name).await?;
            if current != last {
                last = current;
                last_change = Instant::now();
                continue;
            }
            if last != baseline && last_change.elapsed() >= settle {
                break;
            }
        }

        let plain = strip_ansi_escapes::strip_str(&last);
        let base_plain = strip_ansi_escapes::strip_str(&baseline);
        let reply = extract_reply(&base_plain, &plain, text);
        debug!(session = %name, chars = reply.chars().count(), elapsed_ms = started.elapsed().as_millis() as u64, "reply captured");
        Ok(truncate::cap_reply(&reply, self.config.max_reply_chars))
    }
}

#[async_trait]
impl SessionBackend for TmuxBackend {
    async fn is_alive(&self, session_ref: &str) -> nudge_core::Result<bool> {
        self.tmux
            .has_session(session_ref)
            .await
            .map_err(|e| e.into_nudge(session_ref))
    }

    #[instrument(skip(self))]
    async fn ensure_started(
        &self,
        session_ref: &str,
        workspace: Option<&str>,
    ) -> nudge_core::Result<()> {
        self.start(session_ref, workspace).await.map_err(|e| match e {
            TerminalError::BinaryMissing(_) => e.into_nudge(session_ref),
            other => NudgeError::SessionStart {
                session: session_ref.to_string(),
                reason: other.to_string(),
            },
        })
    }

    #[instrument(skip(self, text), fields(chars = text.chars().count()))]
    async fn send_and_receive(
        &self,
        session_ref: &str,
        text: &str,
        timeout: Duration,
    ) -> nudge_core::Result<String> {
        self.exchange(session_ref, text, timeout)
            .await
            .map_err(|e| e.into_nudge(session_ref))
    }

    async fn teardown(&self, session_ref: &str) -> nudge_core::Result<()> {
        match self.tmux.kill_session(session_ref).await {
            Ok(true) => {
                info!(session = %session_ref, "tmux session torn down");
                Ok(())
            }
            Ok(false) => {
                debug!(session = %session_ref, "nothing to tear down");
                Ok(())
            }
            Err(e) => {
                warn!(session = %session_ref, error = %e, "teardown failed");
                Err(e.into_nudge(session_ref))
            }
        }
    }
}
