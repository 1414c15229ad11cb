//! Thin async wrapper over the `tmux` CLI.

use std::{process::Stdio, time::Duration};

use tokio::process::Command as AsyncCommand;
use tracing::debug;

use crate::error::{Result, TerminalError};

/// Per-invocation budget for a single tmux command.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Scrollback lines included in a pane capture.
pub const CAPTURE_HISTORY_LINES: u32 = 2_000;

/// Output of one tmux invocation.
#[derive(Debug)]
pub struct TmuxOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs tmux subcommands against the configured binary.
#[derive(Debug, Clone)]
pub struct Tmux {
    bin: String,
}

impl Tmux {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }

    /// Run `tmux <args>` and collect its output. A non-zero exit is not an
    /// error here; callers decide what failure means.
    pub async fn run(&self, args: &[&str]) -> Result<TmuxOutput> {
        debug!(bin = %self.bin, ?args, "tmux");
        let child = AsyncCommand::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    TerminalError::BinaryMissing(self.bin.clone())
                }
                _ => TerminalError::IoError(e),
            })?;

        let output = tokio::time::timeout(COMMAND_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| TerminalError::Timeout {
                ms: COMMAND_TIMEOUT.as_millis() as u64,
            })??;

        Ok(TmuxOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// Like [`Tmux::run`] but a non-zero exit becomes `CommandFailed`.
    pub async fn run_ok(&self, args: &[&str]) -> Result<String> {
        let out = self.run(args).await?;
        if out.success {
            return Ok(out.stdout);
        }
        Err(TerminalError::CommandFailed {
            command: args.first().copied().unwrap_or("").to_string(),
            status: "non-zero exit".to_string(),
            stderr: out.stderr,
        })
    }

    pub async fn has_session(&self, name: &str) -> Result<bool> {
        let target = session_target(name);
        Ok(self.run(&["has-session", "-t", &target]).await?.success)
    }

    pub async fn new_session(
        &self,
        name: &str,
        workspace: Option<&str>,
        start_command: Option<&str>,
    ) -> Result<()> {
        let mut args = vec!["new-session", "-d", "-s", name];
        if let Some(dir) = workspace {
            args.extend(["-c", dir]);
        }
        if let Some(cmd) = start_command {
            args.push(cmd);
        }
        self.run_ok(&args).await.map(|_| ())
    }

    /// Visible pane plus scrollback, wrapped lines joined.
    pub async fn capture_pane(&self, name: &str) -> Result<String> {
        let target = pane_target(name);
        let start = format!("-{CAPTURE_HISTORY_LINES}");
        let out = self
            .run(&["capture-pane", "-p", "-J", "-t", &target, "-S", &start])
            .await?;
        if !out.success {
            return Err(TerminalError::SessionNotFound(name.to_string()));
        }
        Ok(out.stdout)
    }

    /// Type `text` literally, then press Enter.
    pub async fn send_text(&self, name: &str, text: &str) -> Result<()> {
        let target = pane_target(name);
        self.run_ok(&["send-keys", "-t", &target, "-l", text]).await?;
        self.run_ok(&["send-keys", "-t", &target, "Enter"]).await?;
        Ok(())
    }

    /// Returns `false` when there was nothing to kill.
    pub async fn kill_session(&self, name: &str) -> Result<bool> {
        let target = session_target(name);
        Ok(self.run(&["kill-session", "-t", &target]).await?.success)
    }
}

/// `=name` matches the session name exactly instead of by prefix.
fn session_target(name: &str) -> String {
    format!("={name}")
}

fn pane_target(name: &str) -> String {
    format!("={name}:")
}
