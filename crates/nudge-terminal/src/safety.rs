//! Input checks applied before anything reaches tmux.
//!
//! Payload text is sent with `send-keys -l`, so tmux never interprets it as
//! key names. What remains dangerous is text tmux cannot take literally
//! (NUL bytes) and session names that tmux would parse as a
//! `session:window.pane` target.

/// Longest session name accepted.
pub const MAX_SESSION_NAME: usize = 128;

/// Check that `name` can be used verbatim as a tmux session name.
pub fn check_session_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("session name is empty".to_string());
    }
    if name.len() > MAX_SESSION_NAME {
        return Err(format!(
            "session name longer than {MAX_SESSION_NAME} bytes"
        ));
    }
    if let Some(c) = name
        .chars()
        .find(|c| matches!(c, ':' | '.') || c.is_whitespace() || c.is_control())
    {
        return Err(format!("session name contains forbidden character {c:?}"));
    }
    Ok(())
}

/// Check that `text` can be typed into a pane.
pub fn check_payload(text: &str) -> Result<(), String> {
    if text.trim().is_empty() {
        return Err("payload is empty".to_string());
    }
    if text.contains('\0') {
        return Err("payload contains a NUL byte".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_pass() {
        assert!(check_session_name("agent-1").is_ok());
        assert!(check_session_name("agent-1-iso-0a1b2c3d").is_ok());
    }

    #[test]
    fn target_syntax_rejected() {
        assert!(check_session_name("agent:1").is_err());
        assert!(check_session_name("agent.1").is_err());
        assert!(check_session_name("agent 1").is_err());
        assert!(check_session_name("").is_err());
        assert!(check_session_name(&"a".repeat(MAX_SESSION_NAME + 1)).is_err());
    }

    #[test]
    fn payload_checks() {
        assert!(check_payload("status? ; rm -rf /").is_ok());
        assert!(check_payload("   ").is_err());
        assert!(check_payload("a\0b").is_err());
    }
}
