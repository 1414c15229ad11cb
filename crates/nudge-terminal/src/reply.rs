//! Extracting the agent's answer from two pane captures.

/// Lines present in `current` but not in `baseline`, minus the echoed prompt.
///
/// The baseline is the pane before the payload was typed. Everything after
/// the longest common line prefix is new output. Trailing blank lines and a
/// trailing copy of the old prompt are dropped.
pub fn extract_reply(baseline: &str, current: &str, sent: &str) -> String {
    let before: Vec<&str> = baseline.lines().collect();
    let after: Vec<&str> = current.lines().collect();

    let common = before
        .iter()
        .zip(after.iter())
        .take_while(|(a, b)| a.trim_end() == b.trim_end())
        .count();
    // The line holding the old prompt is rewritten by the echo; start there.
    let start = if common > 0 && common == before.len() {
        common - 1
    } else {
        common
    };

    let mut new_lines: Vec<&str> = after[start.min(after.len())..].to_vec();

    let first_sent = sent.lines().next().unwrap_or("").trim();
    if !first_sent.is_empty() {
        if let Some(pos) = new_lines.iter().position(|l| l.contains(first_sent)) {
            let echoed = sent.lines().count().max(1);
            new_lines.drain(..(pos + echoed).min(new_lines.len()));
        }
    }

    while new_lines.last().is_some_and(|l| l.trim().is_empty()) {
        new_lines.pop();
    }
    // A fresh, empty prompt after the answer.
    let prompt = before.last().map(|l| l.trim()).unwrap_or("");
    if !prompt.is_empty() && new_lines.last().is_some_and(|l| l.trim() == prompt) {
        new_lines.pop();
    }
    while new_lines.last().is_some_and(|l| l.trim().is_empty()) {
        new_lines.pop();
    }
    while new_lines.first().is_some_and(|l| l.trim().is_empty()) {
        new_lines.remove(0);
    }

    new_lines
        .iter()
        .map(|l| l.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_after_echo() {
        let baseline = "welcome\n> \n";
        let current = "welcome\n> status?\nall builds green\n2 PRs waiting\n> \n";
        assert_eq!(
            extract_reply(baseline, current, "status?"),
            "all builds green\n2 PRs waiting"
        );
    }

    #[test]
    fn prompt_line_is_not_part_of_reply() {
        let baseline = "> ";
        let current = "> ping\npong\n\n";
        assert_eq!(extract_reply(baseline, current, "ping"), "pong");
    }

    #[test]
    fn no_new_output_is_empty() {
        assert_eq!(extract_reply("> ", "> ", "ping"), "");
    }

    #[test]
    fn multi_line_payload_echo_is_skipped() {
        let current = "> line one\nline two\nanswer\n";
        assert_eq!(extract_reply("> ", current, "line one\nline two"), "answer");
    }
}
