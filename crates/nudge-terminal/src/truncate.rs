//! Reply size cap.
//!
//! A pane can hold a lot of scrollback. Replies are capped by keeping the
//! head and the tail and dropping the middle, which keeps both the echo of
//! what was asked and the final answer.

/// Default reply cap (30 000 chars).
pub const DEFAULT_MAX_CHARS: usize = 30_000;

/// Cap `reply` at roughly `max_chars` characters, omitting the middle.
///
/// Splits on character boundaries. The omission line reports how many
/// characters were dropped.
pub fn cap_reply(reply: &str, max_chars: usize) -> String {
    if reply.len() <= max_chars {
        return reply.to_owned();
    }

    let total = reply.chars().count();
    if total <= max_chars {
        return reply.to_owned();
    }

    let half = max_chars / 2;
    let head: String = reply.chars().take(half).collect();
    let tail: String = reply.chars().skip(total - half).collect();
    let omitted = total - 2 * half;

    format!("{head}\n\n... [{omitted} chars omitted] ...\n\n{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_budget_untouched() {
        assert_eq!(cap_reply("done", DEFAULT_MAX_CHARS), "done");
        let exact = "x".repeat(100);
        assert_eq!(cap_reply(&exact, 100), exact);
    }

    #[test]
    fn keeps_head_and_tail() {
        let input = format!("{}{}{}", "A".repeat(100), "B".repeat(300), "C".repeat(100));
        let out = cap_reply(&input, 200);
        assert!(out.starts_with(&"A".repeat(100)));
        assert!(out.ends_with(&"C".repeat(100)));
        assert!(out.contains("[300 chars omitted]"));
    }

    #[test]
    fn multibyte_input_is_safe() {
        let input = "€".repeat(500);
        let out = cap_reply(&input, 101);
        assert!(out.contains("chars omitted"));
        assert!(out.starts_with('€'));
    }
}
