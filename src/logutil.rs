//! Logging helpers for chat text so log lines stay single-line.
//!
//! Chat messages are attacker-controlled: a viewer can paste newlines or
//! terminal escapes into `!guess`. Anything user supplied that ends up in a
//! log line goes through [escape_log] first.

/// Maximum number of characters of chat text kept in a log line.
pub const MAX_PREVIEW: usize = 200;

/// Escape a string for single-line logging:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
/// - other control characters => `\xNN`
///
/// Output is capped at [MAX_PREVIEW] characters with a trailing ellipsis.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Escape and join command arguments, e.g. for `"!guess bow"` style log lines.
pub fn escape_args(args: &[String]) -> String {
    escape_log(&args.join(" "))
}
