//! Log sanitization helpers. World ids, group names, and player names come
//! from configuration or the game server; anything logged verbatim must stay
//! on one line with control characters escaped.

/// Escape a string for single-line logging, truncating past `MAX_PREVIEW`
/// characters with an ellipsis.
pub fn escape_log(s: &str) -> String {
    const MAX_PREVIEW: usize = 120;
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

/// Compact uuid prefix for log lines where the full id is noise.
pub fn short_uuid(id: &uuid::Uuid) -> String {
    let text = id.to_string();
    text[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::{escape_log, short_uuid};

    #[test]
    fn escapes_newlines_and_controls() {
        let s = "grief\nworld\r\tend\x07";
        assert_eq!(escape_log(s), "grief\\nworld\\r\\tend\\x07");
    }

    #[test]
    fn truncates_long_names() {
        let long = "w".repeat(300);
        let escaped = escape_log(&long);
        assert!(escaped.ends_with('…'));
        assert!(escaped.chars().count() <= 121);
    }

    #[test]
    fn short_uuid_is_eight_chars() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(short_uuid(&id).len(), 8);
    }
}
