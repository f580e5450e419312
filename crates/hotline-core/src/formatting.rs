/// Escape text for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Cut `s` to at most `max_chars` characters, marking the cut with `...`.
pub fn truncate_text(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out = s
        .chars()
        .take(max_chars.saturating_sub(3))
        .collect::<String>();
    out.push_str("...");
    out
}

/// Length as Telegram counts it (UTF-16 code units).
pub fn tg_len(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Split `s` into raw pieces whose escaped form fits in `max_len` (see [`tg_len`]).
///
/// Pieces are cut on character boundaries only, so an HTML entity is never
/// split. A single character wider than `max_len` still gets a piece of its own.
pub fn split_text(s: &str, max_len: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0usize;
    let mut buf = [0u8; 4];

    for ch in s.chars() {
        let w = tg_len(&escape_html(ch.encode_utf8(&mut buf)));
        if cur_len + w > max_len && !cur.is_empty() {
            out.push(std::mem::take(&mut cur));
            cur_len = 0;
        }
        cur.push(ch);
        cur_len += w;
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html_special_chars() {
        assert_eq!(
            escape_html("<b>\"Tom & Jerry\"</b>"),
            "&lt;b&gt;&quot;Tom &amp; Jerry&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_text("short", 10), "short");
        let cut = truncate_text("ЖЖЖЖЖЖЖЖЖЖ", 6);
        assert_eq!(cut, "ЖЖЖ...");
        assert_eq!(cut.chars().count(), 6);
    }

    #[test]
    fn split_keeps_every_character_and_respects_escaped_width() {
        let text = format!("{}&{}", "a".repeat(7), "b".repeat(5));
        let parts = split_text(&text, 10);
        assert_eq!(parts.concat(), text);
        for p in &parts {
            assert!(tg_len(&escape_html(p)) <= 10, "{p:?} too long");
        }
        // "&" escapes to five units and must not be cut apart.
        assert_eq!(parts[0], "aaaaaaa");
        assert!(parts[1].starts_with('&'));
    }

    #[test]
    fn split_counts_utf16_units() {
        assert_eq!(tg_len("😀"), 2);
        assert_eq!(split_text("😀😀😀", 4), vec!["😀😀", "😀"]);
        assert!(split_text("", 10).is_empty());
    }
}
