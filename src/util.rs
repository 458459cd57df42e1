use std::time::{SystemTime, UNIX_EPOCH};

#[inline]
pub(crate) fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

/// Cut `text` to at most `max_len` bytes on a char boundary, appending `...`
/// when something was dropped.
pub(crate) fn truncate_utf8(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&text[..end]);
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_utf8_keeps_short_text() {
        assert_eq!(truncate_utf8("short", 10), "short");
    }

    #[test]
    fn truncate_utf8_respects_char_boundaries() {
        // Each char is 3 bytes; a 4-byte budget keeps one char.
        assert_eq!(truncate_utf8("你好", 4), "你...");
        assert_eq!(truncate_utf8("abcdef", 3), "abc...");
    }

    #[test]
    fn unix_now_is_after_2020() {
        assert!(unix_now_secs() > 1_577_836_800);
    }
}
