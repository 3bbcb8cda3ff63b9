//! UTF-8 safe string helpers for log fields.

/// Truncate a string to at most `max_bytes` bytes at a char boundary.
#[inline]
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Short, log-safe rendering of a device token: first 8 bytes plus length.
///
/// Full tokens never go into log output.
pub fn token_preview(token: &str) -> String {
    format!("{}...({})", truncate_str(token, 8), token.len())
}
