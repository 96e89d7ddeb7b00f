//! Input sanitizer
//!
//! Every string that reaches the model process or the page goes through here
//! first. Shell metacharacters are dropped and the result is clamped.

/// Characters removed from user input
pub const FORBIDDEN_CHARS: [char; 7] = [';', '&', '|', '`', '$', '>', '<'];

/// Maximum sanitized length, in characters
pub const MAX_INPUT_CHARS: usize = 1000;

/// Strip shell metacharacters and clamp to [`MAX_INPUT_CHARS`].
///
/// Truncation happens after removal and counts characters, so multi-byte
/// text is never cut in the middle of a code point.
pub fn sanitize(text: Option<&str>) -> String {
    match text {
        Some(text) if !text.is_empty() => text
            .chars()
            .filter(|c| !FORBIDDEN_CHARS.contains(c))
            .take(MAX_INPUT_CHARS)
            .collect(),
        _ => String::new(),
    }
}
