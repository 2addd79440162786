/// Characters that are never allowed in a stored media file name.
const FORBIDDEN: &[char] = &[
    '?', '[', ']', '/', '\\', '=', '<', '>', ':', ';', ',', '\'', '"', '&', '$', '#', '*', '(',
    ')', '|', '~', '`', '!', '{', '}', '%', '+', '’', '«', '»', '”', '“',
];

/// Make a name safe to use as a file name on any filesystem.
///
/// Rules:
/// - Drop control characters and the punctuation in `FORBIDDEN`
/// - Turn whitespace runs into a single `-`
/// - Collapse repeated `-`
/// - Trim `.`, `-` and `_` from both ends
///
/// Returns `"unnamed-file"` when nothing survives.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_control() || FORBIDDEN.contains(&c) {
            continue;
        }
        if c.is_whitespace() || c == '-' {
            pending_dash = true;
            continue;
        }
        if pending_dash {
            out.push('-');
            pending_dash = false;
        }
        out.push(c);
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '-' || c == '_');
    if trimmed.is_empty() {
        "unnamed-file".to_string()
    } else {
        trimmed.to_string()
    }
}
