//! Internal markers embedded in outbound text.
//!
//! Markers carry one-turn conversational state and media references through
//! the response text. They are stripped before the provider call but kept in
//! the log row, which is where the context inspector reads them back.

/// Sentinel marking that the previous outbound asked the student to pick a
/// course by number. A bare-integer reply right after it is a course
/// selection, not a menu option.
pub const COURSE_SELECTOR: &str = "[SELECTOR_CURSO_ACTIVO]";

/// Prefix of the media block a module renders into its text.
/// Full form: `🎥 Video educativo:\n<url>`.
pub const VIDEO_BLOCK_PREFIX: &str = "🎥 Video educativo:";

/// Whether the text carries the course-selector sentinel.
pub fn has_course_selector(text: &str) -> bool {
    text.contains(COURSE_SELECTOR)
}

/// Remove every internal sentinel from user-visible text.
pub fn strip_sentinels(text: &str) -> String {
    text.replace(COURSE_SELECTOR, "").trim().to_string()
}

/// Extract the media block from a response text.
///
/// Returns the visible text without the block and the URL, if present.
/// The URL runs from the line after the prefix to the end of that line.
pub fn extract_video_block(text: &str) -> (String, Option<String>) {
    let Some(pos) = text.find(VIDEO_BLOCK_PREFIX) else {
        return (text.to_string(), None);
    };

    let after = &text[pos + VIDEO_BLOCK_PREFIX.len()..];
    let after = after.strip_prefix('\n').unwrap_or(after);
    let url_end = after.find('\n').unwrap_or(after.len());
    let url = after[..url_end].trim().to_string();

    let mut visible = String::with_capacity(text.len());
    visible.push_str(text[..pos].trim_end());
    let rest = after[url_end..].trim_start();
    if !rest.is_empty() {
        visible.push('\n');
        visible.push_str(rest);
    }

    if url.is_empty() {
        (visible.trim().to_string(), None)
    } else {
        (visible.trim().to_string(), Some(url))
    }
}

/// Whether a URL points at a loopback address the providers cannot reach.
pub fn is_loopback_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .unwrap_or(url);
    let host = rest
        .split(['/', ':'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    host == "localhost" || host == "127.0.0.1" || host == "0.0.0.0" || host == "[::1]"
}
