//! Small shared helpers: clock access, URL/domain utilities, text cleanup.

mod url;

pub use url::{domain_of, hostname_of, is_http_url, is_valid_domain};

use crate::config::MAX_ERROR_MESSAGE_LENGTH;

/// Returns the current time as epoch milliseconds.
///
/// All record timestamps (`foundTs`, `attemptedTs`, `visitedTs`) use this
/// clock so that persisted data is comparable across restarts.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Decodes the small set of HTML entities that show up in ad titles and
/// text bodies scraped out of markup.
///
/// This is intentionally not a full entity table: ad text in practice only
/// carries the basic named entities plus a few numeric ones.
pub fn decode_entities(s: &str) -> String {
    const ENTITIES: &[(&str, &str)] = &[
        ("&amp;", "&"),
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&apos;", "'"),
        ("&#x27;", "'"),
        ("&#x60;", "`"),
        ("&#39;", "'"),
        ("&nbsp;", " "),
    ];

    let mut out = s.to_string();
    for (entity, replacement) in ENTITIES {
        if out.contains(entity) {
            out = out.replace(entity, replacement);
        }
    }
    out
}

/// Truncates an error message to [`MAX_ERROR_MESSAGE_LENGTH`] characters,
/// appending a note with the original length when truncation occurred.
pub fn truncate_error_message(msg: &str) -> String {
    if msg.chars().count() <= MAX_ERROR_MESSAGE_LENGTH {
        return msg.to_string();
    }
    let truncated: String = msg.chars().take(MAX_ERROR_MESSAGE_LENGTH).collect();
    format!("{truncated}... (truncated from {} chars)", msg.chars().count())
}

/// Strips trailing slashes so user-visited URLs compare equal regardless of
/// how the navigation was recorded.
pub fn normalize_visited_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// serde helper for `skip_serializing_if` on bool flags.
pub fn is_false(b: &bool) -> bool {
    !*b
}
