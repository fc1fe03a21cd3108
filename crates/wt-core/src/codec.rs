//! URL classification and duration formatting.

use url::Url;

/// Raw URL prefixes whose content is never timed.
const UNTRACKED_PREFIXES: &[&str] = &[
    "chrome://",
    "chrome-extension://",
    "edge://",
    "about:",
    "file://",
    "moz-extension://",
    "devtools://",
    "view-source:",
];

/// Normalizes a raw URL into the key used for time buckets.
///
/// The fragment is dropped so that in-page anchor navigation does not count
/// as a separate target. Returns `None` if the URL cannot be parsed.
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;
    url.set_fragment(None);
    Some(url.into())
}

/// Returns whether time spent on this raw URL should be tracked at all.
///
/// Browser-internal, extension and local file pages are excluded; everything
/// else is allowed.
pub fn is_trackable_url(raw: &str) -> bool {
    if raw.is_empty() {
        return false;
    }
    !UNTRACKED_PREFIXES
        .iter()
        .any(|prefix| raw.starts_with(prefix))
}

/// Formats milliseconds as `HH:MM:SS`, truncating to whole seconds.
///
/// Hours are not wrapped: 100 hours renders as `100:00:00`.
pub fn format_duration(ms: u64) -> String {
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}
