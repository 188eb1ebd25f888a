use std::sync::OnceLock;

use regex_lite::Regex;

/// Upper bound on the query sent upstream, in characters.
pub const MAX_QUERY_CHARS: usize = 50;

#[allow(clippy::expect_used)]
fn url_pattern() -> &'static Regex {
    static URL_PATTERN: OnceLock<Regex> = OnceLock::new();
    URL_PATTERN.get_or_init(|| Regex::new(r"https?://\S+").expect("URL pattern is valid"))
}

/// Removes `http(s)://` links and trims the result.
pub fn strip_links(text: &str) -> String {
    url_pattern().replace_all(text, "").trim().to_string()
}

/// Removes pasted links, trims, and truncates to [`MAX_QUERY_CHARS`].
pub fn sanitize_query(query: &str) -> String {
    strip_links(query).chars().take(MAX_QUERY_CHARS).collect()
}
