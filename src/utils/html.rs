// src/utils/html.rs

/// Sanitises author-supplied text with `ammonia` and trims surrounding whitespace.
///
/// Whitelist-based: safe tags (like <b>, <p>) are preserved, dangerous tags
/// (like <script>, <iframe>) and event-handler attributes are stripped.
/// Applied to instructor-authored text before it is stored.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input.trim())
}
