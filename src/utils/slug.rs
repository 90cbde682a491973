// src/utils/slug.rs

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;

static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s-]").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static DASHES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-+").unwrap());

/// Normalises free text into a URL slug: "JS  Basics!" -> "js-basics".
pub fn slugify(input: &str) -> String {
    let lowered = input.trim().to_lowercase();
    let stripped = DISALLOWED.replace_all(&lowered, "");
    let dashed = WHITESPACE.replace_all(&stripped, "-");
    DASHES.replace_all(&dashed, "-").into_owned()
}

/// Slug derived from a title plus a base-36 millisecond suffix.
pub fn derive_slug(title: &str) -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    format!("{}-{}", slugify(title), to_base36(millis))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
