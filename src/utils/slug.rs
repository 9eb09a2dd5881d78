// src/utils/slug.rs

use regex::Regex;
use std::sync::LazyLock;

static NON_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\s-]").expect("valid slug regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid ws regex"));
static DASH_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{2,}").expect("valid dash regex"));

/// Builds a URL-safe slug from a post title.
///
/// Lowercases, strips everything outside [a-z0-9 -], collapses whitespace to
/// single dashes, then appends a millisecond timestamp so concurrent posts
/// with the same title still get unique slugs. Slugs are write-once.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped = NON_SLUG.replace_all(&lowered, "");
    let dashed = WHITESPACE.replace_all(stripped.trim(), "-");
    let collapsed = DASH_RUN.replace_all(&dashed, "-");
    let base = collapsed.trim_matches('-');

    let ts = chrono::Utc::now().timestamp_millis();
    if base.is_empty() {
        format!("post-{}", ts)
    } else {
        format!("{}-{}", base, ts)
    }
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn slug_is_lowercase_and_dashed() {
        let slug = slugify("Hello,  World!");
        assert!(slug.starts_with("hello-world-"));
        assert!(slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
    }

    #[test]
    fn slug_survives_symbol_only_titles() {
        let slug = slugify("!!!");
        assert!(slug.starts_with("post-"));
    }
}
