#![forbid(unsafe_code)]

//! Dialogue pool selection for the current page.
//!
//! Page buckets are keyed by URL as the author typed it (`example.com/`,
//! `https://example.com/pricing?ref=x`, ...). Both the keys and the current
//! page location are reduced to `hostname + path` with one trailing slash
//! stripped before comparison; query and fragment never participate.

use url::Url;

use crate::config::DialogueSource;

/// Reserved bucket whose lines are appended on every page.
pub const DEFAULT_BUCKET: &str = "default";

/// Line used when no bucket yields anything.
pub const FALLBACK_LINE: &str = "Welcome!";

/// Reduce a URL to `hostname + path`, dropping one trailing slash.
///
/// Scheme-less input (`example.com/about/`) is read as an `http` URL. Input
/// that still fails to parse is returned unchanged.
#[must_use]
pub fn normalize_url(raw: &str) -> String {
    let parsed = match Url::parse(raw) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("http://{raw}")),
        Err(e) => Err(e),
    };

    match parsed {
        Ok(url) => {
            let host = url.host_str().unwrap_or("");
            let path = url.path();
            let path = path.strip_suffix('/').unwrap_or(path);
            format!("{host}{path}")
        }
        Err(e) => {
            tracing::warn!(url = raw, error = %e, "could not normalize url");
            raw.to_string()
        }
    }
}

/// Resolve the ordered pool of candidate lines for `page_url`.
///
/// - A flat list is returned unchanged.
/// - In preview mode every bucket is flattened in document order.
/// - Otherwise the first bucket whose normalized key matches the page comes
///   first, followed by the `default` bucket; an empty result becomes
///   `[FALLBACK_LINE]`.
#[must_use]
pub fn dialogue_for_page(source: &DialogueSource, page_url: &str, preview: bool) -> Vec<String> {
    let buckets = match source {
        DialogueSource::Lines(lines) => return lines.clone(),
        DialogueSource::Pages(buckets) => buckets,
    };

    if preview {
        return buckets
            .iter()
            .flat_map(|(_, lines)| lines.iter().cloned())
            .collect();
    }

    let current = normalize_url(page_url);
    let page_lines = buckets
        .iter()
        .find(|(key, _)| normalize_url(key) == current)
        .map(|(_, lines)| lines)
        .unwrap_or(&[]);
    let default_lines = buckets.get(DEFAULT_BUCKET).unwrap_or(&[]);

    let pool: Vec<String> = page_lines.iter().chain(default_lines).cloned().collect();
    if pool.is_empty() {
        vec![FALLBACK_LINE.to_string()]
    } else {
        pool
    }
}
