#![forbid(unsafe_code)]

//! Finding the pages of a site so the editor can offer per-page dialogue.
//!
//! `/sitemap.xml` wins when it lists anything. Otherwise the landing page is
//! scanned for same-host links, and the site URL itself is always included.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static LOC: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<loc>(.*?)</loc>").ok());
static ANCHOR_HREF: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).ok()
});

/// An HTTP GET that did not produce a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub url: String,
    pub reason: String,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GET {} failed: {}", self.url, self.reason)
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// The site URL is missing or does not parse.
    InvalidUrl(String),
    /// The landing page could not be read.
    Fetch(FetchError),
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryError::InvalidUrl(reason) => write!(f, "invalid site URL: {reason}"),
            DiscoveryError::Fetch(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for DiscoveryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DiscoveryError::Fetch(err) => Some(err),
            DiscoveryError::InvalidUrl(_) => None,
        }
    }
}

impl From<FetchError> for DiscoveryError {
    fn from(err: FetchError) -> Self {
        DiscoveryError::Fetch(err)
    }
}

/// HTTP GET returning the response body of a successful (2xx) response.
pub trait PageFetcher {
    fn get(&self, url: &Url) -> Result<String, FetchError>;
}

impl<T: PageFetcher + ?Sized> PageFetcher for &T {
    fn get(&self, url: &Url) -> Result<String, FetchError> {
        (**self).get(url)
    }
}

/// Every `<loc>` entry, in document order.
#[must_use]
pub fn parse_sitemap(xml: &str) -> Vec<String> {
    let Some(loc) = &*LOC else {
        return Vec::new();
    };
    loc.captures_iter(xml)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Anchors on the same host as `base`, resolved, without fragments, in
/// first-seen order.
#[must_use]
pub fn same_domain_links(base: &Url, html: &str) -> Vec<String> {
    let Some(anchor) = &*ANCHOR_HREF else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for captures in anchor.captures_iter(html) {
        let Some(href) = captures
            .get(1)
            .or_else(|| captures.get(2))
            .or_else(|| captures.get(3))
            .map(|m| m.as_str())
        else {
            continue;
        };
        if href.is_empty() {
            continue;
        }
        let Ok(mut resolved) = base.join(href) else {
            tracing::trace!(href, "unresolvable link skipped");
            continue;
        };
        if resolved.host_str() != base.host_str() {
            continue;
        }
        resolved.set_fragment(None);
        let link = resolved.to_string();
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }
    links
}

/// Pages of `site`.
pub fn discover_pages(fetcher: &dyn PageFetcher, site: &str) -> Result<Vec<String>, DiscoveryError> {
    let site = site.trim();
    if site.is_empty() {
        return Err(DiscoveryError::InvalidUrl("websiteUrl is required".into()));
    }
    let base = Url::parse(site).map_err(|err| DiscoveryError::InvalidUrl(format!("{site}: {err}")))?;

    let mut pages = Pages::default();
    match base.join("/sitemap.xml") {
        Ok(sitemap) => match fetcher.get(&sitemap) {
            Ok(xml) => parse_sitemap(&xml).into_iter().for_each(|url| pages.add(url)),
            Err(err) => tracing::debug!(%err, "no sitemap"),
        },
        Err(err) => tracing::debug!(%err, "sitemap URL does not resolve"),
    }

    if pages.is_empty() {
        let html = fetcher.get(&base)?;
        same_domain_links(&base, &html)
            .into_iter()
            .for_each(|url| pages.add(url));
        pages.add(base.to_string());
    }

    tracing::debug!(site = %base, pages = pages.list.len(), "pages discovered");
    Ok(pages.list)
}

/// Insertion-ordered set.
#[derive(Default)]
struct Pages {
    seen: HashSet<String>,
    list: Vec<String>,
}

impl Pages {
    fn add(&mut self, url: String) {
        if self.seen.insert(url.clone()) {
            self.list.push(url);
        }
    }

    fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}
