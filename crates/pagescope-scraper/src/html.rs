//! Regex-driven element scanner over a static HTML snapshot, and the
//! [`PageHandle`]/[`PageSource`] implementations built on it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use crate::error::ScraperError;
use crate::locator::Locator;
use crate::source::{ElementHandle, PageHandle, PageSource};

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<(/?)([A-Za-z][A-Za-z0-9-]*)((?:[^>"']|"[^"]*"|'[^']*')*?)(/?)>"#)
        .expect("valid tag regex")
});
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#,
    )
    .expect("valid attribute regex")
});
static OPAQUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<!--.*?-->|<script\b.*?</script\s*>|<style\b.*?</style\s*>")
        .expect("valid opaque-block regex")
});
static STRIP_TAGS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid strip regex"));
static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[A-Za-z]+);").expect("valid entity regex")
});
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// An element found by [`scan`]: its tag, decoded attributes and raw inner
/// HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlElement {
    tag: String,
    attrs: Vec<(String, String)>,
    inner_html: String,
}

impl HtmlElement {
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Decoded value of attribute `name`; `Some("")` for a bare attribute.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Visible text with tags removed, entities decoded and whitespace
    /// collapsed.
    #[must_use]
    pub fn text(&self) -> String {
        html_to_text(&self.inner_html)
    }

    /// Descendants matching `locator`.
    #[must_use]
    pub fn find_all(&self, locator: &Locator) -> Vec<HtmlElement> {
        scan(&self.inner_html, locator)
    }

    fn first_text(&self, locator: &Locator) -> Option<String> {
        first_text(&self.inner_html, locator)
    }
}

/// All elements in `html` matching `locator`, in document order.
///
/// Comments and `<script>`/`<style>` bodies must already be removed (see
/// [`HtmlPage::new`]). Elements nested inside a match are reported too.
/// An element with no closing tag extends to the end of the input.
#[must_use]
pub fn scan(html: &str, locator: &Locator) -> Vec<HtmlElement> {
    let mut found = Vec::new();

    for caps in TAG_RE.captures_iter(html) {
        if &caps[1] == "/" {
            continue;
        }
        let tag = caps[2].to_ascii_lowercase();
        let attrs = parse_attrs(&caps[3]);
        if !locator.matches(&tag, &attrs) {
            continue;
        }

        let Some(whole) = caps.get(0) else { continue };
        let self_closing = &caps[4] == "/" || VOID_TAGS.contains(&tag.as_str());
        let inner_html = if self_closing {
            String::new()
        } else {
            inner_html(html, whole.end(), &tag).to_owned()
        };

        found.push(HtmlElement {
            tag,
            attrs,
            inner_html,
        });
    }

    found
}

fn inner_html<'a>(html: &'a str, start: usize, tag: &str) -> &'a str {
    let rest = &html[start..];
    let mut depth = 1usize;

    for caps in TAG_RE.captures_iter(rest) {
        if !caps[2].eq_ignore_ascii_case(tag) {
            continue;
        }
        if &caps[1] == "/" {
            depth -= 1;
            if depth == 0 {
                let end = caps.get(0).map_or(rest.len(), |m| m.start());
                return &rest[..end];
            }
        } else if &caps[4] != "/" {
            depth += 1;
        }
    }

    rest
}

fn parse_attrs(raw: &str) -> Vec<(String, String)> {
    ATTR_RE
        .captures_iter(raw)
        .map(|caps| {
            let name = caps[1].to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or_else(String::new, |m| decode_entities(m.as_str()));
            (name, value)
        })
        .collect()
}

fn first_text(html: &str, locator: &Locator) -> Option<String> {
    scan(html, locator)
        .into_iter()
        .map(|el| el.text())
        .find(|text| !text.is_empty())
}

/// Strips tags, decodes entities and collapses whitespace.
#[must_use]
pub fn html_to_text(html: &str) -> String {
    let stripped = STRIP_TAGS_RE.replace_all(html, " ");
    let decoded = decode_entities(&stripped);
    WHITESPACE_RE.replace_all(decoded.trim(), " ").into_owned()
}

fn decode_entities(raw: &str) -> String {
    ENTITY_RE
        .replace_all(raw, |caps: &regex::Captures<'_>| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body.strip_prefix("#x").or(body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match body {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_owned(), String::from)
        })
        .into_owned()
}

// ---------------------------------------------------------------------------
// PageHandle / ElementHandle over a snapshot
// ---------------------------------------------------------------------------

/// A fully-loaded HTML document. Queries never wait: the snapshot cannot
/// change, so a missing element times out immediately.
#[derive(Debug, Clone)]
pub struct HtmlPage {
    url: String,
    html: String,
}

impl HtmlPage {
    #[must_use]
    pub fn new(url: impl Into<String>, html: &str) -> Self {
        Self {
            url: url.into(),
            html: OPAQUE_RE.replace_all(html, "").into_owned(),
        }
    }

    #[must_use]
    pub fn find_all(&self, locator: &Locator) -> Vec<HtmlElement> {
        scan(&self.html, locator)
    }
}

#[async_trait]
impl PageHandle for HtmlPage {
    fn current_url(&self) -> &str {
        &self.url
    }

    async fn wait_for_text(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<String, ScraperError> {
        first_text(&self.html, locator).ok_or_else(|| ScraperError::Timeout {
            locator: locator.to_string(),
            timeout_ms: timeout.as_millis(),
        })
    }

    async fn attribute(
        &self,
        locator: &Locator,
        name: &str,
    ) -> Result<Option<String>, ScraperError> {
        Ok(self
            .find_all(locator)
            .iter()
            .find_map(|el| el.attr(name).map(str::to_owned)))
    }

    async fn elements(
        &self,
        locator: &Locator,
    ) -> Result<Vec<Box<dyn ElementHandle>>, ScraperError> {
        Ok(self
            .find_all(locator)
            .into_iter()
            .map(|el| Box::new(el) as Box<dyn ElementHandle>)
            .collect())
    }
}

#[async_trait]
impl ElementHandle for HtmlElement {
    async fn attribute(&self, name: &str) -> Option<String> {
        self.attr(name).map(str::to_owned)
    }

    async fn text_of(&self, locator: &Locator) -> Option<String> {
        self.first_text(locator)
    }

    async fn attribute_of(&self, locator: &Locator, name: &str) -> Option<String> {
        self.find_all(locator)
            .iter()
            .find_map(|el| el.attr(name).map(str::to_owned))
    }

    async fn attributes_of(&self, locator: &Locator, name: &str) -> Vec<String> {
        self.find_all(locator)
            .iter()
            .filter_map(|el| el.attr(name).map(str::to_owned))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// StaticPageSource
// ---------------------------------------------------------------------------

/// In-memory [`PageSource`] serving fixed HTML per identifier. Used for
/// replaying captured pages and in tests.
#[derive(Debug, Default)]
pub struct StaticPageSource {
    base_url: String,
    pages: HashMap<String, String>,
    latency: Option<Duration>,
    renders: AtomicUsize,
}

impl StaticPageSource {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_page(mut self, identifier: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(identifier.into(), html.into());
        self
    }

    /// Delay every render by `latency`, simulating a slow source.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of `render` calls served so far, including not-found ones.
    #[must_use]
    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for StaticPageSource {
    async fn render(&self, identifier: &str) -> Result<Box<dyn PageHandle>, ScraperError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let url = format!("{}/{identifier}", self.base_url.trim_end_matches('/'));
        match self.pages.get(identifier) {
            Some(html) => Ok(Box::new(HtmlPage::new(url, html))),
            None => Err(ScraperError::NotFound { url }),
        }
    }
}

#[cfg(test)]
#[path = "html_test.rs"]
mod tests;
