//! Element locators of the form `tag`, `tag[attr]`, `tag[attr=value]` and
//! `[attr=value]`.
//!
//! This is the small selector subset the extractors need; it is understood
//! both by the regex-driven HTML scanner and by any browser-backed
//! [`PageSource`](crate::PageSource) implementation.

use std::fmt;
use std::str::FromStr;

use crate::error::ScraperError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    tag: Option<String>,
    attr: Option<AttrFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AttrFilter {
    name: String,
    value: Option<String>,
}

impl Locator {
    /// Parses a locator string.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidLocator`] for empty input, an
    /// unterminated `[`, an empty attribute name, or characters outside
    /// `[A-Za-z0-9-]` in the tag name.
    pub fn parse(raw: &str) -> Result<Self, ScraperError> {
        let invalid = |reason: &str| ScraperError::InvalidLocator {
            locator: raw.to_owned(),
            reason: reason.to_owned(),
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty locator"));
        }

        let (tag_part, attr_part) = match trimmed.find('[') {
            Some(open) => {
                let rest = &trimmed[open + 1..];
                let inner = rest
                    .strip_suffix(']')
                    .ok_or_else(|| invalid("unterminated attribute filter"))?;
                (&trimmed[..open], Some(inner))
            }
            None => (trimmed, None),
        };

        let tag = if tag_part.is_empty() {
            None
        } else if tag_part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            Some(tag_part.to_ascii_lowercase())
        } else {
            return Err(invalid("tag name must be alphanumeric"));
        };

        let attr = match attr_part {
            None => None,
            Some(inner) => {
                let (name, value) = match inner.split_once('=') {
                    Some((name, value)) => (name.trim(), Some(unquote(value.trim()))),
                    None => (inner.trim(), None),
                };
                if name.is_empty() {
                    return Err(invalid("empty attribute name"));
                }
                Some(AttrFilter {
                    name: name.to_ascii_lowercase(),
                    value: value.map(str::to_owned),
                })
            }
        };

        if tag.is_none() && attr.is_none() {
            return Err(invalid("locator matches nothing"));
        }

        Ok(Self { tag, attr })
    }

    /// Lower-cased tag name, if the locator constrains it.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// `true` when an element with `tag` and `attrs` satisfies this locator.
    ///
    /// `tag` and attribute names are compared case-insensitively; attribute
    /// values are compared exactly.
    #[must_use]
    pub fn matches(&self, tag: &str, attrs: &[(String, String)]) -> bool {
        if let Some(want) = &self.tag {
            if !want.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        match &self.attr {
            None => true,
            Some(filter) => attrs.iter().any(|(name, value)| {
                name.eq_ignore_ascii_case(&filter.name)
                    && filter.value.as_deref().is_none_or(|want| want == value)
            }),
        }
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value)
}

impl FromStr for Locator {
    type Err = ScraperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tag) = &self.tag {
            f.write_str(tag)?;
        }
        if let Some(attr) = &self.attr {
            match &attr.value {
                Some(value) => write!(f, "[{}={}]", attr.name, value)?,
                None => write!(f, "[{}]", attr.name)?,
            }
        }
        Ok(())
    }
}
