//! The capability the acquisition engine drives: render a page for an
//! identifier, then query it through [`Locator`]s.
//!
//! A browser-backed implementation waits for elements to appear; the HTML
//! snapshot implementations in this crate answer immediately.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ScraperError;
use crate::locator::Locator;

#[async_trait]
pub trait PageSource: Send + Sync {
    /// Navigates to the page for `identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::NotFound`] when the source has no such page,
    /// or another [`ScraperError`] when navigation fails.
    async fn render(&self, identifier: &str) -> Result<Box<dyn PageHandle>, ScraperError>;
}

#[async_trait]
pub trait PageHandle: Send + Sync {
    /// URL the page settled on after redirects.
    fn current_url(&self) -> &str;

    /// Text content of the first element matching `locator`, waiting up to
    /// `timeout` for it to appear.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Timeout`] if no element matches in time.
    async fn wait_for_text(&self, locator: &Locator, timeout: Duration)
        -> Result<String, ScraperError>;

    /// Attribute `name` of the first element matching `locator`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError`] if the page can no longer be queried.
    async fn attribute(&self, locator: &Locator, name: &str)
        -> Result<Option<String>, ScraperError>;

    /// All elements matching `locator`, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError`] if the page can no longer be queried.
    async fn elements(&self, locator: &Locator)
        -> Result<Vec<Box<dyn ElementHandle>>, ScraperError>;
}

/// One element of a rendered page; queries are scoped to its subtree.
#[async_trait]
pub trait ElementHandle: Send + Sync {
    async fn attribute(&self, name: &str) -> Option<String>;

    /// Text of the first descendant matching `locator`.
    async fn text_of(&self, locator: &Locator) -> Option<String>;

    /// Attribute `name` of the first descendant matching `locator`.
    async fn attribute_of(&self, locator: &Locator, name: &str) -> Option<String>;

    /// Attribute `name` of every descendant matching `locator` that carries
    /// it, in document order.
    async fn attributes_of(&self, locator: &Locator, name: &str) -> Vec<String>;
}
