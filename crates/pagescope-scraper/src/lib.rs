pub mod client;
pub mod error;
pub mod extract;
pub mod html;
pub mod locator;
pub(crate) mod rate_limit;
pub mod source;

pub use client::{FetchedMedia, HttpPageSource, MediaClient};
pub use error::ScraperError;
pub use extract::{
    extract_post, extract_profile, extract_related_users, parse_count, post_containers, post_id,
};
pub use html::{HtmlElement, HtmlPage, StaticPageSource};
pub use locator::Locator;
pub use source::{ElementHandle, PageHandle, PageSource};
