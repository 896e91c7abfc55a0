//! In-memory doubles shared by the engine and resolver tests.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use pagescope_core::{NewPage, NewPost, NewSocialUser, Post, Profile, RelationKind, SocialUser};
use pagescope_db::{DbError, PROFILE_POST_LIMIT};
use pagescope_scraper::extract::POST_ID_ATTR;
use pagescope_scraper::{
    ElementHandle, HtmlElement, HtmlPage, Locator, PageHandle, PageSource, ScraperError,
};
use pagescope_storage::{LookupCache, MediaOffloader, StorageError};

use crate::store::ProfileStore;

pub(crate) const ACME_HTML: &str = include_str!("../../pagescope-scraper/tests/fixtures/acme.html");

pub(crate) const MEDIA_BASE: &str = "https://media.test";

/// A page with `count` posts, each carrying one media item. Posts whose
/// index is in `broken` have no timestamp and fail extraction.
pub(crate) fn page_with_posts(count: usize, broken: &[usize]) -> String {
    let mut html = String::from(
        r#"<html><head><meta property="fb:page_id" content="900"></head><body>
<img data-testid="profile_picture" src="https://cdn.test/bulk/avatar.jpg">
<h1>Bulk Page</h1>
<span data-key="followers_count">12</span>
<main>"#,
    );
    for i in 0..count {
        let stamp = if broken.contains(&i) {
            String::new()
        } else {
            format!(r#"<abbr data-utime="{}">t</abbr>"#, 1_700_000_000 + i * 60)
        };
        let _ = write!(
            html,
            r#"<div data-testid="post_container" data-post-id="b-{i}">{stamp}
<div data-ad-preview="message">post {i}</div>
<img data-testid="post_media" src="https://cdn.test/bulk/{i}.jpg"></div>"#
        );
    }
    html.push_str("</main></body></html>");
    html
}

// ---------------------------------------------------------------------------
// MemoryProfileStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Tables {
    next_id: i64,
    pages: HashMap<String, (i64, NewPage)>,
    posts: HashMap<String, (i64, i64, NewPost)>,
    users: HashMap<String, (i64, NewSocialUser)>,
    relations: BTreeSet<(i64, i64, &'static str)>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

fn unavailable() -> DbError {
    DbError::Sqlx(sqlx::Error::PoolTimedOut)
}

fn rejected() -> DbError {
    DbError::Sqlx(sqlx::Error::RowNotFound)
}

#[derive(Default)]
pub(crate) struct MemoryProfileStore {
    tables: Mutex<Tables>,
    pub(crate) reads: AtomicUsize,
    pub(crate) fail_reads: AtomicBool,
    pub(crate) fail_page_upserts: AtomicBool,
    /// Every post write fails as if the database went away.
    pub(crate) fail_post_writes: AtomicBool,
    failing_posts: Mutex<HashSet<String>>,
}

impl MemoryProfileStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_post(&self, facebook_id: &str) {
        self.failing_posts
            .lock()
            .unwrap()
            .insert(facebook_id.to_owned());
    }

    pub(crate) fn page_count(&self) -> usize {
        self.tables.lock().unwrap().pages.len()
    }

    pub(crate) fn post(&self, facebook_id: &str) -> Option<NewPost> {
        self.tables
            .lock()
            .unwrap()
            .posts
            .get(facebook_id)
            .map(|(_, _, post)| post.clone())
    }

    pub(crate) fn post_count(&self) -> usize {
        self.tables.lock().unwrap().posts.len()
    }

    pub(crate) fn user(&self, facebook_id: &str) -> Option<NewSocialUser> {
        self.tables
            .lock()
            .unwrap()
            .users
            .get(facebook_id)
            .map(|(_, user)| user.clone())
    }

    pub(crate) fn relation_count(&self) -> usize {
        self.tables.lock().unwrap().relations.len()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn find_profile(&self, username: &str) -> Result<Option<Profile>, DbError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(unavailable());
        }

        let tables = self.tables.lock().unwrap();
        let Some((page_id, page)) = tables.pages.get(username) else {
            return Ok(None);
        };

        let mut posts: Vec<Post> = tables
            .posts
            .values()
            .filter(|(_, owner, _)| owner == page_id)
            .map(|(id, owner, post)| Post {
                id: *id,
                page_id: *owner,
                facebook_id: post.facebook_id.clone(),
                content: post.content.clone(),
                posted_at: post.posted_at,
                likes_count: post.likes_count,
                comments_count: post.comments_count,
                media_urls: post.media_urls.clone(),
                media_s3_urls: post.media_s3_urls.clone(),
            })
            .collect();
        posts.sort_by(|a, b| b.posted_at.cmp(&a.posted_at).then(b.id.cmp(&a.id)));
        posts.truncate(usize::try_from(PROFILE_POST_LIMIT).unwrap());

        let related = |kind: RelationKind| -> Vec<SocialUser> {
            tables
                .relations
                .iter()
                .filter(|(p, _, k)| p == page_id && *k == kind.as_str())
                .filter_map(|(_, user_id, _)| {
                    tables
                        .users
                        .values()
                        .find(|(id, _)| id == user_id)
                        .map(|(id, user)| SocialUser {
                            id: *id,
                            facebook_id: user.facebook_id.clone(),
                            name: user.name.clone(),
                            profile_pic_url: user.profile_pic_url.clone(),
                            profile_pic_s3_url: user.profile_pic_s3_url.clone(),
                        })
                })
                .collect()
        };

        Ok(Some(Profile {
            id: *page_id,
            username: page.username.clone(),
            facebook_id: page.facebook_id.clone(),
            name: page.name.clone(),
            url: page.url.clone(),
            profile_pic_url: page.profile_pic_url.clone(),
            profile_pic_s3_url: page.profile_pic_s3_url.clone(),
            email: page.email.clone(),
            website: page.website.clone(),
            category: page.category.clone(),
            followers_count: page.followers_count,
            likes_count: page.likes_count,
            created_at: page.created_at.unwrap_or_default(),
            last_scraped: page.last_scraped,
            posts,
            followers: related(RelationKind::Follower),
            following: related(RelationKind::Following),
        }))
    }

    async fn upsert_page(&self, page: &NewPage) -> Result<i64, DbError> {
        if self.fail_page_upserts.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let mut tables = self.tables.lock().unwrap();
        let (id, stored_created_at) = match tables.pages.get(&page.username) {
            Some((id, stored)) => (*id, stored.created_at),
            None => (tables.next_id(), Some(chrono::Utc::now())),
        };
        let mut stored = page.clone();
        stored.created_at = page.created_at.or(stored_created_at);
        tables.pages.insert(page.username.clone(), (id, stored));
        Ok(id)
    }

    async fn upsert_post(&self, page_id: i64, post: &NewPost) -> Result<i64, DbError> {
        if self.fail_post_writes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        if self
            .failing_posts
            .lock()
            .unwrap()
            .contains(&post.facebook_id)
        {
            return Err(rejected());
        }
        if !post.media_aligned() {
            return Err(DbError::MisalignedMedia {
                facebook_id: post.facebook_id.clone(),
                media: post.media_urls.len(),
                offloaded: post.media_s3_urls.len(),
            });
        }
        let mut tables = self.tables.lock().unwrap();
        let id = match tables.posts.get(&post.facebook_id) {
            Some((id, _, _)) => *id,
            None => tables.next_id(),
        };
        tables
            .posts
            .insert(post.facebook_id.clone(), (id, page_id, post.clone()));
        Ok(id)
    }

    async fn upsert_social_user(&self, user: &NewSocialUser) -> Result<i64, DbError> {
        let mut tables = self.tables.lock().unwrap();
        let (id, kept_avatar) = match tables.users.get(&user.facebook_id) {
            Some((id, existing)) => (*id, existing.profile_pic_s3_url.clone()),
            None => (tables.next_id(), None),
        };
        let mut stored = user.clone();
        stored.profile_pic_s3_url = stored.profile_pic_s3_url.or(kept_avatar);
        tables.users.insert(user.facebook_id.clone(), (id, stored));
        Ok(id)
    }

    async fn link_relation(
        &self,
        page_id: i64,
        user_id: i64,
        kind: RelationKind,
    ) -> Result<(), DbError> {
        self.tables
            .lock()
            .unwrap()
            .relations
            .insert((page_id, user_id, kind.as_str()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeOffloader
// ---------------------------------------------------------------------------

/// Offloader that never touches the network. Source URLs containing any of
/// the configured fragments fail.
#[derive(Default)]
pub(crate) struct FakeOffloader {
    failing: Vec<String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeOffloader {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_on(mut self, fragment: &str) -> Self {
        self.failing.push(fragment.to_owned());
        self
    }

    /// `(source_url, destination_key)` pairs in call order.
    pub(crate) fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaOffloader for FakeOffloader {
    async fn offload(
        &self,
        source_url: &str,
        destination_key: &str,
    ) -> Result<String, StorageError> {
        self.calls
            .lock()
            .unwrap()
            .push((source_url.to_owned(), destination_key.to_owned()));
        if self.failing.iter().any(|f| source_url.contains(f.as_str())) {
            return Err(StorageError::Cache(format!("upstream refused {source_url}")));
        }
        Ok(format!("{MEDIA_BASE}/{destination_key}"))
    }
}

// ---------------------------------------------------------------------------
// BrokenCache
// ---------------------------------------------------------------------------

/// Cache whose every operation fails, as an unreachable Redis would.
#[derive(Default)]
pub(crate) struct BrokenCache {
    pub(crate) attempts: AtomicUsize,
}

#[async_trait]
impl LookupCache for BrokenCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Cache("connection refused".to_owned()))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), StorageError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Cache("connection refused".to_owned()))
    }

    async fn delete(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Cache("connection refused".to_owned()))
    }
}

// ---------------------------------------------------------------------------
// StallingSource
// ---------------------------------------------------------------------------

/// Serves one page like a browser waiting on elements that never render:
/// queries for the stalled locator never answer, and neither do field
/// lookups inside the stalled post containers.
pub(crate) struct StallingSource {
    identifier: String,
    html: String,
    locator: Option<Locator>,
    posts: Vec<String>,
}

impl StallingSource {
    pub(crate) fn new(identifier: &str, html: impl Into<String>) -> Self {
        Self {
            identifier: identifier.to_owned(),
            html: html.into(),
            locator: None,
            posts: Vec::new(),
        }
    }

    pub(crate) fn stall_locator(mut self, raw: &str) -> Self {
        self.locator = Some(Locator::parse(raw).unwrap());
        self
    }

    pub(crate) fn stall_post(mut self, post_id: &str) -> Self {
        self.posts.push(post_id.to_owned());
        self
    }
}

#[async_trait]
impl PageSource for StallingSource {
    async fn render(&self, identifier: &str) -> Result<Box<dyn PageHandle>, ScraperError> {
        let url = format!("https://www.facebook.com/{identifier}");
        if identifier != self.identifier {
            return Err(ScraperError::NotFound { url });
        }
        Ok(Box::new(StallingPage {
            page: HtmlPage::new(url, &self.html),
            locator: self.locator.clone(),
            posts: self.posts.clone(),
        }))
    }
}

struct StallingPage {
    page: HtmlPage,
    locator: Option<Locator>,
    posts: Vec<String>,
}

impl StallingPage {
    fn stalls(&self, locator: &Locator) -> bool {
        self.locator.as_ref() == Some(locator)
    }
}

#[async_trait]
impl PageHandle for StallingPage {
    fn current_url(&self) -> &str {
        self.page.current_url()
    }

    async fn wait_for_text(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<String, ScraperError> {
        if self.stalls(locator) {
            return std::future::pending().await;
        }
        self.page.wait_for_text(locator, timeout).await
    }

    async fn attribute(
        &self,
        locator: &Locator,
        name: &str,
    ) -> Result<Option<String>, ScraperError> {
        if self.stalls(locator) {
            return std::future::pending().await;
        }
        self.page.attribute(locator, name).await
    }

    async fn elements(
        &self,
        locator: &Locator,
    ) -> Result<Vec<Box<dyn ElementHandle>>, ScraperError> {
        if self.stalls(locator) {
            return std::future::pending().await;
        }
        Ok(self
            .page
            .find_all(locator)
            .into_iter()
            .map(|element| {
                let stalled = element
                    .attr(POST_ID_ATTR)
                    .is_some_and(|id| self.posts.iter().any(|post| post == id));
                Box::new(StallingElement { element, stalled }) as Box<dyn ElementHandle>
            })
            .collect())
    }
}

struct StallingElement {
    element: HtmlElement,
    stalled: bool,
}

#[async_trait]
impl ElementHandle for StallingElement {
    async fn attribute(&self, name: &str) -> Option<String> {
        self.element.attr(name).map(str::to_owned)
    }

    async fn text_of(&self, locator: &Locator) -> Option<String> {
        if self.stalled {
            return std::future::pending().await;
        }
        self.element.text_of(locator).await
    }

    async fn attribute_of(&self, locator: &Locator, name: &str) -> Option<String> {
        if self.stalled {
            return std::future::pending().await;
        }
        self.element.attribute_of(locator, name).await
    }

    async fn attributes_of(&self, locator: &Locator, name: &str) -> Vec<String> {
        if self.stalled {
            return std::future::pending().await;
        }
        self.element.attributes_of(locator, name).await
    }
}
