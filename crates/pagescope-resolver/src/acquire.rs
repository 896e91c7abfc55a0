//! Live acquisition: drive the page source, offload media, and upsert the
//! results.
//!
//! A run walks `NAVIGATE -> EXTRACT_PROFILE -> OFFLOAD_AVATAR ->
//! UPSERT_PROFILE -> LINK_RELATIONS -> EXTRACT_POSTS`, then for each post
//! `EXTRACT_FIELDS -> OFFLOAD_MEDIA -> UPSERT_POST`. Profile stages are
//! fatal on failure; relation and post stages are isolated per child. The
//! one exception is losing the store mid-walk, which ends the run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pagescope_core::config::MAX_ACQUIRE_BUDGET_SECS;
use pagescope_core::{AppConfig, NewPage, NewPost, NewSocialUser, RelationKind, ScrapedSocialUser};
use pagescope_scraper::{
    extract_post, extract_profile, extract_related_users, post_containers, post_id, ElementHandle,
    PageHandle, PageSource,
};
use pagescope_storage::{page_avatar_key, post_media_key, user_avatar_key, MediaOffloader};
use serde::Serialize;
use tokio::time::{timeout, timeout_at, Instant};

use crate::error::{AcquisitionFailure, ChildExtractionFailure, StepError};
use crate::store::ProfileStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Navigate,
    ExtractProfile,
    OffloadAvatar,
    UpsertProfile,
    LinkRelations,
    ExtractPosts,
    ExtractFields,
    OffloadMedia,
    UpsertPost,
    Done,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Stage::Navigate => "NAVIGATE",
            Stage::ExtractProfile => "EXTRACT_PROFILE",
            Stage::OffloadAvatar => "OFFLOAD_AVATAR",
            Stage::UpsertProfile => "UPSERT_PROFILE",
            Stage::LinkRelations => "LINK_RELATIONS",
            Stage::ExtractPosts => "EXTRACT_POSTS",
            Stage::ExtractFields => "EXTRACT_FIELDS",
            Stage::OffloadMedia => "OFFLOAD_MEDIA",
            Stage::UpsertPost => "UPSERT_POST",
            Stage::Done => "DONE",
        }
    }
}

fn enter(identifier: &str, stage: Stage) {
    tracing::debug!(identifier, stage = stage.as_str(), "acquisition stage");
}

/// Tunables for one acquisition run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireSettings {
    /// Bound on each profile field lookup and each post's field extraction.
    pub field_timeout: Duration,
    /// Wall-clock bound on the whole run, capped at
    /// [`MAX_ACQUIRE_BUDGET_SECS`].
    pub budget: Duration,
    /// Maximum number of posts walked per run.
    pub post_limit: usize,
}

impl Default for AcquireSettings {
    fn default() -> Self {
        Self {
            field_timeout: Duration::from_secs(10),
            budget: Duration::from_secs(120),
            post_limit: 25,
        }
    }
}

impl AcquireSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            field_timeout: Duration::from_secs(config.field_timeout_secs),
            budget: Duration::from_secs(config.acquire_budget_secs),
            post_limit: config.post_limit,
        }
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcquisitionReport {
    pub page_id: i64,
    pub username: String,
    pub posts_stored: usize,
    pub posts_skipped: Vec<ChildExtractionFailure>,
    pub media_offloaded: usize,
    pub media_failed: usize,
    pub followers_linked: usize,
    pub following_linked: usize,
    pub relations_skipped: usize,
    /// `true` when the post walk stopped early at the run deadline.
    pub budget_exhausted: bool,
    pub elapsed_ms: u64,
}

impl AcquisitionReport {
    fn new(page_id: i64, username: &str) -> Self {
        Self {
            page_id,
            username: username.to_owned(),
            posts_stored: 0,
            posts_skipped: Vec::new(),
            media_offloaded: 0,
            media_failed: 0,
            followers_linked: 0,
            following_linked: 0,
            relations_skipped: 0,
            budget_exhausted: false,
            elapsed_ms: 0,
        }
    }
}

struct PostOutcome {
    offloaded: usize,
    failed: usize,
}

/// Drives one [`PageSource`] run per call. Holds no per-run state, so one
/// engine is shared by every request.
pub struct AcquisitionEngine {
    source: Arc<dyn PageSource>,
    offloader: Arc<dyn MediaOffloader>,
    store: Arc<dyn ProfileStore>,
    settings: AcquireSettings,
}

impl AcquisitionEngine {
    #[must_use]
    pub fn new(
        source: Arc<dyn PageSource>,
        offloader: Arc<dyn MediaOffloader>,
        store: Arc<dyn ProfileStore>,
        settings: AcquireSettings,
    ) -> Self {
        Self {
            source,
            offloader,
            store,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> AcquireSettings {
        self.settings
    }

    fn budget(&self) -> Duration {
        self.settings
            .budget
            .min(Duration::from_secs(MAX_ACQUIRE_BUDGET_SECS))
    }

    /// Acquires `identifier` and persists the profile, its relations and up
    /// to `post_limit` posts.
    ///
    /// # Errors
    ///
    /// Returns [`AcquisitionFailure`] if any profile stage fails or the
    /// budget runs out before the profile is persisted, and
    /// [`AcquisitionFailure::StoreUnavailable`] if the store becomes
    /// unreachable while posts are written. Other relation and post failures
    /// are reported in the [`AcquisitionReport`] instead.
    #[tracing::instrument(skip(self), fields(budget_secs = self.budget().as_secs()))]
    pub async fn acquire(&self, identifier: &str) -> Result<AcquisitionReport, AcquisitionFailure> {
        let started = Instant::now();
        let deadline = started + self.budget();

        let (page, page_id) = match timeout_at(deadline, self.acquire_profile(identifier)).await {
            Ok(Ok(acquired)) => acquired,
            Ok(Err(failure)) => return Err(failure),
            Err(_) => {
                return Err(AcquisitionFailure::BudgetExceeded {
                    stage: "profile",
                    budget_secs: self.budget().as_secs(),
                })
            }
        };

        let mut report = AcquisitionReport::new(page_id, identifier);

        enter(identifier, Stage::LinkRelations);
        if timeout_at(
            deadline,
            self.link_relations(identifier, page.as_ref(), page_id, &mut report),
        )
        .await
        .is_err()
        {
            tracing::warn!(identifier, "budget exhausted while linking relations");
            report.budget_exhausted = true;
        }

        if !report.budget_exhausted {
            self.walk_posts(identifier, page.as_ref(), page_id, deadline, &mut report)
                .await?;
        }

        enter(identifier, Stage::Done);
        report.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            identifier,
            page_id,
            posts_stored = report.posts_stored,
            posts_skipped = report.posts_skipped.len(),
            media_offloaded = report.media_offloaded,
            media_failed = report.media_failed,
            followers = report.followers_linked,
            following = report.following_linked,
            budget_exhausted = report.budget_exhausted,
            elapsed_ms = report.elapsed_ms,
            "acquisition finished"
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Profile stages
    // -----------------------------------------------------------------------

    async fn acquire_profile(
        &self,
        identifier: &str,
    ) -> Result<(Box<dyn PageHandle>, i64), AcquisitionFailure> {
        enter(identifier, Stage::Navigate);
        let page = self.source.render(identifier).await.map_err(|e| {
            if e.is_not_found() {
                AcquisitionFailure::NotFoundUpstream {
                    identifier: identifier.to_owned(),
                }
            } else {
                AcquisitionFailure::Navigation(e.to_string())
            }
        })?;

        enter(identifier, Stage::ExtractProfile);
        let scraped = extract_profile(page.as_ref(), identifier, self.settings.field_timeout).await;
        if scraped.name.is_empty() && scraped.facebook_id.is_none() {
            return Err(AcquisitionFailure::NotFoundUpstream {
                identifier: identifier.to_owned(),
            });
        }

        enter(identifier, Stage::OffloadAvatar);
        if scraped.profile_pic_url.is_empty() {
            return Err(AcquisitionFailure::AvatarOffload(
                "page has no avatar".to_owned(),
            ));
        }
        let key = page_avatar_key(identifier)
            .map_err(|e| AcquisitionFailure::AvatarOffload(e.to_string()))?;
        let avatar_url = self
            .offloader
            .offload(&scraped.profile_pic_url, &key)
            .await
            .map_err(|e| AcquisitionFailure::AvatarOffload(e.to_string()))?;

        enter(identifier, Stage::UpsertProfile);
        let new_page = NewPage::from_scraped(scraped, avatar_url, Utc::now());
        let page_id = self
            .store
            .upsert_page(&new_page)
            .await
            .map_err(|e| AcquisitionFailure::Upsert(e.to_string()))?;

        Ok((page, page_id))
    }

    // -----------------------------------------------------------------------
    // Relations
    // -----------------------------------------------------------------------

    async fn link_relations(
        &self,
        identifier: &str,
        page: &dyn PageHandle,
        page_id: i64,
        report: &mut AcquisitionReport,
    ) {
        for kind in [RelationKind::Follower, RelationKind::Following] {
            let entries = match extract_related_users(page, kind).await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(identifier, %kind, error = %e, "relation list unavailable");
                    continue;
                }
            };

            for entry in entries {
                let linked = match entry {
                    Ok(user) => self.link_user(page_id, user, kind).await,
                    Err(e) => Err(e.to_string()),
                };
                match linked {
                    Ok(()) if kind == RelationKind::Follower => report.followers_linked += 1,
                    Ok(()) => report.following_linked += 1,
                    Err(reason) => {
                        tracing::warn!(identifier, %kind, reason, "skipping relation entry");
                        report.relations_skipped += 1;
                    }
                }
            }
        }
    }

    async fn link_user(
        &self,
        page_id: i64,
        user: ScrapedSocialUser,
        kind: RelationKind,
    ) -> Result<(), String> {
        let profile_pic_s3_url = if user.profile_pic_url.is_empty() {
            None
        } else {
            let offloaded = match user_avatar_key(&user.facebook_id) {
                Ok(key) => self.offloader.offload(&user.profile_pic_url, &key).await,
                Err(e) => Err(e),
            };
            match offloaded {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::debug!(user = %user.facebook_id, error = %e, "user avatar offload failed");
                    None
                }
            }
        };

        let user_id = self
            .store
            .upsert_social_user(&NewSocialUser {
                facebook_id: user.facebook_id,
                name: user.name,
                profile_pic_url: user.profile_pic_url,
                profile_pic_s3_url,
            })
            .await
            .map_err(|e| e.to_string())?;

        self.store
            .link_relation(page_id, user_id, kind)
            .await
            .map_err(|e| e.to_string())
    }

    // -----------------------------------------------------------------------
    // Posts
    // -----------------------------------------------------------------------

    async fn walk_posts(
        &self,
        identifier: &str,
        page: &dyn PageHandle,
        page_id: i64,
        deadline: Instant,
        report: &mut AcquisitionReport,
    ) -> Result<(), AcquisitionFailure> {
        enter(identifier, Stage::ExtractPosts);
        let containers = match timeout_at(deadline, post_containers(page, self.settings.post_limit))
            .await
        {
            Ok(Ok(containers)) => containers,
            Ok(Err(e)) => {
                tracing::warn!(identifier, error = %e, "post list unavailable");
                return Ok(());
            }
            Err(_) => {
                report.budget_exhausted = true;
                return Ok(());
            }
        };

        let mut seen = HashSet::with_capacity(containers.len());
        for (index, container) in containers.iter().enumerate() {
            if Instant::now() >= deadline {
                report.budget_exhausted = true;
                break;
            }

            match timeout_at(
                deadline,
                self.acquire_post(identifier, page_id, index, container.as_ref(), &mut seen),
            )
            .await
            {
                Ok(Ok(outcome)) => {
                    report.posts_stored += 1;
                    report.media_offloaded += outcome.offloaded;
                    report.media_failed += outcome.failed;
                }
                Ok(Err(StepError::Recoverable(failure))) => {
                    tracing::warn!(
                        identifier,
                        index = failure.index,
                        post_id = failure.post_id.as_deref().unwrap_or("-"),
                        reason = %failure.reason,
                        "skipping post"
                    );
                    report.posts_skipped.push(failure);
                }
                Ok(Err(StepError::Fatal(failure))) => {
                    tracing::error!(identifier, index, error = %failure, "aborting post walk");
                    return Err(failure);
                }
                Err(_) => {
                    report.budget_exhausted = true;
                    break;
                }
            }
        }

        if report.budget_exhausted {
            tracing::warn!(
                identifier,
                posts_stored = report.posts_stored,
                "budget exhausted, keeping posts acquired so far"
            );
        }
        Ok(())
    }

    async fn acquire_post(
        &self,
        identifier: &str,
        page_id: i64,
        index: usize,
        container: &dyn ElementHandle,
        seen: &mut HashSet<String>,
    ) -> Result<PostOutcome, StepError> {
        let known_id = post_id(container).await;
        let fail = |reason: String| {
            StepError::Recoverable(ChildExtractionFailure {
                index,
                post_id: known_id.clone(),
                reason,
            })
        };

        enter(identifier, Stage::ExtractFields);
        let scraped = timeout(self.settings.field_timeout, extract_post(container))
            .await
            .map_err(|_| fail("field extraction timed out".to_owned()))?
            .map_err(|e| fail(e.to_string()))?;
        if !seen.insert(scraped.facebook_id.clone()) {
            return Err(fail("duplicate post id".to_owned()));
        }

        enter(identifier, Stage::OffloadMedia);
        let mut media_s3_urls = Vec::with_capacity(scraped.media_urls.len());
        let mut outcome = PostOutcome {
            offloaded: 0,
            failed: 0,
        };
        for (media_index, source_url) in scraped.media_urls.iter().enumerate() {
            let offloaded = match post_media_key(identifier, &scraped.facebook_id, media_index) {
                Ok(key) => self.offloader.offload(source_url, &key).await,
                Err(e) => Err(e),
            };
            match offloaded {
                Ok(url) => {
                    media_s3_urls.push(url);
                    outcome.offloaded += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        identifier,
                        post_id = %scraped.facebook_id,
                        media_index,
                        error = %e,
                        "media offload failed, leaving placeholder"
                    );
                    media_s3_urls.push(String::new());
                    outcome.failed += 1;
                }
            }
        }

        enter(identifier, Stage::UpsertPost);
        let post = NewPost {
            facebook_id: scraped.facebook_id,
            content: scraped.content,
            posted_at: scraped.posted_at,
            likes_count: scraped.likes_count,
            comments_count: scraped.comments_count,
            media_urls: scraped.media_urls,
            media_s3_urls,
        };
        self.store
            .upsert_post(page_id, &post)
            .await
            .map_err(|e| {
                if e.is_connection_failure() {
                    StepError::Fatal(AcquisitionFailure::StoreUnavailable(e.to_string()))
                } else {
                    fail(e.to_string())
                }
            })?;

        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "acquire_test.rs"]
mod tests;
