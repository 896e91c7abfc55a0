//! Assembly of the [`Profile`] read model from its four tables.

use pagescope_core::{Post, Profile, RelationKind, SocialUser};
use sqlx::PgPool;

use crate::{
    pages::{get_page_by_username, PageRow},
    posts::list_posts_for_page,
    social_users::list_related_users,
    DbError,
};

/// Number of most-recent posts embedded in a loaded profile.
pub const PROFILE_POST_LIMIT: i64 = 25;

/// Load a stored profile with its recent posts and both relation sets.
///
/// Returns `Ok(None)` when no page has `username`.
///
/// # Errors
///
/// Returns [`DbError`] on database query failure.
pub async fn load_profile(pool: &PgPool, username: &str) -> Result<Option<Profile>, DbError> {
    let Some(page) = get_page_by_username(pool, username).await? else {
        return Ok(None);
    };

    let posts = list_posts_for_page(pool, page.id, PROFILE_POST_LIMIT, 0).await?;
    let followers = list_related_users(pool, page.id, RelationKind::Follower, i64::MAX, 0).await?;
    let following = list_related_users(pool, page.id, RelationKind::Following, i64::MAX, 0).await?;

    Ok(Some(assemble(
        page,
        posts.into_iter().map(Post::from).collect(),
        followers.into_iter().map(SocialUser::from).collect(),
        following.into_iter().map(SocialUser::from).collect(),
    )))
}

fn assemble(
    page: PageRow,
    posts: Vec<Post>,
    followers: Vec<SocialUser>,
    following: Vec<SocialUser>,
) -> Profile {
    Profile {
        id: page.id,
        username: page.username,
        facebook_id: page.facebook_id,
        name: page.name,
        url: page.url,
        profile_pic_url: page.profile_pic_url,
        profile_pic_s3_url: page.profile_pic_s3_url,
        email: page.email,
        website: page.website,
        category: page.category,
        followers_count: page.followers_count,
        likes_count: page.likes_count,
        created_at: page.created_at,
        last_scraped: page.last_scraped,
        posts,
        followers,
        following,
    }
}
