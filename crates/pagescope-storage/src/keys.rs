//! Deterministic blob keys for offloaded media.
//!
//! Re-acquiring the same entity writes to the same keys, so offloading is
//! idempotent per key.

use crate::error::StorageError;

/// `pages/{username}/profile.jpg`
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] if `username` is not a valid key
/// segment.
pub fn page_avatar_key(username: &str) -> Result<String, StorageError> {
    validate_segment(username)?;
    Ok(format!("pages/{username}/profile.jpg"))
}

/// `pages/{username}/posts/{post_id}/media_{index}.jpg`
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] if `username` or `post_id` is not a
/// valid key segment.
pub fn post_media_key(username: &str, post_id: &str, index: usize) -> Result<String, StorageError> {
    validate_segment(username)?;
    validate_segment(post_id)?;
    Ok(format!("pages/{username}/posts/{post_id}/media_{index}.jpg"))
}

/// `users/{facebook_id}/profile.jpg`
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] if `facebook_id` is not a valid key
/// segment.
pub fn user_avatar_key(facebook_id: &str) -> Result<String, StorageError> {
    validate_segment(facebook_id)?;
    Ok(format!("users/{facebook_id}/profile.jpg"))
}

/// Rejects keys that are empty, absolute, contain `\`, or contain `.`/`..`
/// or empty segments.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] describing the first violation.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = |reason: &str| StorageError::InvalidKey {
        key: key.to_owned(),
        reason: reason.to_owned(),
    };

    if key.trim().is_empty() {
        return Err(invalid("key is empty"));
    }
    if key.starts_with('/') {
        return Err(invalid("key must not start with '/'"));
    }
    if key.contains('\\') {
        return Err(invalid("key must not contain '\\'"));
    }
    if key
        .split('/')
        .any(|seg| seg.is_empty() || seg == "." || seg == "..")
    {
        return Err(invalid("key must not contain empty, '.' or '..' segments"));
    }
    Ok(())
}

fn validate_segment(segment: &str) -> Result<(), StorageError> {
    if segment.contains('/') {
        return Err(StorageError::InvalidKey {
            key: segment.to_owned(),
            reason: "segment must not contain '/'".to_owned(),
        });
    }
    validate_key(segment)
}
