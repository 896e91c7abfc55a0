//! Validation for the profile identifiers accepted by the resolver.
//!
//! An identifier ends up in a cache key, a SQL parameter, a source URL path
//! segment and a blob key prefix, so it is restricted to a conservative
//! character set up front.

use thiserror::Error;

/// Upper bound on identifier length; matches the `pages.username` column.
pub const MAX_IDENTIFIER_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("identifier is empty")]
    Empty,
    #[error("identifier exceeds {MAX_IDENTIFIER_LEN} characters")]
    TooLong,
    #[error("identifier contains invalid character {0:?}")]
    InvalidChar(char),
    #[error("identifier must not consist only of dots")]
    DotsOnly,
}

/// Validates a profile identifier (page username).
///
/// Accepts ASCII letters, digits, `.`, `_` and `-`, 1 to
/// [`MAX_IDENTIFIER_LEN`] characters long. Identifiers made only of dots are
/// rejected since they would become `.`/`..` path segments.
///
/// # Errors
///
/// Returns the first [`IdentifierError`] the input violates.
pub fn validate_identifier(identifier: &str) -> Result<&str, IdentifierError> {
    if identifier.is_empty() {
        return Err(IdentifierError::Empty);
    }
    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(IdentifierError::TooLong);
    }
    if let Some(bad) = identifier
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(IdentifierError::InvalidChar(bad));
    }
    if identifier.chars().all(|c| c == '.') {
        return Err(IdentifierError::DotsOnly);
    }
    Ok(identifier)
}
