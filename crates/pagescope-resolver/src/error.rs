use pagescope_core::IdentifierError;
use serde::Serialize;
use thiserror::Error;

/// Outcome of a failed `resolve`/`refresh`, shared by every caller of a
/// coalesced lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] IdentifierError),

    #[error("profile {identifier} does not exist upstream")]
    NotFoundUpstream { identifier: String },

    #[error("acquisition of {identifier} failed: {cause}")]
    Acquisition { identifier: String, cause: String },

    #[error("profile store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Profile-level failure that aborts an acquisition run. Nothing about the
/// profile is persisted when one of these is returned before the profile
/// upsert.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquisitionFailure {
    #[error("no page for {identifier} upstream")]
    NotFoundUpstream { identifier: String },

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("avatar offload failed: {0}")]
    AvatarOffload(String),

    #[error("profile upsert failed: {0}")]
    Upsert(String),

    /// The store went away after the profile was written.
    #[error("profile store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("acquisition budget of {budget_secs}s exceeded during {stage}")]
    BudgetExceeded { stage: &'static str, budget_secs: u64 },
}

impl AcquisitionFailure {
    #[must_use]
    pub fn into_resolve_error(self, identifier: &str) -> ResolveError {
        match self {
            AcquisitionFailure::NotFoundUpstream { identifier } => {
                ResolveError::NotFoundUpstream { identifier }
            }
            AcquisitionFailure::StoreUnavailable(cause) => ResolveError::StoreUnavailable(cause),
            other => ResolveError::Acquisition {
                identifier: identifier.to_owned(),
                cause: other.to_string(),
            },
        }
    }
}

/// One post that could not be extracted or stored. The run continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildExtractionFailure {
    /// Position of the post in page order.
    pub index: usize,
    pub post_id: Option<String>,
    pub reason: String,
}

/// Result type of a single acquisition step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    /// Skip this child and keep going.
    Recoverable(ChildExtractionFailure),
    /// Abort the run.
    Fatal(AcquisitionFailure),
}

impl From<AcquisitionFailure> for StepError {
    fn from(failure: AcquisitionFailure) -> Self {
        StepError::Fatal(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_resolve_not_found() {
        let err = AcquisitionFailure::NotFoundUpstream {
            identifier: "ghost".to_owned(),
        }
        .into_resolve_error("ghost");
        assert_eq!(
            err,
            ResolveError::NotFoundUpstream {
                identifier: "ghost".to_owned()
            }
        );
    }

    #[test]
    fn store_outage_maps_to_store_unavailable() {
        let err = AcquisitionFailure::StoreUnavailable("pool timed out".to_owned())
            .into_resolve_error("acme");
        assert_eq!(err, ResolveError::StoreUnavailable("pool timed out".to_owned()));
    }

    #[test]
    fn other_failures_carry_their_cause() {
        let err = AcquisitionFailure::AvatarOffload("HTTP 403".to_owned()).into_resolve_error("acme");
        match err {
            ResolveError::Acquisition { identifier, cause } => {
                assert_eq!(identifier, "acme");
                assert!(cause.contains("avatar offload failed"));
                assert!(cause.contains("HTTP 403"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
