//! Error types for reconciliation.
//!
//! Every failure is terminal for the operation that raised it. Nothing is
//! retried here, and a vanished object is reported through
//! [`Observed::Vanished`](crate::driver::Observed) rather than as an error.

use crate::membership::MembershipChange;
use crate::resources::ResourceState;
use looker_client::ApiError;
use looker_model::Principal;
use thiserror::Error;

/// Coarse classification of a [`ReconcileError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A lookup yielded nothing.
    NotFound,
    /// A lookup yielded more than one candidate.
    AmbiguousIdentity,
    /// A workflow precondition does not hold.
    PreconditionFailed,
    /// The remote state breaks an assumed invariant.
    InvariantViolation,
    /// Transport or API failure.
    RemoteError,
    /// Missing or conflicting input.
    InvalidSpec,
}

/// Reconciliation error types.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A lookup by name or email matched nothing.
    #[error("No {what} found for {key}")]
    NotFound {
        /// Kind of object looked up.
        what: &'static str,
        /// The name, email or ID searched for.
        key: String,
    },

    /// A lookup matched more than one object.
    #[error("Found {matches} {what}s for {key}, expected exactly one")]
    AmbiguousIdentity {
        /// Kind of object looked up.
        what: &'static str,
        /// The name, email or ID searched for.
        key: String,
        /// Number of matches.
        matches: usize,
    },

    /// An override was requested but no grant exists to convert.
    #[error(
        "No inherited permission found for {principal} on content {content_metadata_id} to override; \
         the principal must have parent access first"
    )]
    NoInheritedGrantToOverride {
        /// Access-control context that was searched.
        content_metadata_id: String,
        /// Principal without a grant.
        principal: Principal,
    },

    /// Remote state violates an invariant the reconcilers rely on.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// The requested spec is missing input or contradicts itself.
    #[error("Invalid spec: {0}")]
    InvalidSpec(String),

    /// Looker API failure, passed through verbatim.
    #[error(transparent)]
    Remote(#[from] ApiError),

    /// A multi-call change failed partway through.
    #[error(
        "Partially applied changes to {target}: {} succeeded before {failed} failed: {source}",
        .applied.len()
    )]
    PartiallyApplied {
        /// Object the changes were applied to.
        target: String,
        /// Changes that succeeded, in order.
        applied: Vec<MembershipChange>,
        /// The change that failed.
        failed: MembershipChange,
        /// Why it failed.
        #[source]
        source: ApiError,
    },

    /// The object was created but a follow-up call failed. The created
    /// state must be tracked so the next pass updates instead of creating.
    #[error(
        "Created {} {} but a follow-up call failed: {source}",
        .state.kind(),
        .state.id()
    )]
    IncompleteCreate {
        /// What was created, as far as it got.
        state: Box<ResourceState>,
        /// The follow-up failure.
        #[source]
        source: Box<ReconcileError>,
    },
}

/// Result type for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

impl ReconcileError {
    /// Build a not-found error.
    pub fn not_found(what: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            key: key.into(),
        }
    }

    /// Wrap a failure that happened after `state` was created.
    pub fn incomplete_create(state: ResourceState, source: ReconcileError) -> Self {
        Self::IncompleteCreate {
            state: Box::new(state),
            source: Box::new(source),
        }
    }

    /// State that exists remotely despite the error, if any.
    pub fn created_state(&self) -> Option<&ResourceState> {
        match self {
            ReconcileError::IncompleteCreate { state, .. } => Some(&**state),
            _ => None,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReconcileError::NotFound { .. } => ErrorKind::NotFound,
            ReconcileError::Remote(e) if e.is_not_found() => ErrorKind::NotFound,
            ReconcileError::AmbiguousIdentity { .. } => ErrorKind::AmbiguousIdentity,
            ReconcileError::NoInheritedGrantToOverride { .. } => ErrorKind::PreconditionFailed,
            ReconcileError::InvariantViolation(_) => ErrorKind::InvariantViolation,
            ReconcileError::InvalidSpec(_) => ErrorKind::InvalidSpec,
            ReconcileError::Remote(_) | ReconcileError::PartiallyApplied { .. } => {
                ErrorKind::RemoteError
            }
            ReconcileError::IncompleteCreate { source, .. } => source.kind(),
        }
    }

    /// Get a stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ReconcileError::NotFound { .. } => "NOT_FOUND",
            ReconcileError::AmbiguousIdentity { .. } => "AMBIGUOUS_IDENTITY",
            ReconcileError::NoInheritedGrantToOverride { .. } => "NO_INHERITED_GRANT",
            ReconcileError::InvariantViolation(_) => "INVARIANT_VIOLATION",
            ReconcileError::InvalidSpec(_) => "INVALID_SPEC",
            ReconcileError::Remote(ApiError::NotFound { .. }) => "REMOTE_NOT_FOUND",
            ReconcileError::Remote(ApiError::AuthenticationFailed) => "AUTHENTICATION_FAILED",
            ReconcileError::Remote(_) => "REMOTE_ERROR",
            ReconcileError::PartiallyApplied { .. } => "PARTIALLY_APPLIED",
            ReconcileError::IncompleteCreate { .. } => "INCOMPLETE_CREATE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::RoleGroupsState;
    use looker_model::PrincipalId;

    #[test]
    fn test_kind_classification() {
        let err = ReconcileError::NoInheritedGrantToOverride {
            content_metadata_id: "40".to_string(),
            principal: Principal::group("7"),
        };
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
        assert_eq!(err.error_code(), "NO_INHERITED_GRANT");

        let err: ReconcileError = ApiError::not_found("group", "9").into();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err: ReconcileError = ApiError::Api {
            status: 500,
            message: "boom".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::RemoteError);
        assert_eq!(err.to_string(), "API error (500): boom");
    }

    #[test]
    fn test_partially_applied_message() {
        let err = ReconcileError::PartiallyApplied {
            target: "group 3".to_string(),
            applied: vec![MembershipChange::Add(PrincipalId::new("u2"))],
            failed: MembershipChange::Add(PrincipalId::new("u3")),
            source: ApiError::Api {
                status: 500,
                message: "boom".to_string(),
            },
        };
        assert_eq!(err.kind(), ErrorKind::RemoteError);
        assert_eq!(
            err.to_string(),
            "Partially applied changes to group 3: 1 succeeded before add u3 failed: API error (500): boom"
        );
    }

    #[test]
    fn test_incomplete_create_carries_state() {
        let state = ResourceState::RoleGroups(RoleGroupsState {
            role_id: "3".to_string(),
            group_ids: Default::default(),
        });
        let err = ReconcileError::incomplete_create(
            state.clone(),
            ApiError::Api {
                status: 500,
                message: "boom".to_string(),
            }
            .into(),
        );
        assert_eq!(err.created_state(), Some(&state));
        assert_eq!(err.kind(), ErrorKind::RemoteError);
        assert_eq!(err.error_code(), "INCOMPLETE_CREATE");
        assert_eq!(
            err.to_string(),
            "Created role_groups 3 but a follow-up call failed: API error (500): boom"
        );
        assert!(ReconcileError::InvalidSpec("x".into()).created_state().is_none());
    }
}
