//! Email to user ID resolution.

use crate::error::{ReconcileError, ReconcileResult};
use looker_client::LookerApi;
use looker_model::PrincipalId;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Resolves user emails to Looker user IDs.
///
/// An email must match exactly one user; no match and several matches are
/// both errors.
#[derive(Clone)]
pub struct IdentityResolver {
    api: Arc<dyn LookerApi>,
}

impl IdentityResolver {
    /// Create a resolver over `api`.
    pub fn new(api: Arc<dyn LookerApi>) -> Self {
        Self { api }
    }

    /// Resolve one email.
    ///
    /// # Arguments
    ///
    /// * `email` - Exact email address; surrounding whitespace is ignored
    ///
    /// # Returns
    ///
    /// The user's ID, [`ReconcileError::NotFound`] on zero matches, or
    /// [`ReconcileError::AmbiguousIdentity`] on several.
    #[instrument(skip(self))]
    pub async fn resolve(&self, email: &str) -> ReconcileResult<PrincipalId> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ReconcileError::InvalidSpec(
                "user email must not be empty".to_string(),
            ));
        }

        let mut users = self.api.search_users_by_email(email).await?;
        match users.len() {
            0 => Err(ReconcileError::not_found("user", email)),
            1 => {
                let user = users.remove(0);
                debug!(user_id = %user.id, "Resolved email");
                Ok(user.id)
            }
            n => {
                warn!("Email {} matches {} users", email, n);
                Err(ReconcileError::AmbiguousIdentity {
                    what: "user",
                    key: email.to_string(),
                    matches: n,
                })
            }
        }
    }

    /// Resolve every email, failing on the first error.
    ///
    /// Never returns a partial set: either every email resolved or the
    /// call fails.
    pub async fn resolve_all<I, S>(&self, emails: I) -> ReconcileResult<BTreeSet<PrincipalId>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids = BTreeSet::new();
        for email in emails {
            ids.insert(self.resolve(email.as_ref()).await?);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use looker_client::MemoryLooker;

    async fn resolver() -> (Arc<MemoryLooker>, IdentityResolver) {
        let looker = MemoryLooker::new_shared();
        looker.seed_user("u1", "ann@example.com").await;
        looker.seed_user("u2", "bob@example.com").await;
        looker.seed_user("u3", "shared@example.com").await;
        looker.seed_user("u4", "shared@example.com").await;
        let resolver = IdentityResolver::new(looker.clone());
        (looker, resolver)
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let (_, resolver) = resolver().await;
        let first = resolver.resolve("ann@example.com").await.unwrap();
        let second = resolver.resolve("  ann@example.com ").await.unwrap();
        assert_eq!(first, PrincipalId::new("u1"));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_resolve_rejects_zero_and_many() {
        let (_, resolver) = resolver().await;

        let err = resolver.resolve("nobody@example.com").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = resolver.resolve("shared@example.com").await.unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::AmbiguousIdentity { matches: 2, .. }
        ));

        let err = resolver.resolve("   ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSpec);
    }

    #[tokio::test]
    async fn test_resolve_all_fails_without_partial_result() {
        let (looker, resolver) = resolver().await;

        let ids = resolver
            .resolve_all(["ann@example.com", "bob@example.com"])
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);

        let result = resolver
            .resolve_all(["ann@example.com", "ghost@example.com", "bob@example.com"])
            .await;
        assert!(result.is_err());
        assert_eq!(looker.mutation_count().await, 0);
    }
}
