//! Group membership diffing.
//!
//! [`MembershipDiff::between`] is pure set algebra over principal IDs.
//! [`apply_membership`] turns a diff into Looker calls, additions first, and
//! reports exactly which calls succeeded when one fails, since Looker has no
//! atomic batch membership call.

use crate::error::{ReconcileError, ReconcileResult};
use looker_client::LookerApi;
use looker_model::PrincipalId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// One membership mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "user_id", rename_all = "snake_case")]
pub enum MembershipChange {
    /// Add the user to the group.
    Add(PrincipalId),
    /// Remove the user from the group.
    Remove(PrincipalId),
}

impl MembershipChange {
    /// The user affected by this change.
    pub fn user_id(&self) -> &PrincipalId {
        match self {
            MembershipChange::Add(id) | MembershipChange::Remove(id) => id,
        }
    }

    /// Apply this change to a local membership set.
    pub fn apply_to(&self, members: &mut BTreeSet<PrincipalId>) {
        match self {
            MembershipChange::Add(id) => {
                members.insert(id.clone());
            }
            MembershipChange::Remove(id) => {
                members.remove(id);
            }
        }
    }
}

impl fmt::Display for MembershipChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipChange::Add(id) => write!(f, "add {}", id),
            MembershipChange::Remove(id) => write!(f, "remove {}", id),
        }
    }
}

/// Difference between desired and observed membership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    /// Desired but not observed.
    pub to_add: BTreeSet<PrincipalId>,
    /// Observed but not desired.
    pub to_remove: BTreeSet<PrincipalId>,
}

impl MembershipDiff {
    /// Compute `(desired - observed, observed - desired)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use looker_model::PrincipalId;
    /// use looker_reconcile::MembershipDiff;
    /// use std::collections::BTreeSet;
    ///
    /// let ids = |xs: &[&str]| xs.iter().map(|x| PrincipalId::new(*x)).collect::<BTreeSet<_>>();
    /// let diff = MembershipDiff::between(&ids(&["u1", "u2", "u3"]), &ids(&["u1", "u4"]));
    /// assert_eq!(diff.to_add, ids(&["u2", "u3"]));
    /// assert_eq!(diff.to_remove, ids(&["u4"]));
    /// ```
    pub fn between(desired: &BTreeSet<PrincipalId>, observed: &BTreeSet<PrincipalId>) -> Self {
        Self {
            to_add: desired.difference(observed).cloned().collect(),
            to_remove: observed.difference(desired).cloned().collect(),
        }
    }

    /// Whether there is nothing to do.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// The changes to issue: every addition, then every removal.
    pub fn changes(&self) -> Vec<MembershipChange> {
        self.to_add
            .iter()
            .cloned()
            .map(MembershipChange::Add)
            .chain(self.to_remove.iter().cloned().map(MembershipChange::Remove))
            .collect()
    }

    /// Apply the diff to a local membership set.
    pub fn apply_to(&self, members: &mut BTreeSet<PrincipalId>) {
        for change in self.changes() {
            change.apply_to(members);
        }
    }
}

/// Apply `diff` to a Looker group, one call per change.
///
/// # Returns
///
/// The applied changes in order, or [`ReconcileError::PartiallyApplied`]
/// naming the changes that succeeded before the first failure.
#[instrument(skip(api, diff), fields(adds = diff.to_add.len(), removes = diff.to_remove.len()))]
pub async fn apply_membership(
    api: &dyn LookerApi,
    group_id: &str,
    diff: &MembershipDiff,
) -> ReconcileResult<Vec<MembershipChange>> {
    let mut applied = Vec::new();

    for change in diff.changes() {
        debug!(%change, "Applying membership change");
        let result = match &change {
            MembershipChange::Add(id) => api.add_group_user(group_id, id).await,
            MembershipChange::Remove(id) => api.remove_group_user(group_id, id).await,
        };

        if let Err(source) = result {
            warn!(
                %change,
                applied = applied.len(),
                "Membership change failed on group {}", group_id
            );
            return Err(ReconcileError::PartiallyApplied {
                target: format!("group {}", group_id),
                applied,
                failed: change,
                source,
            });
        }
        applied.push(change);
    }

    if !applied.is_empty() {
        info!("Applied {} membership changes to group {}", applied.len(), group_id);
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(xs: &[&str]) -> BTreeSet<PrincipalId> {
        xs.iter().map(|x| PrincipalId::new(*x)).collect()
    }

    #[test]
    fn test_diff_is_set_difference() {
        let desired = ids(&["u1", "u2", "u3"]);
        let observed = ids(&["u1", "u4"]);
        let diff = MembershipDiff::between(&desired, &observed);

        assert_eq!(diff.to_add, ids(&["u2", "u3"]));
        assert_eq!(diff.to_remove, ids(&["u4"]));

        let mut members = observed.clone();
        diff.apply_to(&mut members);
        assert_eq!(members, desired);
    }

    #[test]
    fn test_diff_against_self_is_empty() {
        let set = ids(&["a", "b"]);
        let diff = MembershipDiff::between(&set, &set);
        assert!(diff.is_empty());
        assert!(diff.changes().is_empty());

        assert!(MembershipDiff::between(&BTreeSet::new(), &BTreeSet::new()).is_empty());
    }

    #[test]
    fn test_diff_properties_over_many_sets() {
        let universe = ["a", "b", "c", "d", "e"];
        let subsets: Vec<BTreeSet<PrincipalId>> = (0u32..32)
            .map(|mask| {
                universe
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| mask & (1 << i) != 0)
                    .map(|(_, x)| PrincipalId::new(*x))
                    .collect()
            })
            .collect();

        for desired in &subsets {
            for observed in &subsets {
                let diff = MembershipDiff::between(desired, observed);
                assert!(diff.to_add.iter().all(|x| desired.contains(x) && !observed.contains(x)));
                assert!(diff.to_remove.iter().all(|x| observed.contains(x) && !desired.contains(x)));
                assert!(diff.to_add.is_disjoint(&diff.to_remove));

                let mut members = observed.clone();
                diff.apply_to(&mut members);
                assert_eq!(&members, desired);
            }
        }
    }

    #[test]
    fn test_changes_put_adds_first() {
        let diff = MembershipDiff::between(&ids(&["z"]), &ids(&["a"]));
        assert_eq!(
            diff.changes(),
            vec![
                MembershipChange::Add(PrincipalId::new("z")),
                MembershipChange::Remove(PrincipalId::new("a")),
            ]
        );
    }

    #[test]
    fn test_change_serde() {
        let json = serde_json::to_value(MembershipChange::Remove(PrincipalId::new("u4"))).unwrap();
        assert_eq!(json, serde_json::json!({"op": "remove", "user_id": "u4"}));
    }
}
