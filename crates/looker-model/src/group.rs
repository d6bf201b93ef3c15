//! Groups

use serde::{Deserialize, Serialize};

use crate::principal::PrincipalId;

/// A Looker group.
///
/// Membership is not part of this value; it is listed separately through the
/// group users endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Group ID.
    pub id: PrincipalId,

    /// Group name.
    pub name: String,

    /// Number of users, when the API reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_count: Option<i64>,
}

impl Group {
    /// Create a group value.
    pub fn new(id: impl Into<PrincipalId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            user_count: None,
        }
    }
}
