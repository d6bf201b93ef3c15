//! Permission sets, model sets and roles
//!
//! A role binds one permission set (what a user may do) to one model set
//! (which LookML models they may do it on). Roles are granted to groups.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named collection of Looker permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    /// Permission set ID.
    pub id: String,

    /// Name.
    pub name: String,

    /// Permission identifiers (e.g. `access_data`, `see_looks`).
    #[serde(default)]
    pub permissions: BTreeSet<String>,

    /// Whether this is a Looker built-in set.
    #[serde(default)]
    pub built_in: bool,

    /// Whether this set grants every permission.
    #[serde(default)]
    pub all_access: bool,

    /// API URL of the set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A named collection of LookML models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSet {
    /// Model set ID.
    pub id: String,

    /// Name.
    pub name: String,

    /// LookML model names.
    #[serde(default)]
    pub models: BTreeSet<String>,

    /// Whether this is a Looker built-in set.
    #[serde(default)]
    pub built_in: bool,

    /// Whether this set covers every model.
    #[serde(default)]
    pub all_access: bool,

    /// API URL of the set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A role: permission set on model set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role ID.
    pub id: String,

    /// Name.
    pub name: String,

    /// Bound permission set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_set_id: Option<String>,

    /// Bound model set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_set_id: Option<String>,

    /// API URL of the role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}
