//! Folder access grants
//!
//! A grant pairs a principal with a permission level on one content-metadata
//! context. Looker exposes no flag telling an inherited grant apart from a
//! direct one, so the origin of a tracked grant is recorded locally.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::principal::Principal;

/// Access level granted on a folder.
///
/// Looker calls this the content-metadata `permission_type`.
///
/// # Examples
///
/// ```
/// use looker_model::PermissionLevel;
///
/// assert_eq!(PermissionLevel::parse("edit"), Some(PermissionLevel::Edit));
/// assert_eq!(PermissionLevel::parse("View"), Some(PermissionLevel::View));
/// assert_eq!(PermissionLevel::parse("manage"), None);
/// assert_eq!(PermissionLevel::Edit.as_str(), "edit");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    /// View the folder and its content.
    View,

    /// Edit content and manage access.
    Edit,
}

impl PermissionLevel {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
        }
    }

    /// Parse from the wire representation (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "view" => Some(Self::View),
            "edit" => Some(Self::Edit),
            _ => None,
        }
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a tracked grant came under management.
///
/// - **Created**: this system minted the grant
/// - **Adopted**: the grant already existed (inherited or direct) and was
///   taken over, possibly mutated in place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantOrigin {
    /// Minted by this system.
    Created,

    /// Discovered pre-existing.
    Adopted,
}

impl GrantOrigin {
    /// String representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Adopted => "adopted",
        }
    }
}

impl fmt::Display for GrantOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An access grant attached to one content-metadata context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// Grant ID (the content_metadata_access ID).
    pub id: String,

    /// The content-metadata context this grant belongs to.
    pub content_metadata_id: String,

    /// Holder of the grant.
    pub principal: Principal,

    /// Granted level.
    pub level: PermissionLevel,
}

impl AccessGrant {
    /// Create a grant value.
    pub fn new(
        id: impl Into<String>,
        content_metadata_id: impl Into<String>,
        principal: Principal,
        level: PermissionLevel,
    ) -> Self {
        Self {
            id: id.into(),
            content_metadata_id: content_metadata_id.into(),
            principal,
            level,
        }
    }

    /// Whether this grant is held by `principal`.
    pub fn belongs_to(&self, principal: &Principal) -> bool {
        &self.principal == principal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_level_serde() {
        let json = serde_json::to_string(&PermissionLevel::Edit).unwrap();
        assert_eq!(json, "\"edit\"");
        let level: PermissionLevel = serde_json::from_str("\"view\"").unwrap();
        assert_eq!(level, PermissionLevel::View);
    }

    #[test]
    fn test_permission_level_parse_trims() {
        assert_eq!(PermissionLevel::parse(" edit "), Some(PermissionLevel::Edit));
        assert_eq!(PermissionLevel::parse(""), None);
    }

    #[test]
    fn test_grant_origin_display() {
        assert_eq!(GrantOrigin::Created.to_string(), "created");
        assert_eq!(GrantOrigin::Adopted.to_string(), "adopted");
    }

    #[test]
    fn test_grant_belongs_to_principal() {
        let grant = AccessGrant::new("1", "cm", Principal::user("8"), PermissionLevel::Edit);
        assert!(grant.belongs_to(&Principal::user("8")));
        assert!(!grant.belongs_to(&Principal::group("8")));
        assert!(!grant.belongs_to(&Principal::user("9")));
    }
}
