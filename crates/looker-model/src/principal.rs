//! Principals
//!
//! A principal is anything that can hold an access grant. Looker attaches
//! folder grants either to a group or to an individual user.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque Looker identifier of a user or group.
///
/// Looker API 4.0 uses string IDs everywhere; this type keeps them from being
/// mixed up with names or emails.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Wrap a raw ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw ID.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the raw ID.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PrincipalId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PrincipalId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The holder of an access grant.
///
/// # Examples
///
/// ```
/// use looker_model::Principal;
///
/// assert_eq!(Principal::parse("group:12"), Some(Principal::group("12")));
/// assert_eq!(Principal::parse("user:7"), Some(Principal::user("7")));
/// // A bare ID names a group.
/// assert_eq!(Principal::parse("12"), Some(Principal::group("12")));
/// assert_eq!(Principal::parse("role:3"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Principal {
    /// A Looker group.
    Group(PrincipalId),

    /// An individual Looker user.
    User(PrincipalId),
}

impl Principal {
    /// Group principal.
    pub fn group(id: impl Into<PrincipalId>) -> Self {
        Self::Group(id.into())
    }

    /// User principal.
    pub fn user(id: impl Into<PrincipalId>) -> Self {
        Self::User(id.into())
    }

    /// The principal's ID regardless of its type.
    pub fn id(&self) -> &PrincipalId {
        match self {
            Self::Group(id) | Self::User(id) => id,
        }
    }

    /// Type prefix used in the textual form.
    pub fn type_str(&self) -> &'static str {
        match self {
            Self::Group(_) => "group",
            Self::User(_) => "user",
        }
    }

    /// Parse `group:<id>`, `user:<id>` or a bare `<id>` (a group).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (kind, id) = match s.split_once(':') {
            Some((kind, id)) => (kind, id),
            None => ("group", s),
        };
        if id.is_empty() {
            return None;
        }
        match kind.to_lowercase().as_str() {
            "group" => Some(Self::group(id)),
            "user" => Some(Self::user(id)),
            _ => None,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_str(), self.id())
    }
}

/// A Looker user, as returned by user search.
///
/// Users are never created by this system, only resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User ID.
    pub id: PrincipalId,

    /// Primary email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl User {
    /// Create a user with an email.
    pub fn new(id: impl Into<PrincipalId>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: Some(email.into()),
            display_name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_display_round_trips_through_parse() {
        let principal = Principal::user("42");
        assert_eq!(principal.to_string(), "user:42");
        assert_eq!(Principal::parse(&principal.to_string()), Some(principal));
    }

    #[test]
    fn test_principal_parse_rejects_empty_id() {
        assert_eq!(Principal::parse("group:"), None);
        assert_eq!(Principal::parse(""), None);
    }

    #[test]
    fn test_principal_parse_is_case_insensitive_on_type() {
        assert_eq!(Principal::parse("USER:5"), Some(Principal::user("5")));
    }

    #[test]
    fn test_group_and_user_with_same_id_differ() {
        assert_ne!(Principal::group("1"), Principal::user("1"));
        assert_eq!(Principal::group("1").id(), Principal::user("1").id());
    }

    #[test]
    fn test_principal_serde_shape() {
        let json = serde_json::to_value(Principal::group("3")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "group", "id": "3"}));
    }
}
