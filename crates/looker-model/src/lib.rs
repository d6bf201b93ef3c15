//! # Looker Model
//!
//! Domain types for the Looker access-control objects managed by the
//! reconciliation crates.
//!
//! ## Overview
//!
//! The looker-model crate covers:
//! - **Principals**: Users and groups that can hold access grants
//! - **Grants**: Folder access grants and their permission levels
//! - **Groups**: Named groups with user membership
//! - **Folders**: Folders and the content metadata that carries their grants
//! - **Roles**: Permission sets, model sets and the roles that bind them
//!
//! ## Architecture
//!
//! ```text
//! Role ─┬─ PermissionSet
//!       ├─ ModelSet
//!       └─ Groups ─── Users
//!
//! Folder ─── ContentMetadata (inherits?) ─── AccessGrant* (principal, level)
//! ```
//!
//! A folder's grants are not attached to the folder ID but to its
//! content-metadata ID. At most one grant exists per principal on a
//! content-metadata context.
//!
//! ## Usage
//!
//! ```rust
//! use looker_model::{AccessGrant, PermissionLevel, Principal};
//!
//! let grant = AccessGrant::new("17", "cm-4", Principal::group("9"), PermissionLevel::View);
//! assert!(grant.belongs_to(&Principal::group("9")));
//! assert!(!grant.belongs_to(&Principal::user("9")));
//! ```

pub mod folder;
pub mod grant;
pub mod group;
pub mod principal;
pub mod roles;

// Re-export main types for convenience
pub use folder::{ContentMetadata, Folder};
pub use grant::{AccessGrant, GrantOrigin, PermissionLevel};
pub use group::Group;
pub use principal::{Principal, PrincipalId, User};
pub use roles::{ModelSet, PermissionSet, Role};
