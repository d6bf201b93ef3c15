//! Folders and content metadata
//!
//! A folder (called a "space" in older Looker releases) owns a separate
//! content-metadata record. Access grants attach to that record, and its
//! `inherits` flag decides whether the folder takes its grants from the parent.

use serde::{Deserialize, Serialize};

/// A Looker folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    /// Folder ID.
    pub id: String,

    /// Folder name.
    pub name: String,

    /// Parent folder ID. Only the root folders have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// ID of the content metadata holding this folder's grants.
    pub content_metadata_id: String,

    /// Whether this is a user's personal folder.
    #[serde(default)]
    pub is_personal: bool,
}

/// Content metadata for a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMetadata {
    /// Whether grants flow down from the parent folder.
    pub inherits: bool,
}
