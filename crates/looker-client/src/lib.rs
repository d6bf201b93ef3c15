//! # Looker Client
//!
//! The remote boundary used by the reconciliation crates.
//!
//! ## Overview
//!
//! The looker-client crate provides:
//! - **`LookerApi`**: the coarse CRUD operations the reconcilers rely on
//! - **`ApiError`**: remote failures, with a distinguishable "not found"
//! - **`LookerConfig`**: base URL and API3 credentials, loaded from the
//!   environment or set explicitly
//! - **`LookerClient`**: the reqwest implementation against Looker API 4.0
//! - **`MemoryLooker`**: an in-memory Looker (feature `memory`, on by
//!   default) for tests and dry runs
//!
//! The API offers no upsert and no server-side "grant for principal X"
//! query; callers list and scan.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use looker_client::{LookerApi, LookerClient, LookerConfig};
//! use std::sync::Arc;
//!
//! async fn connect() -> Result<Arc<dyn LookerApi>, Box<dyn std::error::Error>> {
//!     let config = LookerConfig::from_env();
//!     config.validate()?;
//!     let client = LookerClient::connect(config).await?;
//!     Ok(Arc::new(client))
//! }
//! ```

pub mod api;
pub mod config;
pub mod http;
#[cfg(feature = "memory")]
pub mod memory;
mod wire;

pub use api::{ApiError, ApiResult, LookerApi, WriteFolder, WriteModelSet, WritePermissionSet, WriteRole};
pub use config::{ConfigError, LookerConfig};
pub use http::LookerClient;
#[cfg(feature = "memory")]
pub use memory::{CallRecord, MemoryLooker};
