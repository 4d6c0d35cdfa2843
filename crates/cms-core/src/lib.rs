//! # cms-core
//!
//! Foundation shared by the cms-rs applications: errors, settings, logging,
//! the SQLite database handle, admin users, forms, and the admin site.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] / [`settings_loader`] - Configuration with TOML and env overrides
//! - [`logging`] - Tracing-based logging integration
//! - [`db`] - SQLite handle with transactional and exclusive-lock helpers
//! - [`auth`] - Admin users, permissions, and the admin guard middleware
//! - [`forms`] - Field definitions and validation
//! - [`http`] - Redirects, ajax detection, origin-marker propagation
//! - [`humanize`] - Display formatting
//! - [`permalinks`] - `/r/<content_type>/<object>/` permanent links
//! - [`uploads`] - Multipart form-data reading
//! - [`admin`] - Admin site, model admin options, bulk actions

pub mod admin;
pub mod auth;
pub mod db;
pub mod error;
pub mod forms;
pub mod http;
pub mod humanize;
pub mod logging;
pub mod permalinks;
pub mod settings;
pub mod settings_loader;
pub mod uploads;

// Re-export the most commonly used types at the crate root.
pub use auth::User;
pub use db::Database;
pub use error::{CmsError, CmsResult, ValidationError};
pub use settings::Settings;
