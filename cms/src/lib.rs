//! # cms
//!
//! The cms-rs application: page tree and image library admin, permanent
//! links, and the `cms` management binary.
//!
//! This crate assembles the sub-crates into one router and re-exports them.

/// Errors, settings, logging, database, auth, forms, and the admin site.
pub use cms_core as core;

/// The page tree and its admin.
pub use cms_pages as pages;

/// The image library, media storage, and its admin.
pub use cms_images as images;

/// Remote URL fetching and XML reading.
pub use cms_utils as utils;

pub mod app;
pub mod command;
pub mod commands;

pub use app::{build_app, build_app_with};
