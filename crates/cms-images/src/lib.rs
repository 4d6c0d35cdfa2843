//! # cms-images
//!
//! The image library of cms-rs.
//!
//! ## Modules
//!
//! - [`models`] - Categories and images
//! - [`storage`] - Writing uploads below the media root
//! - [`actions`] - Bulk category actions, one per category
//! - [`admin`] - The category and image admins
//! - [`permalinks`] - Permalink resolution for images and categories

pub mod actions;
pub mod admin;
pub mod models;
pub mod permalinks;
pub mod storage;

pub use admin::{CategoryAdmin, ImageAdmin};
pub use models::{Category, Image};
pub use storage::MediaStorage;

use cms_core::{CmsResult, Database};

/// Creates the image tables.
pub async fn migrate(db: &Database) -> CmsResult<()> {
    db.run(models::create_tables).await?;
    tracing::info!("migrated images");
    Ok(())
}
