//! # cms-pages
//!
//! The page tree of cms-rs.
//!
//! ## Modules
//!
//! - [`models`] - The `Page` model and tree queries
//! - [`content`] - Pluggable content types
//! - [`ordering`] - Moving pages among their siblings, rank assignment
//! - [`admin`] - The page admin: dynamic forms, move-page, sitemap JSON
//! - [`permalinks`] - Permalink resolution for pages

pub mod admin;
pub mod content;
pub mod models;
pub mod ordering;
pub mod permalinks;

pub use admin::PageAdmin;
pub use content::{ContentRegistry, ContentType, DefaultContent};
pub use models::Page;
pub use ordering::Direction;

use cms_core::{CmsResult, Database};

/// Creates the page tables.
pub async fn migrate(db: &Database) -> CmsResult<()> {
    db.run(|conn| models::create_tables(conn)).await?;
    tracing::info!(table = models::TABLE, "migrated pages");
    Ok(())
}
