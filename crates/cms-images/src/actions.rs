//! Bulk actions assigning images to categories.
//!
//! The action set depends on the categories in the database, so it is
//! assembled for every request with [`image_actions`].

use async_trait::async_trait;
use cms_core::admin::{ActionRegistry, ActionResult, AdminAction};
use cms_core::{CmsResult, Database};
use rusqlite::Connection;

use crate::models::{self, Category};

/// Key of the action clearing the category of the selection.
pub const REMOVE_CATEGORY: &str = "remove_category";

/// Moves the selected images into one category.
#[derive(Debug, Clone)]
pub struct MoveToCategory {
    category: Category,
    name: String,
    description: String,
}

impl MoveToCategory {
    pub fn new(category: Category) -> Self {
        let description = format!("Move selected images to {}", category.name);
        let name = description.to_lowercase().replace(' ', "_");
        Self {
            category,
            name,
            description,
        }
    }

    pub const fn category(&self) -> &Category {
        &self.category
    }
}

#[async_trait]
impl AdminAction for MoveToCategory {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn execute(&self, db: &Database, selected_ids: &[i64]) -> CmsResult<ActionResult> {
        let ids = selected_ids.to_vec();
        let category_id = self.category.id;
        let count = db
            .atomic(move |conn| models::set_category(conn, &ids, Some(category_id)))
            .await?;
        Ok(ActionResult::new(
            format!("Moved {count} images to {}.", self.category.name),
            count,
        ))
    }
}

/// Clears the category of the selected images.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveCategory;

#[async_trait]
impl AdminAction for RemoveCategory {
    fn name(&self) -> &str {
        REMOVE_CATEGORY
    }

    fn description(&self) -> &str {
        "Remove selected images from category"
    }

    async fn execute(&self, db: &Database, selected_ids: &[i64]) -> CmsResult<ActionResult> {
        let ids = selected_ids.to_vec();
        let count = db
            .atomic(move |conn| models::set_category(conn, &ids, None))
            .await?;
        Ok(ActionResult::new(
            format!("Removed {count} images from their category."),
            count,
        ))
    }
}

/// Builds the actions available right now: one per category in id order,
/// then [`RemoveCategory`].
pub fn image_actions(conn: &Connection) -> CmsResult<ActionRegistry> {
    let mut registry = ActionRegistry::new();
    for category in models::categories(conn, None)? {
        registry.register(Box::new(MoveToCategory::new(category)));
    }
    registry.register(Box::new(RemoveCategory));
    Ok(registry)
}
