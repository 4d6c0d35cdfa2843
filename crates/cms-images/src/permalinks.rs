//! Permalink support for images and categories.

use async_trait::async_trait;
use cms_core::permalinks::PermalinkTarget;
use cms_core::{CmsResult, Database};

use crate::models;
use crate::storage::MediaStorage;

/// Resolves image permalinks to the file URL.
#[derive(Debug, Clone)]
pub struct ImagePermalinks {
    storage: MediaStorage,
}

impl ImagePermalinks {
    pub const fn new(storage: MediaStorage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl PermalinkTarget for ImagePermalinks {
    fn model_key(&self) -> &str {
        "images.image"
    }

    fn verbose_name(&self) -> &str {
        "image"
    }

    async fn absolute_url(&self, db: &Database, object_id: i64) -> CmsResult<Option<String>> {
        let image = db.run(move |conn| models::get_image(conn, object_id)).await?;
        Ok(Some(self.storage.url(&image.image)))
    }
}

/// Categories are addressable but publish no URL.
#[derive(Debug, Default, Clone, Copy)]
pub struct CategoryPermalinks;

#[async_trait]
impl PermalinkTarget for CategoryPermalinks {
    fn model_key(&self) -> &str {
        "images.category"
    }

    fn verbose_name(&self) -> &str {
        "category"
    }

    async fn absolute_url(&self, db: &Database, object_id: i64) -> CmsResult<Option<String>> {
        db.run(move |conn| models::get_category(conn, object_id)).await?;
        Ok(None)
    }
}
