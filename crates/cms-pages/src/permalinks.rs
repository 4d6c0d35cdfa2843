//! Permalink support for pages.

use async_trait::async_trait;
use cms_core::permalinks::PermalinkTarget;
use cms_core::{CmsResult, Database};

use crate::models;

/// Resolves page permalinks to the page's public URL.
#[derive(Debug, Default, Clone, Copy)]
pub struct PagePermalinks;

#[async_trait]
impl PermalinkTarget for PagePermalinks {
    fn model_key(&self) -> &str {
        "pages.page"
    }

    fn verbose_name(&self) -> &str {
        "page"
    }

    async fn absolute_url(&self, db: &Database, object_id: i64) -> CmsResult<Option<String>> {
        db.run(move |conn| {
            let page = models::get(conn, object_id)?;
            models::absolute_url(conn, &page).map(Some)
        })
        .await
    }
}
