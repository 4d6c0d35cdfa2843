//! The page admin.
//!
//! On top of the usual changelist/add/change/delete views it resolves each
//! page's content type from the request, builds the form per request, moves
//! pages among their siblings and serves the sitemap tree as JSON.
//!
//! Requests carrying `from=<origin>` keep that marker on every redirect they
//! produce, so a client that started in the sitemap is sent back to it.

pub mod forms;
mod sitemap;
mod views;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use cms_core::admin::{ModelAdmin, ModelOptions};
use cms_core::auth::User;
use cms_core::http::QueryParams;
use cms_core::permalinks::PermalinkRegistry;
use cms_core::{CmsError, CmsResult, Database};

pub use sitemap::{Sitemap, SitemapEntry};

use crate::content::{ContentRegistry, ContentType, DEFAULT_CONTENT_TYPE};
use crate::models::Page;

/// The query parameter recording where an admin action started.
pub const PAGE_FROM_KEY: &str = "from";

/// The origin value used by the sitemap.
pub const PAGE_FROM_SITEMAP_VALUE: &str = "sitemap";

/// The query parameter selecting a page's content type.
pub const PAGE_TYPE_PARAMETER: &str = "type";

/// Admin for [`Page`]s.
pub struct PageAdmin {
    opts: ModelOptions,
    db: Database,
    content: Arc<ContentRegistry>,
    permalinks: Arc<PermalinkRegistry>,
}

impl PageAdmin {
    /// Creates the page admin mounted below `admin_prefix`.
    pub fn new(
        admin_prefix: &str,
        db: Database,
        content: Arc<ContentRegistry>,
        permalinks: Arc<PermalinkRegistry>,
    ) -> Self {
        Self {
            opts: ModelOptions::new(admin_prefix, "pages", "page"),
            db,
            content,
            permalinks,
        }
    }

    /// The database the admin works on.
    pub const fn db(&self) -> &Database {
        &self.db
    }

    /// Resolves the content type governing a request: the `type` query
    /// parameter first, then the page's stored type.
    ///
    /// # Errors
    ///
    /// [`CmsError::NotFound`] when neither is available or the slug is not
    /// registered.
    pub fn page_content_type(&self, query: &QueryParams, page: Option<&Page>) -> CmsResult<Arc<dyn ContentType>> {
        let slug = query
            .get(PAGE_TYPE_PARAMETER)
            .map(String::as_str)
            .or_else(|| page.map(|p| p.content_type.as_str()).filter(|s| !s.is_empty()))
            .ok_or_else(|| CmsError::NotFound("You must specify a page content type.".into()))?;
        self.content.lookup(slug)
    }

    /// Whether the user may add pages of the given content type.
    ///
    /// The default content type is allowed for everybody who may add pages.
    /// Other registered types are checked against their declared codename;
    /// an unregistered slug falls back to `add_<slug>`.
    pub fn has_add_content_permission(&self, user: &User, slug: &str) -> bool {
        if slug == DEFAULT_CONTENT_TYPE {
            return true;
        }
        let codename = self
            .content
            .lookup(slug)
            .map_or_else(|_| format!("add_{slug}"), |ct| ct.add_permission());
        user.has_perm(&format!("{}.{codename}", self.opts.app_label))
    }

    /// Whether the user may move pages.
    ///
    /// Permissions are model-level, so the page's parent is not consulted:
    /// this is the page change permission.
    pub fn has_move_permission(&self, user: &User) -> bool {
        self.has_change_permission(user)
    }
}

impl ModelAdmin for PageAdmin {
    fn opts(&self) -> &ModelOptions {
        &self.opts
    }

    fn routes(self: Arc<Self>) -> Router {
        let opts = self.opts.clone();
        Router::new()
            .route(&opts.changelist_url(), get(views::changelist))
            .route(&opts.add_url(), get(views::add_form).post(views::add_submit))
            .route(&opts.custom_url("move-page/"), post(views::move_page))
            .route(&opts.custom_url("sitemap.json"), get(sitemap::sitemap_json))
            .route(
                &opts.custom_url("{object_id}/"),
                get(views::change_form).post(views::change_submit),
            )
            .route(
                &opts.custom_url("{object_id}/delete/"),
                get(views::delete_confirm).post(views::delete_submit),
            )
            .with_state(self)
    }
}

impl std::fmt::Debug for PageAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageAdmin")
            .field("opts", &self.opts)
            .field("content", &self.content)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> PageAdmin {
        PageAdmin::new(
            "/admin",
            Database::memory().unwrap(),
            Arc::new(ContentRegistry::new()),
            Arc::new(PermalinkRegistry::new()),
        )
    }

    fn query(pairs: &[(&str, &str)]) -> QueryParams {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    #[test]
    fn test_content_type_from_query_wins() {
        let admin = admin();
        let mut page = Page::new("Home", "home");
        page.content_type = "gallery".into();
        let ct = admin
            .page_content_type(&query(&[("type", "default")]), Some(&page))
            .unwrap();
        assert_eq!(ct.slug(), "default");
    }

    #[test]
    fn test_content_type_from_page() {
        let admin = admin();
        let page = Page::new("Home", "home");
        let ct = admin.page_content_type(&QueryParams::new(), Some(&page)).unwrap();
        assert_eq!(ct.slug(), "default");
    }

    #[test]
    fn test_content_type_missing() {
        let admin = admin();
        let err = admin.page_content_type(&QueryParams::new(), None).err().unwrap();
        assert_eq!(err.to_string(), "Not found: You must specify a page content type.");
    }

    #[test]
    fn test_content_type_unknown_slug() {
        let admin = admin();
        let result = admin.page_content_type(&query(&[("type", "gallery")]), None);
        assert!(matches!(result, Err(CmsError::NotFound(_))));
    }

    #[test]
    fn test_add_content_permission() {
        let admin = admin();
        let editor = User::new("editor").with_perms(&["pages.add_gallery"]);
        assert!(admin.has_add_content_permission(&editor, "default"));
        assert!(admin.has_add_content_permission(&editor, "gallery"));
        assert!(!admin.has_add_content_permission(&editor, "article"));
        assert!(admin.has_add_content_permission(&User::superuser("root"), "article"));
    }

    struct Gallery;

    impl ContentType for Gallery {
        fn slug(&self) -> &str {
            "gallery"
        }

        fn verbose_name(&self) -> &str {
            "Gallery"
        }

        fn fields(&self) -> Vec<cms_core::forms::FormField> {
            Vec::new()
        }

        fn add_permission(&self) -> String {
            "add_gallery_page".to_string()
        }
    }

    #[test]
    fn test_add_content_permission_uses_declared_codename() {
        let mut content = ContentRegistry::new();
        content.register(Arc::new(Gallery));
        let admin = PageAdmin::new(
            "/admin",
            Database::memory().unwrap(),
            Arc::new(content),
            Arc::new(PermalinkRegistry::new()),
        );

        let editor = User::new("editor").with_perms(&["pages.add_gallery_page"]);
        assert!(admin.has_add_content_permission(&editor, "gallery"));
        let by_slug = User::new("other").with_perms(&["pages.add_gallery"]);
        assert!(!admin.has_add_content_permission(&by_slug, "gallery"));
    }

    #[test]
    fn test_move_permission() {
        let admin = admin();
        assert!(admin.has_move_permission(&User::new("e").with_perms(&["pages.change_page"])));
        assert!(!admin.has_move_permission(&User::new("v").with_perms(&["pages.view_page"])));
    }
}
