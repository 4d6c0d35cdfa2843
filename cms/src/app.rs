//! Application assembly.
//!
//! [`build_app`] wires the admin site, the permalink redirect view and the
//! media file server into one router.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use cms_core::admin::AdminSite;
use cms_core::auth::UserStore;
use cms_core::logging::request_span;
use cms_core::permalinks::PermalinkRegistry;
use cms_core::{CmsError, CmsResult, Database, Settings};
use cms_images::permalinks::{CategoryPermalinks, ImagePermalinks};
use cms_images::{CategoryAdmin, ImageAdmin, MediaStorage};
use cms_pages::permalinks::PagePermalinks;
use cms_pages::{ContentRegistry, PageAdmin};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Creates every table the applications need.
pub async fn migrate(db: &Database) -> CmsResult<()> {
    cms_pages::migrate(db).await?;
    cms_images::migrate(db).await?;
    Ok(())
}

/// Opens the configured database and builds the application with the
/// built-in content types.
pub async fn build_app(settings: &Settings) -> CmsResult<Router> {
    let db = Database::from_settings(&settings.database)?;
    build_app_with(settings, db, ContentRegistry::new()).await
}

/// Builds the application on an open database with the given page content
/// types.
pub async fn build_app_with(settings: &Settings, db: Database, content: ContentRegistry) -> CmsResult<Router> {
    migrate(&db).await?;

    let media_prefix = settings.media_url.trim_end_matches('/');
    if !media_prefix.starts_with('/') {
        return Err(CmsError::ConfigurationError(format!(
            "media_url must be an absolute path below the site root, not '{}'",
            settings.media_url
        )));
    }
    let storage = MediaStorage::new(&settings.media_root, &settings.media_url);

    let mut permalinks = PermalinkRegistry::new();
    permalinks.register(Arc::new(PagePermalinks));
    permalinks.register(Arc::new(ImagePermalinks::new(storage.clone())));
    permalinks.register(Arc::new(CategoryPermalinks));

    let prefix = settings.admin_url_prefix.as_str();
    let mut site = AdminSite::new(&settings.site_name, prefix);
    site.register(Arc::new(PageAdmin::new(
        prefix,
        db.clone(),
        Arc::new(content),
        Arc::new(permalinks.clone()),
    )));
    site.register(Arc::new(CategoryAdmin::new(prefix, db.clone())));
    site.register(Arc::new(ImageAdmin::new(prefix, db.clone(), storage.clone())));
    tracing::info!(models = ?site.registered_models(), admin = prefix, "admin site ready");

    let users = Arc::new(UserStore::new(&settings.users));
    if users.is_empty() {
        tracing::warn!("no admin users configured; the admin will reject every request");
    }

    Ok(Router::new()
        .merge(site.into_router(users))
        .merge(permalinks.into_router(db))
        .nest_service(media_prefix, ServeDir::new(storage.root()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<Body>| request_span(req.method().as_str(), req.uri().path())),
        ))
}
