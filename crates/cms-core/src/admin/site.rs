//! Admin site registry and router generation.
//!
//! The [`AdminSite`] collects [`ModelAdmin`]s and produces one Axum router
//! holding the site index plus every model admin's routes, all guarded by
//! the [`admin_view`] middleware.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use super::options::ModelAdmin;
use crate::auth::{admin_view, User, UserStore};

/// The admin site.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use cms_core::admin::AdminSite;
/// use cms_core::auth::UserStore;
///
/// let site = AdminSite::new("Site administration", "/admin");
/// let _router = site.into_router(Arc::new(UserStore::default()));
/// ```
pub struct AdminSite {
    /// The site title.
    name: String,
    /// The URL prefix for all admin routes, without trailing slash.
    url_prefix: String,
    /// Registered model admins, keyed by `"app.model"`.
    registered: BTreeMap<String, Arc<dyn ModelAdmin>>,
}

impl AdminSite {
    /// Creates an admin site mounted at `url_prefix`.
    pub fn new(name: &str, url_prefix: &str) -> Self {
        Self {
            name: name.to_string(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
            registered: BTreeMap::new(),
        }
    }

    /// Returns the site title.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the URL prefix.
    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// Registers a model admin, replacing any previous one for the model.
    pub fn register(&mut self, admin: Arc<dyn ModelAdmin>) {
        let key = admin.opts().model_key();
        tracing::debug!(model = %key, "registered model admin");
        self.registered.insert(key, admin);
    }

    /// Returns `true` if a model is registered.
    pub fn is_registered(&self, model_key: &str) -> bool {
        self.registered.contains_key(model_key)
    }

    /// Returns the registered model keys in sorted order.
    pub fn registered_models(&self) -> Vec<&str> {
        self.registered.keys().map(String::as_str).collect()
    }

    /// Generates the router.
    ///
    /// - `GET {prefix}/` lists the models the user may view
    /// - every model admin contributes its own routes below
    ///   `{prefix}/{app}/{model}/`
    pub fn into_router(self, users: Arc<UserStore>) -> Router {
        let admins: Vec<Arc<dyn ModelAdmin>> = self.registered.into_values().collect();

        let mut router = Router::new()
            .route(&format!("{}/", self.url_prefix), get(handle_index))
            .with_state(Arc::new(IndexState {
                name: self.name,
                admins: admins.clone(),
            }));
        for admin in admins {
            router = router.merge(admin.routes());
        }
        router.layer(middleware::from_fn_with_state(users, admin_view))
    }
}

impl std::fmt::Debug for AdminSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSite")
            .field("name", &self.name)
            .field("url_prefix", &self.url_prefix)
            .field("models", &self.registered_models().join(", "))
            .finish()
    }
}

struct IndexState {
    name: String,
    admins: Vec<Arc<dyn ModelAdmin>>,
}

/// One application's section of the index.
#[derive(Debug, Serialize)]
struct AppEntry {
    app_label: String,
    models: Vec<ModelEntry>,
}

#[derive(Debug, Serialize)]
struct ModelEntry {
    model_key: String,
    name: String,
    admin_url: String,
    add_url: Option<String>,
    perms: ModelPerms,
}

#[derive(Debug, Serialize)]
#[allow(clippy::struct_excessive_bools)]
struct ModelPerms {
    add: bool,
    change: bool,
    delete: bool,
    view: bool,
}

/// Handler for `GET {prefix}/`.
async fn handle_index(State(state): State<Arc<IndexState>>, user: User) -> impl IntoResponse {
    let mut apps: BTreeMap<String, Vec<ModelEntry>> = BTreeMap::new();
    for admin in &state.admins {
        if !admin.has_view_permission(&user) {
            continue;
        }
        let opts = admin.opts();
        let add = admin.has_add_permission(&user);
        apps.entry(opts.app_label.clone()).or_default().push(ModelEntry {
            model_key: opts.model_key(),
            name: crate::humanize::title(&opts.verbose_name_plural),
            admin_url: opts.changelist_url(),
            add_url: add.then(|| opts.add_url()),
            perms: ModelPerms {
                add,
                change: admin.has_change_permission(&user),
                delete: admin.has_delete_permission(&user),
                view: true,
            },
        });
    }

    let apps: Vec<AppEntry> = apps
        .into_iter()
        .map(|(app_label, models)| AppEntry { app_label, models })
        .collect();
    Json(serde_json::json!({
        "site_name": state.name,
        "apps": apps,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::options::ModelOptions;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct NoteAdmin {
        opts: ModelOptions,
    }

    impl ModelAdmin for NoteAdmin {
        fn opts(&self) -> &ModelOptions {
            &self.opts
        }

        fn routes(self: Arc<Self>) -> Router {
            Router::new().route(
                &self.opts.changelist_url(),
                get(|user: User| async move { user.username }),
            )
        }
    }

    fn site() -> AdminSite {
        let mut site = AdminSite::new("Site administration", "/admin/");
        site.register(Arc::new(NoteAdmin {
            opts: ModelOptions::new("/admin", "notes", "note"),
        }));
        site
    }

    fn users() -> Arc<UserStore> {
        let mut store = UserStore::default();
        store.insert("root-token", User::superuser("root"));
        store.insert("editor-token", User::new("editor"));
        let mut outsider = User::new("outsider");
        outsider.is_staff = false;
        store.insert("outsider-token", outsider);
        Arc::new(store)
    }

    fn get_req(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_admin_site_register() {
        let site = site();
        assert_eq!(site.url_prefix(), "/admin");
        assert!(site.is_registered("notes.note"));
        assert!(!site.is_registered("notes.tag"));
        assert_eq!(site.registered_models(), vec!["notes.note"]);
    }

    #[tokio::test]
    async fn test_index_lists_visible_models() {
        let router = site().into_router(users());
        let resp = router.oneshot(get_req("/admin/", Some("root-token"))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["site_name"], "Site administration");
        assert_eq!(json["apps"][0]["app_label"], "notes");
        assert_eq!(json["apps"][0]["models"][0]["admin_url"], "/admin/notes/note/");
        assert_eq!(json["apps"][0]["models"][0]["add_url"], "/admin/notes/note/add/");
    }

    #[tokio::test]
    async fn test_index_hides_models_without_permission() {
        let router = site().into_router(users());
        let resp = router.oneshot(get_req("/admin/", Some("editor-token"))).await.unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["apps"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_model_routes_receive_user() {
        let router = site().into_router(users());
        let resp = router
            .oneshot(get_req("/admin/notes/note/", Some("editor-token")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"editor");
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let router = site().into_router(users());
        let resp = router.oneshot(get_req("/admin/", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_non_staff_is_forbidden() {
        let router = site().into_router(users());
        let resp = router.oneshot(get_req("/admin/", Some("outsider-token"))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
