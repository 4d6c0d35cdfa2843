//! Model administration options.
//!
//! [`ModelOptions`] names a model (app label, model name, verbose names),
//! derives its permission codenames and reverses its admin URLs.
//! [`ModelAdmin`] is the trait every model admin implements to plug its views
//! into the [`AdminSite`](super::site::AdminSite).

use std::sync::Arc;

use axum::Router;
use serde::Serialize;

use crate::auth::User;

/// Identity and URL layout of an administered model.
///
/// # Examples
///
/// ```
/// use cms_core::admin::ModelOptions;
///
/// let opts = ModelOptions::new("/admin", "pages", "page");
/// assert_eq!(opts.permission("change"), "pages.change_page");
/// assert_eq!(opts.changelist_url(), "/admin/pages/page/");
/// assert_eq!(opts.change_url(3), "/admin/pages/page/3/");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelOptions {
    /// The admin site URL prefix (e.g. "/admin").
    pub admin_prefix: String,
    /// The application label (e.g. "pages").
    pub app_label: String,
    /// The model name in lowercase (e.g. "page").
    pub model_name: String,
    /// The human-readable verbose name.
    pub verbose_name: String,
    /// The human-readable plural verbose name.
    pub verbose_name_plural: String,
}

impl ModelOptions {
    /// Creates options with verbose names derived from the model name.
    pub fn new(
        admin_prefix: impl Into<String>,
        app_label: impl Into<String>,
        model_name: impl Into<String>,
    ) -> Self {
        let model_name = model_name.into();
        let verbose_name = model_name.replace('_', " ");
        let verbose_name_plural = format!("{verbose_name}s");
        Self {
            admin_prefix: admin_prefix.into().trim_end_matches('/').to_string(),
            app_label: app_label.into(),
            model_name,
            verbose_name,
            verbose_name_plural,
        }
    }

    /// Sets the plural verbose name.
    #[must_use]
    pub fn verbose_name_plural(mut self, name: impl Into<String>) -> Self {
        self.verbose_name_plural = name.into();
        self
    }

    /// Returns the model key in `"app_label.model_name"` format.
    pub fn model_key(&self) -> String {
        format!("{}.{}", self.app_label, self.model_name)
    }

    /// Returns the full permission name for an action (`add`, `change`, ...).
    pub fn permission(&self, action: &str) -> String {
        format!("{}.{}_{}", self.app_label, action, self.model_name)
    }

    /// The base path of this model's admin, without trailing slash.
    pub fn base_path(&self) -> String {
        format!("{}/{}/{}", self.admin_prefix, self.app_label, self.model_name)
    }

    /// The admin site index.
    pub fn index_url(&self) -> String {
        format!("{}/", self.admin_prefix)
    }

    /// The changelist URL.
    pub fn changelist_url(&self) -> String {
        format!("{}/", self.base_path())
    }

    /// The add view URL.
    pub fn add_url(&self) -> String {
        format!("{}/add/", self.base_path())
    }

    /// The change view URL for an object.
    pub fn change_url(&self, pk: i64) -> String {
        format!("{}/{pk}/", self.base_path())
    }

    /// The delete view URL for an object.
    pub fn delete_url(&self, pk: i64) -> String {
        format!("{}/{pk}/delete/", self.base_path())
    }

    /// A custom view URL below the model's base path.
    pub fn custom_url(&self, suffix: &str) -> String {
        format!("{}/{suffix}", self.base_path())
    }
}

/// A grouping of fields in the add/change view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fieldset {
    /// Optional display name for this fieldset group.
    pub name: Option<String>,
    /// The fields included in this fieldset.
    pub fields: Vec<String>,
    /// CSS classes to apply to this fieldset (e.g. `"collapse"`).
    pub classes: Vec<String>,
}

impl Fieldset {
    /// Creates a new fieldset with the given fields and no title.
    pub fn new(fields: &[&str]) -> Self {
        Self {
            name: None,
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
            classes: Vec::new(),
        }
    }

    /// Sets the fieldset title.
    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Marks the fieldset as collapsed by default.
    #[must_use]
    pub fn collapse(mut self) -> Self {
        self.classes.push("collapse".to_string());
        self
    }
}

/// A model admin plugged into the admin site.
///
/// Permission checks default to the model-level codenames from
/// [`ModelOptions::permission`].
pub trait ModelAdmin: Send + Sync + 'static {
    /// The model's identity and URL layout.
    fn opts(&self) -> &ModelOptions;

    /// Builds the routes of this admin, with absolute paths below
    /// [`ModelOptions::base_path`].
    fn routes(self: Arc<Self>) -> Router;

    /// Whether the user may list and view objects.
    fn has_view_permission(&self, user: &User) -> bool {
        user.has_perm(&self.opts().permission("view")) || self.has_change_permission(user)
    }

    /// Whether the user may add objects.
    fn has_add_permission(&self, user: &User) -> bool {
        user.has_perm(&self.opts().permission("add"))
    }

    /// Whether the user may change objects.
    fn has_change_permission(&self, user: &User) -> bool {
        user.has_perm(&self.opts().permission("change"))
    }

    /// Whether the user may delete objects.
    fn has_delete_permission(&self, user: &User) -> bool {
        user.has_perm(&self.opts().permission("delete"))
    }
}
