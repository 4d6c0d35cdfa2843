//! Pluggable page content types.
//!
//! A content type decides which extra fields a page's form carries and
//! therefore the shape of the page's content payload. Content types are
//! registered once in a [`ContentRegistry`] under their slug; a page stores
//! only that slug.

use std::collections::BTreeMap;
use std::sync::Arc;

use cms_core::admin::Fieldset;
use cms_core::forms::{CleanedData, FormField};
use cms_core::{CmsError, CmsResult};
use serde_json::{Map, Value};

use crate::models::Page;

/// Slug of the built-in content type.
pub const DEFAULT_CONTENT_TYPE: &str = "default";

/// A page content type.
pub trait ContentType: Send + Sync {
    /// The registration key stored on pages.
    fn slug(&self) -> &str;

    /// The human-readable name.
    fn verbose_name(&self) -> &str;

    /// Icon shown when choosing a page type.
    fn icon(&self) -> &str {
        "pages/img/content-type.png"
    }

    /// Grouping key for the page type chooser.
    fn classifier(&self) -> &str {
        "content"
    }

    /// The content fields added to the page form.
    fn fields(&self) -> Vec<FormField>;

    /// How the content fields are grouped. Defaults to a single
    /// "Page content" fieldset holding every field.
    fn fieldsets(&self) -> Vec<Fieldset> {
        let names: Vec<String> = self.fields().into_iter().map(|f| f.name).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        vec![Fieldset::new(&names).name("Page content")]
    }

    /// Permission codename (without app label) needed to add pages of this type.
    fn add_permission(&self) -> String {
        format!("add_{}", self.slug())
    }
}

/// The built-in content type: a single block of text.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultContent;

impl ContentType for DefaultContent {
    fn slug(&self) -> &str {
        DEFAULT_CONTENT_TYPE
    }

    fn verbose_name(&self) -> &str {
        "default"
    }

    fn fields(&self) -> Vec<FormField> {
        vec![FormField::text("content")]
    }
}

/// The content payload of one page, bound to its content type.
pub struct PageContent {
    content_type: Arc<dyn ContentType>,
    data: Map<String, Value>,
}

impl PageContent {
    /// Binds a content type to a page's stored payload (empty for new pages).
    pub fn new(content_type: Arc<dyn ContentType>, page: Option<&Page>) -> Self {
        let data = page
            .filter(|p| p.content_type == content_type.slug())
            .map(|p| p.content_data.clone())
            .unwrap_or_default();
        Self { content_type, data }
    }

    /// The content type's field names.
    pub fn field_names(&self) -> Vec<String> {
        self.content_type.fields().into_iter().map(|f| f.name).collect()
    }

    /// Returns a stored value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// Copies every content field from validated form data.
    pub fn update_from(&mut self, cleaned: &CleanedData) {
        for name in self.field_names() {
            let value = cleaned.get(&name).cloned().unwrap_or(Value::Null);
            self.data.insert(name, value);
        }
    }

    /// Stamps the content type and payload onto a page.
    pub fn apply_to(self, page: &mut Page) {
        page.content_type = self.content_type.slug().to_string();
        page.content_data = self.data;
    }
}

impl std::fmt::Debug for PageContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageContent")
            .field("content_type", &self.content_type.slug())
            .field("data", &self.data)
            .finish()
    }
}

/// Registered content types keyed by slug.
#[derive(Clone)]
pub struct ContentRegistry {
    registered: BTreeMap<String, Arc<dyn ContentType>>,
}

impl Default for ContentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentRegistry {
    /// Creates a registry holding [`DefaultContent`].
    pub fn new() -> Self {
        let mut registry = Self {
            registered: BTreeMap::new(),
        };
        registry.register(Arc::new(DefaultContent));
        registry
    }

    /// Registers a content type, replacing any type with the same slug.
    pub fn register(&mut self, content_type: Arc<dyn ContentType>) {
        tracing::debug!(slug = content_type.slug(), "registered page content type");
        self.registered
            .insert(content_type.slug().to_string(), content_type);
    }

    /// Looks up a content type by slug.
    pub fn lookup(&self, slug: &str) -> CmsResult<Arc<dyn ContentType>> {
        self.registered
            .get(slug)
            .cloned()
            .ok_or_else(|| CmsError::NotFound(format!("Page content type '{slug}' is not registered.")))
    }

    /// Returns every content type sorted by classifier, then by lower-cased
    /// verbose name.
    pub fn sorted(&self) -> Vec<Arc<dyn ContentType>> {
        let mut types: Vec<_> = self.registered.values().cloned().collect();
        types.sort_by(|a, b| {
            a.classifier()
                .cmp(b.classifier())
                .then_with(|| a.verbose_name().to_lowercase().cmp(&b.verbose_name().to_lowercase()))
        });
        types
    }

    /// Returns the number of registered content types.
    pub fn len(&self) -> usize {
        self.registered.len()
    }

    /// Returns `true` if no content type is registered.
    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }
}

impl std::fmt::Debug for ContentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentRegistry")
            .field("slugs", &self.registered.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Article;

    impl ContentType for Article {
        fn slug(&self) -> &str {
            "article"
        }

        fn verbose_name(&self) -> &str {
            "Article"
        }

        fn classifier(&self) -> &str {
            "articles"
        }

        fn fields(&self) -> Vec<FormField> {
            vec![FormField::text("summary").optional(), FormField::text("body")]
        }
    }

    #[test]
    fn test_registry_has_default() {
        let registry = ContentRegistry::new();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("default").unwrap().slug(), "default");
    }

    #[test]
    fn test_lookup_unknown_slug() {
        let registry = ContentRegistry::new();
        assert!(matches!(registry.lookup("gallery"), Err(CmsError::NotFound(_))));
    }

    #[test]
    fn test_sorted_by_classifier_then_name() {
        let mut registry = ContentRegistry::new();
        registry.register(Arc::new(Article));
        let slugs: Vec<String> = registry.sorted().iter().map(|c| c.slug().to_string()).collect();
        assert_eq!(slugs, vec!["article", "default"]);
    }

    #[test]
    fn test_default_fieldsets_and_permission() {
        let fieldsets = Article.fieldsets();
        assert_eq!(fieldsets.len(), 1);
        assert_eq!(fieldsets[0].name.as_deref(), Some("Page content"));
        assert_eq!(fieldsets[0].fields, vec!["summary", "body"]);
        assert_eq!(Article.add_permission(), "add_article");
    }

    #[test]
    fn test_page_content_update_and_apply() {
        let mut page = Page::new("Home", "home");
        let mut content = PageContent::new(Arc::new(Article), Some(&page));
        assert!(content.get("body").is_none());

        let mut cleaned = CleanedData::new();
        cleaned.insert("body".into(), Value::String("Text".into()));
        cleaned.insert("title".into(), Value::String("ignored".into()));
        content.update_from(&cleaned);
        content.apply_to(&mut page);

        assert_eq!(page.content_type, "article");
        assert_eq!(page.content_data["body"], "Text");
        assert_eq!(page.content_data["summary"], Value::Null);
        assert!(page.content_data.get("title").is_none());
    }

    #[test]
    fn test_page_content_ignores_payload_of_other_type() {
        let mut page = Page::new("Home", "home");
        page.content_data.insert("content".into(), Value::String("x".into()));
        let content = PageContent::new(Arc::new(Article), Some(&page));
        assert!(content.get("content").is_none());
    }
}
