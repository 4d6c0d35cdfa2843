//! Permanent links to model objects.
//!
//! A permalink has the form `/r/<content_type_id>/<object_id>/` and stays
//! valid when the object's public URL changes. Models take part by
//! registering a [`PermalinkTarget`]; content type ids are assigned in
//! registration order starting at 1.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;

use crate::db::Database;
use crate::error::{CmsError, CmsResult};
use crate::humanize;

/// A model whose objects can be reached through a permalink.
#[async_trait]
pub trait PermalinkTarget: Send + Sync {
    /// The model key in `"app_label.model_name"` format.
    fn model_key(&self) -> &str;

    /// The human-readable model name.
    fn verbose_name(&self) -> &str;

    /// Resolves the public URL of an object.
    ///
    /// Returns `Ok(None)` when the object exists but the model publishes no
    /// URL, and [`CmsError::DoesNotExist`] when there is no such object.
    async fn absolute_url(&self, db: &Database, object_id: i64) -> CmsResult<Option<String>>;
}

/// A registered model with its content type id.
#[derive(Clone)]
struct ContentType {
    id: i64,
    target: Arc<dyn PermalinkTarget>,
}

/// The permalink registry.
#[derive(Default, Clone)]
pub struct PermalinkRegistry {
    content_types: Vec<ContentType>,
}

impl PermalinkRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model and returns its content type id.
    ///
    /// Registering the same model key twice returns the existing id.
    pub fn register(&mut self, target: Arc<dyn PermalinkTarget>) -> i64 {
        if let Some(id) = self.content_type_id(target.model_key()) {
            return id;
        }
        let id = i64::try_from(self.content_types.len()).map_or(i64::MAX, |n| n + 1);
        tracing::debug!(model = target.model_key(), content_type_id = id, "registered permalink target");
        self.content_types.push(ContentType { id, target });
        id
    }

    /// Returns the content type id of a model.
    pub fn content_type_id(&self, model_key: &str) -> Option<i64> {
        self.content_types
            .iter()
            .find(|ct| ct.target.model_key() == model_key)
            .map(|ct| ct.id)
    }

    /// Returns the permalink of an object.
    ///
    /// # Examples
    ///
    /// ```
    /// use cms_core::permalinks::PermalinkRegistry;
    ///
    /// let registry = PermalinkRegistry::new();
    /// assert_eq!(registry.permalink("pages.page", 1), None);
    /// ```
    pub fn permalink(&self, model_key: &str, object_id: i64) -> Option<String> {
        self.content_type_id(model_key)
            .map(|ct| format!("/r/{ct}/{object_id}/"))
    }

    /// Resolves a permalink to the object's public URL.
    ///
    /// # Errors
    ///
    /// Returns [`CmsError::NotFound`] for unknown content types, missing
    /// objects, and models that publish no URL.
    pub async fn resolve(&self, db: &Database, content_type_id: i64, object_id: i64) -> CmsResult<String> {
        let content_type = self
            .content_types
            .iter()
            .find(|ct| ct.id == content_type_id)
            .ok_or_else(|| {
                CmsError::NotFound(format!("Content type {content_type_id} object {object_id} doesn't exist"))
            })?;
        let target = &content_type.target;

        match target.absolute_url(db, object_id).await {
            Ok(Some(url)) => Ok(url),
            Ok(None) => Err(CmsError::NotFound(format!(
                "{} objects do not publish an absolute URL.",
                humanize::title(target.verbose_name())
            ))),
            Err(CmsError::DoesNotExist(_)) => Err(CmsError::NotFound(format!(
                "Content type {content_type_id} object {object_id} doesn't exist"
            ))),
            Err(e) => Err(e),
        }
    }

    /// Returns the number of registered models.
    pub fn len(&self) -> usize {
        self.content_types.len()
    }

    /// Returns `true` if no models are registered.
    pub fn is_empty(&self) -> bool {
        self.content_types.is_empty()
    }

    /// Builds the router serving `GET /r/{content_type_id}/{object_id}/`.
    pub fn into_router(self, db: Database) -> Router {
        Router::new()
            .route("/r/{content_type_id}/{object_id}/", get(handle_permalink))
            .with_state(Arc::new(PermalinkState { registry: self, db }))
    }
}

impl std::fmt::Debug for PermalinkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let models: Vec<&str> = self.content_types.iter().map(|ct| ct.target.model_key()).collect();
        f.debug_struct("PermalinkRegistry")
            .field("models", &models)
            .finish()
    }
}

struct PermalinkState {
    registry: PermalinkRegistry,
    db: Database,
}

async fn handle_permalink(
    State(state): State<Arc<PermalinkState>>,
    Path((content_type_id, object_id)): Path<(String, String)>,
) -> CmsResult<Response> {
    let (Ok(content_type_id), Ok(object_id)) = (content_type_id.parse(), object_id.parse()) else {
        return Err(CmsError::NotFound(format!(
            "Content type {content_type_id} object {object_id} doesn't exist"
        )));
    };
    let url = state.registry.resolve(&state.db, content_type_id, object_id).await?;
    Ok(crate::http::redirect(&url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    struct Articles;

    #[async_trait]
    impl PermalinkTarget for Articles {
        fn model_key(&self) -> &str {
            "news.article"
        }

        fn verbose_name(&self) -> &str {
            "article"
        }

        async fn absolute_url(&self, _db: &Database, object_id: i64) -> CmsResult<Option<String>> {
            if object_id == 1 {
                Ok(Some("/news/first/".into()))
            } else {
                Err(CmsError::DoesNotExist("Article matching query does not exist.".into()))
            }
        }
    }

    struct Tags;

    #[async_trait]
    impl PermalinkTarget for Tags {
        fn model_key(&self) -> &str {
            "news.tag"
        }

        fn verbose_name(&self) -> &str {
            "news tag"
        }

        async fn absolute_url(&self, _db: &Database, _object_id: i64) -> CmsResult<Option<String>> {
            Ok(None)
        }
    }

    fn registry() -> PermalinkRegistry {
        let mut registry = PermalinkRegistry::new();
        registry.register(Arc::new(Articles));
        registry.register(Arc::new(Tags));
        registry
    }

    #[test]
    fn test_content_type_ids_follow_registration_order() {
        let mut registry = registry();
        assert_eq!(registry.content_type_id("news.article"), Some(1));
        assert_eq!(registry.content_type_id("news.tag"), Some(2));
        assert_eq!(registry.register(Arc::new(Articles)), 1);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.permalink("news.tag", 9).as_deref(), Some("/r/2/9/"));
    }

    #[tokio::test]
    async fn test_resolve() {
        let db = Database::memory().unwrap();
        let registry = registry();
        assert_eq!(registry.resolve(&db, 1, 1).await.unwrap(), "/news/first/");
        assert!(matches!(registry.resolve(&db, 1, 2).await, Err(CmsError::NotFound(_))));
        assert!(matches!(registry.resolve(&db, 7, 1).await, Err(CmsError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_resolve_without_absolute_url() {
        let db = Database::memory().unwrap();
        let err = registry().resolve(&db, 2, 1).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Not found: News Tag objects do not publish an absolute URL."
        );
    }

    #[tokio::test]
    async fn test_permalink_route_redirects() {
        let db = Database::memory().unwrap();
        let router = registry().into_router(db);
        let resp = router
            .clone()
            .oneshot(Request::builder().uri("/r/1/1/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers()["location"], "/news/first/");

        let resp = router
            .oneshot(Request::builder().uri("/r/x/1/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
