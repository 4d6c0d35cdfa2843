//! Page admin request handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::{HeaderMap, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use cms_core::admin::ModelAdmin;
use cms_core::auth::User;
use cms_core::http::{
    encode_query, is_ajax, parse_pk, parse_query, patch_response_location, redirect, with_content_type,
    QueryParams,
};
use cms_core::{CmsError, CmsResult};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;

use super::forms;
use super::{PageAdmin, PAGE_FROM_KEY, PAGE_FROM_SITEMAP_VALUE, PAGE_TYPE_PARAMETER};
use crate::content::{ContentType, PageContent};
use crate::models::{self, Page};
use crate::ordering::{self, Direction};

type FormData = HashMap<String, String>;

fn denied(action: &str) -> CmsError {
    CmsError::PermissionDenied(format!("You do not have permission to {action} pages."))
}

/// An entry of the page type chooser.
#[derive(Debug, Serialize)]
struct ContentTypeChoice {
    name: String,
    icon: String,
    classifier: String,
    url: String,
}

impl PageAdmin {
    /// The content type for an add request, checking the per-type permission
    /// before the lookup.
    fn addable_content_type(&self, user: &User, query: &QueryParams) -> CmsResult<Arc<dyn ContentType>> {
        if let Some(slug) = query.get(PAGE_TYPE_PARAMETER) {
            if !self.has_add_content_permission(user, slug) {
                return Err(CmsError::PermissionDenied(
                    "You are not allowed to add pages of that content type.".into(),
                ));
            }
        }
        self.page_content_type(query, None)
    }

    fn content_type_choices(&self, user: &User, uri: &Uri) -> Vec<ContentTypeChoice> {
        let original = parse_query(uri.query().unwrap_or_default());
        self.content
            .sorted()
            .into_iter()
            .filter(|ct| self.has_add_content_permission(user, ct.slug()))
            .map(|ct| {
                let query = encode_query(
                    original
                        .iter()
                        .map(|(k, v)| (k.as_str(), v.as_str()))
                        .chain(std::iter::once((PAGE_TYPE_PARAMETER, ct.slug()))),
                );
                ContentTypeChoice {
                    name: ct.verbose_name().to_string(),
                    icon: ct.icon().to_string(),
                    classifier: ct.classifier().to_string(),
                    url: format!("{}?{query}", uri.path()),
                }
            })
            .collect()
    }

    fn redirect_to_changelist(&self, query: &QueryParams) -> Response {
        patch_response_location(query, PAGE_FROM_KEY, redirect(&self.opts.changelist_url()))
    }
}

/// Validates submitted data against the page form and applies it to `page`.
fn build_page(
    conn: &Connection,
    content_type: Arc<dyn ContentType>,
    data: &FormData,
    mut page: Page,
) -> CmsResult<Page> {
    let editing = (page.id != 0).then_some(page.id);
    let form = forms::page_form(content_type.as_ref(), forms::parent_choices(conn, editing)?);
    let cleaned = form.clean(data)?;
    forms::apply_cleaned(&mut page, &cleaned);
    let mut content = PageContent::new(content_type, Some(&page));
    content.update_from(&cleaned);
    content.apply_to(&mut page);
    forms::check_homepage(conn, &page)?;
    Ok(page)
}

/// `GET …/pages/page/`
pub(super) async fn changelist(
    State(admin): State<Arc<PageAdmin>>,
    user: User,
    Query(query): Query<QueryParams>,
) -> CmsResult<Response> {
    if query.get(PAGE_FROM_KEY).map(String::as_str) == Some(PAGE_FROM_SITEMAP_VALUE) {
        return Ok(redirect(&admin.opts.index_url()));
    }
    if !admin.has_view_permission(&user) {
        return Err(denied("view"));
    }
    let term = query.get("q").cloned();
    let pages = admin
        .db
        .run(move |conn| models::search(conn, term.as_deref()))
        .await?;
    let results: Vec<_> = pages
        .iter()
        .map(|page| {
            json!({
                "id": page.id,
                "title": page.title,
                "url_title": page.url_title,
                "parent": page.parent_id,
                "order": page.order,
                "is_online": page.is_online,
                "content_type": page.content_type,
                "change_url": admin.opts.change_url(page.id),
            })
        })
        .collect();
    Ok(Json(json!({
        "title": "Select page to change",
        "count": results.len(),
        "q": query.get("q"),
        "add_url": admin.has_add_permission(&user).then(|| admin.opts.add_url()),
        "results": results,
    }))
    .into_response())
}

/// `GET …/pages/page/add/`
///
/// Without a `type` parameter this lists the content types the user may
/// add, redirecting straight to the only one if there is exactly one.
pub(super) async fn add_form(
    State(admin): State<Arc<PageAdmin>>,
    user: User,
    Query(query): Query<QueryParams>,
    OriginalUri(uri): OriginalUri,
) -> CmsResult<Response> {
    if !admin.has_add_permission(&user) {
        return Err(denied("add"));
    }
    if !query.contains_key(PAGE_TYPE_PARAMETER) {
        let mut content_types = admin.content_type_choices(&user, &uri);
        if content_types.len() == 1 {
            let only = content_types.remove(0);
            return Ok(redirect(&only.url));
        }
        return Ok(Json(json!({
            "title": "Select page type",
            "content_types": content_types,
        }))
        .into_response());
    }

    let content_type = admin.addable_content_type(&user, &query)?;
    let choices = admin
        .db
        .run(|conn| forms::parent_choices(conn, None))
        .await?;
    let form = forms::page_form(content_type.as_ref(), choices);
    Ok(Json(json!({
        "title": "Add page",
        "content_type": content_type.slug(),
        "fieldsets": forms::page_fieldsets(content_type.as_ref()),
        "fields": form.fields(),
        "initial": forms::add_initial(query.get("parent").map(String::as_str)),
    }))
    .into_response())
}

/// `POST …/pages/page/add/`
pub(super) async fn add_submit(
    State(admin): State<Arc<PageAdmin>>,
    user: User,
    Query(query): Query<QueryParams>,
    Form(data): Form<FormData>,
) -> CmsResult<Response> {
    if !admin.has_add_permission(&user) {
        return Err(denied("add"));
    }
    let content_type = admin.addable_content_type(&user, &query)?;
    let page = admin
        .db
        .run(move |conn| build_page(conn, content_type, &data, Page::new("", "")))
        .await?;
    let id = ordering::save_page(&admin.db, page).await?;
    tracing::info!(page = id, username = %user.username, "added page");
    Ok(admin.redirect_to_changelist(&query))
}

/// `GET …/pages/page/{id}/`
pub(super) async fn change_form(
    State(admin): State<Arc<PageAdmin>>,
    user: User,
    Path(object_id): Path<String>,
    Query(query): Query<QueryParams>,
) -> CmsResult<Response> {
    let pk = parse_pk(&object_id, "Page")?;
    if !admin.has_view_permission(&user) {
        return Err(denied("view"));
    }
    let page = admin.db.run(move |conn| models::get(conn, pk)).await?;
    let content_type = admin.page_content_type(&query, Some(&page))?;
    let choices = admin
        .db
        .run(move |conn| forms::parent_choices(conn, Some(pk)))
        .await?;
    let form = forms::page_form(content_type.as_ref(), choices);
    let permalink = admin.permalinks.permalink(&admin.opts.model_key(), pk);
    let content = PageContent::new(content_type.clone(), Some(&page));
    Ok(Json(json!({
        "title": "Change page",
        "object_id": pk,
        "content_type": content_type.slug(),
        "fieldsets": forms::page_fieldsets(content_type.as_ref()),
        "fields": form.fields(),
        "initial": forms::change_initial(&page, &content, permalink),
        "can_change": admin.has_change_permission(&user),
        "delete_url": admin.has_delete_permission(&user).then(|| admin.opts.delete_url(pk)),
    }))
    .into_response())
}

/// `POST …/pages/page/{id}/`
pub(super) async fn change_submit(
    State(admin): State<Arc<PageAdmin>>,
    user: User,
    Path(object_id): Path<String>,
    Query(query): Query<QueryParams>,
    Form(data): Form<FormData>,
) -> CmsResult<Response> {
    let pk = parse_pk(&object_id, "Page")?;
    if !admin.has_change_permission(&user) {
        return Err(denied("change"));
    }
    let page = admin.db.run(move |conn| models::get(conn, pk)).await?;
    let content_type = admin.page_content_type(&query, Some(&page))?;
    let page = admin
        .db
        .run(move |conn| build_page(conn, content_type, &data, page))
        .await?;
    ordering::save_page(&admin.db, page).await?;
    tracing::info!(page = pk, username = %user.username, "changed page");
    Ok(admin.redirect_to_changelist(&query))
}

/// `GET …/pages/page/{id}/delete/`
pub(super) async fn delete_confirm(
    State(admin): State<Arc<PageAdmin>>,
    user: User,
    Path(object_id): Path<String>,
) -> CmsResult<Response> {
    let pk = parse_pk(&object_id, "Page")?;
    if !admin.has_delete_permission(&user) {
        return Err(denied("delete"));
    }
    let (page, descendants) = admin
        .db
        .run(move |conn| Ok((models::get(conn, pk)?, models::all_children(conn, pk)?)))
        .await?;
    let deleted: Vec<&str> = std::iter::once(page.title.as_str())
        .chain(descendants.iter().map(|p| p.title.as_str()))
        .collect();
    Ok(Json(json!({
        "title": "Are you sure?",
        "object": page.title,
        "deleted_objects": deleted,
    }))
    .into_response())
}

/// `POST …/pages/page/{id}/delete/`
pub(super) async fn delete_submit(
    State(admin): State<Arc<PageAdmin>>,
    user: User,
    Path(object_id): Path<String>,
    Query(query): Query<QueryParams>,
) -> CmsResult<Response> {
    let pk = parse_pk(&object_id, "Page")?;
    if !admin.has_delete_permission(&user) {
        return Err(denied("delete"));
    }
    admin
        .db
        .atomic(move |conn| {
            models::get(conn, pk)?;
            models::delete(conn, pk)
        })
        .await?;
    tracing::info!(page = pk, username = %user.username, "deleted page");
    Ok(admin.redirect_to_changelist(&query))
}

/// `POST …/pages/page/move-page/`
pub(super) async fn move_page(
    State(admin): State<Arc<PageAdmin>>,
    user: User,
    headers: HeaderMap,
    Form(data): Form<FormData>,
) -> CmsResult<Response> {
    let pk = parse_pk(data.get("page").map_or("", String::as_str), "Page")?;
    admin.db.run(move |conn| models::get(conn, pk)).await?;
    if !admin.has_move_permission(&user) {
        return Err(CmsError::PermissionDenied(
            "You do not have permission to move this page.".into(),
        ));
    }
    let direction: Direction = data.get("direction").map_or("", String::as_str).parse()?;
    ordering::move_page(&admin.db, pk, direction).await?;

    if is_ajax(&headers) {
        Ok(with_content_type(
            "text/plain; charset=utf-8",
            format!("Page #{pk} was moved {direction}."),
        ))
    } else {
        Ok(redirect(&admin.opts.index_url()))
    }
}
