//! The category admin: plain CRUD with a name search.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use cms_core::admin::{Fieldset, ModelAdmin, ModelOptions};
use cms_core::auth::User;
use cms_core::forms::{CleanedData, FormField};
use cms_core::http::{parse_pk, redirect, QueryParams};
use cms_core::{CmsError, CmsResult, Database};
use serde_json::json;

use crate::models::{self, Category};

/// Admin for image [`Category`]s.
#[derive(Debug)]
pub struct CategoryAdmin {
    opts: ModelOptions,
    db: Database,
}

impl CategoryAdmin {
    pub fn new(admin_prefix: &str, db: Database) -> Self {
        Self {
            opts: ModelOptions::new(admin_prefix, "images", "category").verbose_name_plural("categories"),
            db,
        }
    }

    fn form() -> cms_core::forms::Form {
        cms_core::forms::Form::new(vec![FormField::char("name", 200)])
    }

    fn denied(&self, action: &str) -> CmsError {
        CmsError::PermissionDenied(format!(
            "You do not have permission to {action} {}.",
            self.opts.verbose_name_plural
        ))
    }
}

fn cleaned_name(cleaned: &CleanedData) -> String {
    cleaned
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

impl ModelAdmin for CategoryAdmin {
    fn opts(&self) -> &ModelOptions {
        &self.opts
    }

    fn routes(self: Arc<Self>) -> Router {
        let opts = self.opts.clone();
        Router::new()
            .route(&opts.changelist_url(), get(changelist))
            .route(&opts.add_url(), get(add_form).post(add_submit))
            .route(&opts.custom_url("{object_id}/"), get(change_form).post(change_submit))
            .route(
                &opts.custom_url("{object_id}/delete/"),
                get(delete_confirm).post(delete_submit),
            )
            .with_state(self)
    }
}

async fn changelist(
    State(admin): State<Arc<CategoryAdmin>>,
    user: User,
    Query(query): Query<QueryParams>,
) -> CmsResult<Response> {
    if !admin.has_view_permission(&user) {
        return Err(admin.denied("view"));
    }
    let term = query.get("q").cloned();
    let categories = admin
        .db
        .run(move |conn| models::categories(conn, term.as_deref()))
        .await?;
    let results: Vec<_> = categories
        .iter()
        .map(|c| {
            json!({
                "id": c.id,
                "name": c.name,
                "change_url": admin.opts.change_url(c.id),
            })
        })
        .collect();
    Ok(Json(json!({
        "title": "Select category to change",
        "list_display": ["name"],
        "count": results.len(),
        "q": query.get("q"),
        "add_url": admin.has_add_permission(&user).then(|| admin.opts.add_url()),
        "results": results,
    }))
    .into_response())
}

async fn add_form(State(admin): State<Arc<CategoryAdmin>>, user: User) -> CmsResult<Response> {
    if !admin.has_add_permission(&user) {
        return Err(admin.denied("add"));
    }
    Ok(Json(json!({
        "title": "Add category",
        "fieldsets": [Fieldset::new(&["name"])],
        "fields": CategoryAdmin::form().fields(),
        "initial": {},
    }))
    .into_response())
}

async fn add_submit(
    State(admin): State<Arc<CategoryAdmin>>,
    user: User,
    Form(data): Form<HashMap<String, String>>,
) -> CmsResult<Response> {
    if !admin.has_add_permission(&user) {
        return Err(admin.denied("add"));
    }
    let name = cleaned_name(&CategoryAdmin::form().clean(&data)?);
    let id = admin
        .db
        .run(move |conn| models::insert_category(conn, &name))
        .await?;
    tracing::info!(category = id, username = %user.username, "added category");
    Ok(redirect(&admin.opts.changelist_url()))
}

async fn change_form(
    State(admin): State<Arc<CategoryAdmin>>,
    user: User,
    Path(object_id): Path<String>,
) -> CmsResult<Response> {
    let pk = parse_pk(&object_id, "Category")?;
    if !admin.has_view_permission(&user) {
        return Err(admin.denied("view"));
    }
    let category = admin.db.run(move |conn| models::get_category(conn, pk)).await?;
    Ok(Json(json!({
        "title": "Change category",
        "object_id": pk,
        "fieldsets": [Fieldset::new(&["name"])],
        "fields": CategoryAdmin::form().fields(),
        "initial": { "name": category.name },
        "can_change": admin.has_change_permission(&user),
        "delete_url": admin.has_delete_permission(&user).then(|| admin.opts.delete_url(pk)),
    }))
    .into_response())
}

async fn change_submit(
    State(admin): State<Arc<CategoryAdmin>>,
    user: User,
    Path(object_id): Path<String>,
    Form(data): Form<HashMap<String, String>>,
) -> CmsResult<Response> {
    let pk = parse_pk(&object_id, "Category")?;
    if !admin.has_change_permission(&user) {
        return Err(admin.denied("change"));
    }
    let name = cleaned_name(&CategoryAdmin::form().clean(&data)?);
    admin
        .db
        .run(move |conn| models::update_category(conn, &Category { id: pk, name }))
        .await?;
    tracing::info!(category = pk, username = %user.username, "changed category");
    Ok(redirect(&admin.opts.changelist_url()))
}

async fn delete_confirm(
    State(admin): State<Arc<CategoryAdmin>>,
    user: User,
    Path(object_id): Path<String>,
) -> CmsResult<Response> {
    let pk = parse_pk(&object_id, "Category")?;
    if !admin.has_delete_permission(&user) {
        return Err(admin.denied("delete"));
    }
    let category = admin.db.run(move |conn| models::get_category(conn, pk)).await?;
    Ok(Json(json!({
        "title": "Are you sure?",
        "object": category.name,
        "deleted_objects": [category.name],
    }))
    .into_response())
}

async fn delete_submit(
    State(admin): State<Arc<CategoryAdmin>>,
    user: User,
    Path(object_id): Path<String>,
) -> CmsResult<Response> {
    let pk = parse_pk(&object_id, "Category")?;
    if !admin.has_delete_permission(&user) {
        return Err(admin.denied("delete"));
    }
    admin
        .db
        .atomic(move |conn| {
            models::get_category(conn, pk)?;
            models::delete_category(conn, pk)
        })
        .await?;
    tracing::info!(category = pk, username = %user.username, "deleted category");
    Ok(redirect(&admin.opts.changelist_url()))
}
