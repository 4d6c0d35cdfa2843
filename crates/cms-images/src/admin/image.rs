//! The image admin.
//!
//! Uploads go through multipart forms and are stored by [`MediaStorage`].
//! Bulk actions are derived from the current categories on every request.

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use cms_core::admin::{Fieldset, ModelAdmin, ModelOptions};
use cms_core::auth::User;
use cms_core::forms::{Choice, Form, FormField};
use cms_core::http::{parse_pk, parse_query, redirect, with_content_type, QueryParams};
use cms_core::humanize::filesizeformat;
use cms_core::uploads::{read_multipart, UploadedFile};
use cms_core::{CmsError, CmsResult, Database, ValidationError};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;

use crate::actions::image_actions;
use crate::models::{self, Image, ImageFilter};
use crate::storage::MediaStorage;

/// The editor image list, a script defining `tinyMCEImageList`.
const TINY_MCE_IMAGE_LIST: &str = "var tinyMCEImageList = new Array(\
{% for image in images %}\n    [{{ image.title | json_encode() }}, {{ image.url | json_encode() }}]\
{% if not loop.last %},{% endif %}{% endfor %}\n);\n";

/// Admin for [`Image`]s.
#[derive(Debug)]
pub struct ImageAdmin {
    opts: ModelOptions,
    db: Database,
    storage: MediaStorage,
}

/// Validated add/change input.
struct ImageInput {
    title: String,
    category_id: Option<i64>,
    upload: Option<UploadedFile>,
}

#[derive(Serialize)]
struct EditorImage {
    title: String,
    url: String,
}

impl ImageAdmin {
    pub fn new(admin_prefix: &str, db: Database, storage: MediaStorage) -> Self {
        Self {
            opts: ModelOptions::new(admin_prefix, "images", "image"),
            db,
            storage,
        }
    }

    pub const fn storage(&self) -> &MediaStorage {
        &self.storage
    }

    fn denied(&self, action: &str) -> CmsError {
        CmsError::PermissionDenied(format!(
            "You do not have permission to {action} {}.",
            self.opts.verbose_name_plural
        ))
    }

    /// Validates a multipart submission. On add the file is required.
    async fn read_input(&self, multipart: Multipart, require_upload: bool) -> CmsResult<ImageInput> {
        let mut data = read_multipart(multipart).await?;
        let form = self.db.run(image_form).await?;
        let upload = data.take_file("image");

        let (cleaned, mut errors) = match form.clean(&data.form_data()) {
            Ok(cleaned) => (cleaned, ValidationError::default()),
            Err(errors) => (serde_json::Map::new(), errors),
        };
        if require_upload && upload.is_none() {
            errors.message = "Please correct the errors below.".to_string();
            errors.push("image", "This field is required.");
        }
        if !errors.is_empty() {
            return Err(errors.into());
        }

        let title = cleaned
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let category_id = cleaned
            .get("category")
            .and_then(|v| v.as_str())
            .and_then(|v| v.parse().ok());
        Ok(ImageInput {
            title,
            category_id,
            upload,
        })
    }
}

/// The add/change form, with the current categories as choices.
fn image_form(conn: &Connection) -> CmsResult<Form> {
    let choices = std::iter::once(Choice::blank())
        .chain(
            models::categories(conn, None)?
                .into_iter()
                .map(|c| Choice::new(c.id.to_string(), c.name)),
        )
        .collect();
    Ok(Form::new(vec![
        FormField::char("title", 200),
        FormField::file("image"),
        FormField::choice("category", choices).optional(),
    ]))
}

fn image_fieldsets() -> Vec<Fieldset> {
    vec![Fieldset::new(&["title", "image", "category"])]
}

impl ModelAdmin for ImageAdmin {
    fn opts(&self) -> &ModelOptions {
        &self.opts
    }

    fn routes(self: Arc<Self>) -> Router {
        let opts = self.opts.clone();
        Router::new()
            .route(&opts.changelist_url(), get(changelist))
            .route(&opts.add_url(), get(add_form).post(add_submit))
            .route(&opts.custom_url("actions/"), get(list_actions))
            .route(&opts.custom_url("action/"), post(run_action))
            .route(
                &opts.custom_url("tiny-mce-image-list.js"),
                get(tiny_mce_image_list),
            )
            .route(&opts.custom_url("{object_id}/"), get(change_form).post(change_submit))
            .route(
                &opts.custom_url("{object_id}/delete/"),
                get(delete_confirm).post(delete_submit),
            )
            .with_state(self)
    }
}

/// `GET …/images/image/` with optional `q` and `category` filters.
async fn changelist(
    State(admin): State<Arc<ImageAdmin>>,
    user: User,
    Query(query): Query<QueryParams>,
) -> CmsResult<Response> {
    if !admin.has_view_permission(&user) {
        return Err(admin.denied("view"));
    }
    let category_id = match query.get("category").map(String::as_str) {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<i64>()
                .map_err(|_| CmsError::BadRequest(format!("Invalid category filter '{raw}'.")))?,
        ),
    };
    let filter = ImageFilter {
        search: query.get("q").cloned(),
        category_id,
    };
    let (images, categories) = admin
        .db
        .run(move |conn| Ok((models::images(conn, &filter)?, models::categories(conn, None)?)))
        .await?;

    let category_name = |id: Option<i64>| {
        id.and_then(|id| categories.iter().find(|c| c.id == id))
            .map(|c| c.name.clone())
    };
    let results: Vec<_> = images
        .iter()
        .map(|image| {
            json!({
                "id": image.id,
                "title": image.title,
                "category": category_name(image.category_id),
                "width": image.width,
                "height": image.height,
                "size": filesizeformat(image.size),
                "url": admin.storage.url(&image.image),
                "change_url": admin.opts.change_url(image.id),
            })
        })
        .collect();
    let filters: Vec<_> = categories
        .iter()
        .map(|c| json!({ "id": c.id, "name": c.name, "selected": category_id == Some(c.id) }))
        .collect();
    Ok(Json(json!({
        "title": "Select image to change",
        "list_display": ["title", "category", "width", "height", "size"],
        "count": results.len(),
        "q": query.get("q"),
        "filters": { "category": filters },
        "add_url": admin.has_add_permission(&user).then(|| admin.opts.add_url()),
        "results": results,
    }))
    .into_response())
}

async fn add_form(State(admin): State<Arc<ImageAdmin>>, user: User) -> CmsResult<Response> {
    if !admin.has_add_permission(&user) {
        return Err(admin.denied("add"));
    }
    let form = admin.db.run(image_form).await?;
    Ok(Json(json!({
        "title": "Add image",
        "fieldsets": image_fieldsets(),
        "fields": form.fields(),
        "initial": {},
    }))
    .into_response())
}

async fn add_submit(
    State(admin): State<Arc<ImageAdmin>>,
    user: User,
    multipart: Multipart,
) -> CmsResult<Response> {
    if !admin.has_add_permission(&user) {
        return Err(admin.denied("add"));
    }
    let input = admin.read_input(multipart, true).await?;
    let Some(upload) = input.upload else {
        return Err(ValidationError::new("Please correct the errors below.")
            .field("image", "This field is required.")
            .into());
    };
    let stored = admin.storage.save_image(&upload).await?;
    let image = Image {
        id: 0,
        title: input.title,
        image: stored.path.clone(),
        width: stored.width,
        height: stored.height,
        size: stored.size,
        category_id: input.category_id,
    };
    let id = match admin.db.run(move |conn| models::insert_image(conn, &image)).await {
        Ok(id) => id,
        Err(e) => {
            admin.storage.delete(&stored.path).await?;
            return Err(e);
        }
    };
    tracing::info!(image = id, username = %user.username, path = %stored.path, "added image");
    Ok(redirect(&admin.opts.changelist_url()))
}

async fn change_form(
    State(admin): State<Arc<ImageAdmin>>,
    user: User,
    Path(object_id): Path<String>,
) -> CmsResult<Response> {
    let pk = parse_pk(&object_id, "Image")?;
    if !admin.has_view_permission(&user) {
        return Err(admin.denied("view"));
    }
    let (image, form) = admin
        .db
        .run(move |conn| Ok((models::get_image(conn, pk)?, image_form(conn)?)))
        .await?;
    Ok(Json(json!({
        "title": "Change image",
        "object_id": pk,
        "fieldsets": image_fieldsets(),
        "fields": form.fields(),
        "initial": {
            "title": image.title,
            "image": admin.storage.url(&image.image),
            "category": image.category_id.map(|id| id.to_string()),
        },
        "width": image.width,
        "height": image.height,
        "size": filesizeformat(image.size),
        "can_change": admin.has_change_permission(&user),
        "delete_url": admin.has_delete_permission(&user).then(|| admin.opts.delete_url(pk)),
    }))
    .into_response())
}

/// `POST …/images/image/{id}/`. Without a new file the stored one is kept.
async fn change_submit(
    State(admin): State<Arc<ImageAdmin>>,
    user: User,
    Path(object_id): Path<String>,
    multipart: Multipart,
) -> CmsResult<Response> {
    let pk = parse_pk(&object_id, "Image")?;
    if !admin.has_change_permission(&user) {
        return Err(admin.denied("change"));
    }
    let mut image = admin.db.run(move |conn| models::get_image(conn, pk)).await?;
    let input = admin.read_input(multipart, false).await?;
    image.title = input.title;
    image.category_id = input.category_id;

    let replaced = match input.upload {
        Some(upload) => {
            let stored = admin.storage.save_image(&upload).await?;
            let old = std::mem::replace(&mut image.image, stored.path);
            image.width = stored.width;
            image.height = stored.height;
            image.size = stored.size;
            Some(old)
        }
        None => None,
    };
    let row = image.clone();
    if let Err(e) = admin.db.run(move |conn| models::update_image(conn, &row)).await {
        if replaced.is_some() {
            admin.storage.delete(&image.image).await?;
        }
        return Err(e);
    }
    if let Some(old) = replaced {
        admin.storage.delete(&old).await?;
    }
    tracing::info!(image = pk, username = %user.username, "changed image");
    Ok(redirect(&admin.opts.changelist_url()))
}

async fn delete_confirm(
    State(admin): State<Arc<ImageAdmin>>,
    user: User,
    Path(object_id): Path<String>,
) -> CmsResult<Response> {
    let pk = parse_pk(&object_id, "Image")?;
    if !admin.has_delete_permission(&user) {
        return Err(admin.denied("delete"));
    }
    let image = admin.db.run(move |conn| models::get_image(conn, pk)).await?;
    Ok(Json(json!({
        "title": "Are you sure?",
        "object": image.title,
        "deleted_objects": [image.title],
    }))
    .into_response())
}

async fn delete_submit(
    State(admin): State<Arc<ImageAdmin>>,
    user: User,
    Path(object_id): Path<String>,
) -> CmsResult<Response> {
    let pk = parse_pk(&object_id, "Image")?;
    if !admin.has_delete_permission(&user) {
        return Err(admin.denied("delete"));
    }
    let image = admin
        .db
        .atomic(move |conn| {
            let image = models::get_image(conn, pk)?;
            models::delete_image(conn, pk)?;
            Ok(image)
        })
        .await?;
    admin.storage.delete(&image.image).await?;
    tracing::info!(image = pk, username = %user.username, "deleted image");
    Ok(redirect(&admin.opts.changelist_url()))
}

/// `GET …/images/image/actions/`
async fn list_actions(State(admin): State<Arc<ImageAdmin>>, user: User) -> CmsResult<Response> {
    if !admin.has_change_permission(&user) {
        return Err(admin.denied("change"));
    }
    let registry = admin.db.run(image_actions).await?;
    Ok(Json(json!({ "actions": registry.action_descriptions() })).into_response())
}

/// `POST …/images/image/action/` with `action` and repeated `selected`.
async fn run_action(State(admin): State<Arc<ImageAdmin>>, user: User, body: String) -> CmsResult<Response> {
    if !admin.has_change_permission(&user) {
        return Err(admin.denied("change"));
    }
    let mut action = None;
    let mut selected = Vec::new();
    for (key, value) in parse_query(&body) {
        match key.as_str() {
            "action" => action = Some(value),
            "selected" => selected.push(
                value
                    .parse::<i64>()
                    .map_err(|_| CmsError::BadRequest(format!("Invalid selection '{value}'.")))?,
            ),
            _ => {}
        }
    }
    let action = action
        .filter(|a| !a.is_empty())
        .ok_or_else(|| CmsError::BadRequest("No action selected.".into()))?;

    let registry = admin.db.run(image_actions).await?;
    let result = registry.execute(&action, &admin.db, &selected).await?;
    tracing::info!(action = %action, affected = result.affected_count, username = %user.username, "ran image action");
    Ok(Json(result).into_response())
}

/// `GET …/images/image/tiny-mce-image-list.js`
async fn tiny_mce_image_list(State(admin): State<Arc<ImageAdmin>>, user: User) -> CmsResult<Response> {
    if !admin.has_view_permission(&user) {
        return Err(admin.denied("view"));
    }
    let images = admin
        .db
        .run(|conn| models::images(conn, &ImageFilter::default()))
        .await?;
    let script = render_image_list(&admin.storage, &images)?;
    Ok(with_content_type("text/javascript; charset=utf-8", script))
}

fn render_image_list(storage: &MediaStorage, images: &[Image]) -> CmsResult<String> {
    let images: Vec<EditorImage> = images
        .iter()
        .map(|image| EditorImage {
            title: image.title.clone(),
            url: storage.url(&image.image),
        })
        .collect();
    let mut context = tera::Context::new();
    context.insert("images", &images);
    tera::Tera::one_off(TINY_MCE_IMAGE_LIST, &context, false)
        .map_err(|e| CmsError::TemplateError(e.to_string()))
}
