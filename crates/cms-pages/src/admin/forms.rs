//! The page add/change form.
//!
//! The form is assembled per request: the fixed page fields plus the fields
//! of the resolved content type. The parent field's choices are the page
//! tree, minus the edited page and its descendants.

use std::collections::HashSet;

use cms_core::admin::Fieldset;
use cms_core::forms::{parse_datetime, Choice, CleanedData, Form, FormField, DATETIME_FORMAT};
use cms_core::CmsResult;
use rusqlite::Connection;
use serde_json::{Map, Value};

use crate::content::{ContentType, PageContent};
use crate::models::{self, Page};

/// Computes the parent choices for a form editing `page_id` (or adding a
/// page when `None`).
///
/// Each choice is labelled with the page's breadcrumbs. When there is no
/// homepage, or every page is excluded, the single blank choice is used.
pub fn parent_choices(conn: &Connection, page_id: Option<i64>) -> CmsResult<Vec<Choice>> {
    let mut choices = Vec::new();
    if let Some(homepage) = models::get_homepage(conn)? {
        let invalid: HashSet<i64> = match page_id {
            Some(id) => models::all_children(conn, id)?
                .into_iter()
                .map(|p| p.id)
                .chain(std::iter::once(id))
                .collect(),
            None => HashSet::new(),
        };
        let homepage_id = homepage.id;
        let pages = std::iter::once(homepage).chain(models::all_children(conn, homepage_id)?);
        for page in pages {
            if invalid.contains(&page.id) {
                continue;
            }
            let crumbs = models::breadcrumbs(conn, &page)?;
            choices.push(Choice::new(page.id.to_string(), models::breadcrumb_label(&crumbs)));
        }
    }
    if choices.is_empty() {
        choices.push(Choice::blank());
    }
    Ok(choices)
}

fn base_fields(parent_choices: Vec<Choice>) -> Vec<FormField> {
    vec![
        FormField::char("title", 1000),
        FormField::slug("url_title", 1000)
            .label("URL title")
            .help_text("The name of the page as it appears in the URL."),
        FormField::choice("parent", parent_choices).optional(),
    ]
}

fn shared_fields() -> Vec<FormField> {
    vec![
        FormField::datetime("publication_date")
            .optional()
            .help_text("The date that this page will appear on the website. Leave blank to publish immediately."),
        FormField::datetime("expiry_date")
            .optional()
            .help_text("The date that this page will be removed from the website. Leave blank to never expire."),
        FormField::boolean("is_online")
            .label("Online")
            .help_text("Uncheck this box to remove the page from the public website."),
        FormField::char("short_title", 200)
            .optional()
            .help_text("A shorter version of the title used in navigation. Leave blank to use the full title."),
        FormField::read_only("permalink"),
        FormField::boolean("in_navigation").label("Add to navigation"),
        FormField::char("browser_title", 1000)
            .optional()
            .help_text("The heading to use in the user's web browser. Leave blank to use the page title."),
        FormField::text("meta_keywords").optional(),
        FormField::text("meta_description").optional(),
    ]
}

/// Builds the form for a content type.
pub fn page_form(content_type: &dyn ContentType, parent_choices: Vec<Choice>) -> Form {
    let mut form = Form::new(base_fields(parent_choices));
    form.extend(content_type.fields());
    form.extend(shared_fields());
    form
}

/// Builds the fieldsets: base fields, the content type's fieldsets, then
/// the collapsed publication, navigation and search engine groups.
pub fn page_fieldsets(content_type: &dyn ContentType) -> Vec<Fieldset> {
    let mut fieldsets = vec![Fieldset::new(&["title", "url_title", "parent"])];
    fieldsets.extend(content_type.fieldsets());
    fieldsets.push(
        Fieldset::new(&["publication_date", "expiry_date", "is_online"])
            .name("Publication")
            .collapse(),
    );
    fieldsets.push(
        Fieldset::new(&["short_title", "permalink", "in_navigation"])
            .name("Navigation")
            .collapse(),
    );
    fieldsets.push(
        Fieldset::new(&["browser_title", "meta_keywords", "meta_description"])
            .name("Search engine optimization")
            .collapse(),
    );
    fieldsets
}

/// Initial values for the add form.
pub fn add_initial(parent: Option<&str>) -> Map<String, Value> {
    let mut initial = Map::new();
    initial.insert("is_online".into(), Value::Bool(true));
    initial.insert("in_navigation".into(), Value::Bool(true));
    if let Some(parent) = parent.filter(|p| !p.is_empty()) {
        initial.insert("parent".into(), Value::String(parent.to_string()));
    }
    initial
}

/// Initial values for the change form, taken from the page and its content.
pub fn change_initial(page: &Page, content: &PageContent, permalink: Option<String>) -> Map<String, Value> {
    let format = |dt: Option<chrono::NaiveDateTime>| {
        dt.map_or(Value::Null, |dt| Value::String(dt.format(DATETIME_FORMAT).to_string()))
    };
    let mut initial = Map::new();
    initial.insert("title".into(), page.title.clone().into());
    initial.insert("url_title".into(), page.url_title.clone().into());
    initial.insert(
        "parent".into(),
        page.parent_id.map_or(Value::Null, |id| Value::String(id.to_string())),
    );
    for name in content.field_names() {
        let value = content.get(&name).cloned().unwrap_or(Value::Null);
        initial.insert(name, value);
    }
    initial.insert("publication_date".into(), format(page.publication_date));
    initial.insert("expiry_date".into(), format(page.expiry_date));
    initial.insert("is_online".into(), page.is_online.into());
    initial.insert("short_title".into(), page.short_title.clone().into());
    initial.insert("permalink".into(), permalink.map_or(Value::Null, Value::String));
    initial.insert("in_navigation".into(), page.in_navigation.into());
    initial.insert("browser_title".into(), page.browser_title.clone().into());
    initial.insert("meta_keywords".into(), page.meta_keywords.clone().into());
    initial.insert("meta_description".into(), page.meta_description.clone().into());
    initial
}

fn string(cleaned: &CleanedData, name: &str) -> String {
    cleaned
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn flag(cleaned: &CleanedData, name: &str) -> bool {
    cleaned.get(name).and_then(Value::as_bool).unwrap_or(false)
}

/// Copies the page fields of validated data onto a page.
pub fn apply_cleaned(page: &mut Page, cleaned: &CleanedData) {
    page.title = string(cleaned, "title");
    page.url_title = string(cleaned, "url_title");
    page.parent_id = cleaned
        .get("parent")
        .and_then(Value::as_str)
        .and_then(|v| v.parse().ok());
    page.publication_date = cleaned
        .get("publication_date")
        .and_then(Value::as_str)
        .and_then(parse_datetime);
    page.expiry_date = cleaned
        .get("expiry_date")
        .and_then(Value::as_str)
        .and_then(parse_datetime);
    page.is_online = flag(cleaned, "is_online");
    page.short_title = string(cleaned, "short_title");
    page.in_navigation = flag(cleaned, "in_navigation");
    page.browser_title = string(cleaned, "browser_title");
    page.meta_keywords = string(cleaned, "meta_keywords");
    page.meta_description = string(cleaned, "meta_description");
}

pub use crate::ordering::check_homepage;
