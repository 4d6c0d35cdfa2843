//! The sitemap tree served to the admin dashboard.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;
use cms_core::admin::{ModelAdmin, ModelOptions};
use cms_core::auth::User;
use cms_core::http::with_content_type;
use cms_core::CmsResult;
use rusqlite::Connection;
use serde::Serialize;

use super::{PageAdmin, PAGE_FROM_KEY, PAGE_FROM_SITEMAP_VALUE};
use crate::models::{self, Page};

/// The whole sitemap document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sitemap {
    pub can_add: bool,
    pub can_change: bool,
    pub create_homepage_url: String,
    /// Empty without a homepage, otherwise the homepage entry.
    pub entries: Vec<SitemapEntry>,
}

/// One page in the sitemap, with its children in rank order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SitemapEntry {
    pub has_parent: bool,
    pub is_online: bool,
    pub id: i64,
    pub title: String,
    pub can_change: bool,
    pub can_delete: bool,
    pub can_move: bool,
    pub add_url: String,
    pub change_url: String,
    pub delete_url: String,
    pub children: Vec<SitemapEntry>,
}

/// The requesting user's rights, resolved once per request.
#[derive(Debug, Clone, Copy)]
#[allow(clippy::struct_excessive_bools)]
pub(super) struct SitemapPerms {
    pub can_add: bool,
    pub can_change: bool,
    pub can_delete: bool,
    pub can_move: bool,
}

fn entry(conn: &Connection, opts: &ModelOptions, perms: SitemapPerms, page: Page) -> CmsResult<SitemapEntry> {
    let children = models::children(conn, page.id)?
        .into_iter()
        .map(|child| entry(conn, opts, perms, child))
        .collect::<CmsResult<Vec<_>>>()?;
    let from = format!("{PAGE_FROM_KEY}={PAGE_FROM_SITEMAP_VALUE}");
    Ok(SitemapEntry {
        has_parent: page.parent_id.is_some(),
        is_online: page.is_online,
        id: page.id,
        add_url: format!("{}?{from}&parent={}", opts.add_url(), page.id),
        change_url: format!("{}?{from}", opts.change_url(page.id)),
        delete_url: format!("{}?{from}", opts.delete_url(page.id)),
        title: page.title,
        can_change: perms.can_change,
        can_delete: perms.can_delete,
        can_move: perms.can_move,
        children,
    })
}

/// Builds the sitemap, depth first from the homepage.
pub(super) fn build_sitemap(conn: &Connection, opts: &ModelOptions, perms: SitemapPerms) -> CmsResult<Sitemap> {
    let entries = match models::get_homepage(conn)? {
        Some(homepage) => vec![entry(conn, opts, perms, homepage)?],
        None => Vec::new(),
    };
    Ok(Sitemap {
        can_add: perms.can_add,
        can_change: perms.can_change,
        create_homepage_url: format!(
            "{}?{PAGE_FROM_KEY}={PAGE_FROM_SITEMAP_VALUE}",
            opts.add_url()
        ),
        entries,
    })
}

/// Handler for `GET …/pages/page/sitemap.json`.
pub(super) async fn sitemap_json(State(admin): State<Arc<PageAdmin>>, user: User) -> CmsResult<Response> {
    let perms = SitemapPerms {
        can_add: admin.has_add_permission(&user),
        can_change: admin.has_change_permission(&user),
        can_delete: admin.has_delete_permission(&user),
        can_move: admin.has_change_permission(&user),
    };
    let opts = admin.opts.clone();
    let sitemap = admin
        .db
        .run(move |conn| build_sitemap(conn, &opts, perms))
        .await?;
    let body = serde_json::to_string(&sitemap)?;
    Ok(with_content_type("application/json; charset=utf-8", body))
}
