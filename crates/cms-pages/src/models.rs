//! The page tree.
//!
//! Pages form a tree rooted at the homepage (the page without a parent).
//! Siblings are ranked by their integer `order`; every read of children
//! returns them by `order`, then `id`.
//!
//! Queries are plain functions over a `rusqlite::Connection` so they can run
//! inside [`Database::run`](cms_core::Database::run) as well as inside the
//! transactions opened by `atomic` and `locked`.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use cms_core::forms::{parse_datetime, DATETIME_FORMAT};
use cms_core::{CmsError, CmsResult};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use serde_json::{Map, Value};

/// The page table.
pub const TABLE: &str = "pages_page";

/// Separator between breadcrumb titles in parent choices.
pub const BREADCRUMB_SEPARATOR: &str = " \u{203a} ";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS pages_page (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    url_title TEXT NOT NULL,
    parent_id INTEGER REFERENCES pages_page(id) ON DELETE CASCADE,
    "order" INTEGER NOT NULL DEFAULT 0,
    is_online INTEGER NOT NULL DEFAULT 1,
    publication_date TEXT,
    expiry_date TEXT,
    short_title TEXT NOT NULL DEFAULT '',
    in_navigation INTEGER NOT NULL DEFAULT 1,
    browser_title TEXT NOT NULL DEFAULT '',
    meta_keywords TEXT NOT NULL DEFAULT '',
    meta_description TEXT NOT NULL DEFAULT '',
    content_type TEXT NOT NULL,
    content_data TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS pages_page_parent_order ON pages_page (parent_id, "order");
"#;

const COLUMNS: &str = r#"id, title, url_title, parent_id, "order", is_online, publication_date,
    expiry_date, short_title, in_navigation, browser_title, meta_keywords,
    meta_description, content_type, content_data"#;

/// A page in the tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    /// Primary key; `0` until the page is inserted.
    pub id: i64,
    pub title: String,
    pub url_title: String,
    /// `None` marks the homepage.
    pub parent_id: Option<i64>,
    /// Rank among siblings.
    pub order: i64,
    pub is_online: bool,
    pub publication_date: Option<NaiveDateTime>,
    pub expiry_date: Option<NaiveDateTime>,
    pub short_title: String,
    pub in_navigation: bool,
    pub browser_title: String,
    pub meta_keywords: String,
    pub meta_description: String,
    /// Slug of the content type governing this page.
    pub content_type: String,
    /// Content payload; its keys are the content type's field names.
    pub content_data: Map<String, Value>,
}

impl Page {
    /// Creates an unsaved, online page of the default content type.
    pub fn new(title: impl Into<String>, url_title: impl Into<String>) -> Self {
        Self {
            id: 0,
            title: title.into(),
            url_title: url_title.into(),
            parent_id: None,
            order: 0,
            is_online: true,
            publication_date: None,
            expiry_date: None,
            short_title: String::new(),
            in_navigation: true,
            browser_title: String::new(),
            meta_keywords: String::new(),
            meta_description: String::new(),
            content_type: crate::content::DEFAULT_CONTENT_TYPE.to_string(),
            content_data: Map::new(),
        }
    }

    /// Sets the parent.
    #[must_use]
    pub const fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Sets the rank.
    #[must_use]
    pub const fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    /// Returns `true` for the homepage.
    pub const fn is_homepage(&self) -> bool {
        self.parent_id.is_none()
    }
}

impl std::fmt::Display for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.title)
    }
}

/// Creates the page table.
pub fn create_tables(conn: &Connection) -> CmsResult<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<Page> {
    let content_data: String = row.get(14)?;
    let content_data = serde_json::from_str(&content_data)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(14, Type::Text, Box::new(e)))?;
    Ok(Page {
        id: row.get(0)?,
        title: row.get(1)?,
        url_title: row.get(2)?,
        parent_id: row.get(3)?,
        order: row.get(4)?,
        is_online: row.get(5)?,
        publication_date: row
            .get::<_, Option<String>>(6)?
            .as_deref()
            .and_then(parse_datetime),
        expiry_date: row
            .get::<_, Option<String>>(7)?
            .as_deref()
            .and_then(parse_datetime),
        short_title: row.get(8)?,
        in_navigation: row.get(9)?,
        browser_title: row.get(10)?,
        meta_keywords: row.get(11)?,
        meta_description: row.get(12)?,
        content_type: row.get(13)?,
        content_data,
    })
}

fn format_datetime(value: Option<NaiveDateTime>) -> Option<String> {
    value.map(|dt| dt.format(DATETIME_FORMAT).to_string())
}

fn query_pages(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> CmsResult<Vec<Page>> {
    let mut stmt = conn.prepare(sql)?;
    let pages = stmt
        .query_map(params, from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(pages)
}

/// Loads a page by id.
pub fn get(conn: &Connection, id: i64) -> CmsResult<Page> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM pages_page WHERE id = ?1"),
        params![id],
        from_row,
    )
    .optional()?
    .ok_or_else(|| CmsError::DoesNotExist("Page matching query does not exist.".into()))
}

/// Returns the homepage: the parentless page with the lowest rank.
pub fn get_homepage(conn: &Connection) -> CmsResult<Option<Page>> {
    Ok(conn
        .query_row(
            &format!(
                r#"SELECT {COLUMNS} FROM pages_page WHERE parent_id IS NULL ORDER BY "order", id LIMIT 1"#
            ),
            [],
            from_row,
        )
        .optional()?)
}

/// Returns the direct children of a page in rank order.
pub fn children(conn: &Connection, parent_id: i64) -> CmsResult<Vec<Page>> {
    query_pages(
        conn,
        &format!(r#"SELECT {COLUMNS} FROM pages_page WHERE parent_id = ?1 ORDER BY "order", id"#),
        params![parent_id],
    )
}

/// Returns every descendant of a page, depth first, siblings in rank order.
pub fn all_children(conn: &Connection, page_id: i64) -> CmsResult<Vec<Page>> {
    let mut result = Vec::new();
    let mut seen = HashSet::from([page_id]);
    collect_children(conn, page_id, &mut seen, &mut result)?;
    Ok(result)
}

fn collect_children(
    conn: &Connection,
    page_id: i64,
    seen: &mut HashSet<i64>,
    result: &mut Vec<Page>,
) -> CmsResult<()> {
    for child in children(conn, page_id)? {
        if !seen.insert(child.id) {
            continue;
        }
        let child_id = child.id;
        result.push(child);
        collect_children(conn, child_id, seen, result)?;
    }
    Ok(())
}

/// Returns the chain of pages from the root down to `page` (inclusive).
pub fn breadcrumbs(conn: &Connection, page: &Page) -> CmsResult<Vec<Page>> {
    let mut chain = vec![page.clone()];
    let mut seen = HashSet::from([page.id]);
    let mut parent_id = page.parent_id;
    while let Some(id) = parent_id {
        if !seen.insert(id) {
            break;
        }
        let parent = get(conn, id)?;
        parent_id = parent.parent_id;
        chain.push(parent);
    }
    chain.reverse();
    Ok(chain)
}

/// Joins breadcrumb titles for display.
pub fn breadcrumb_label(breadcrumbs: &[Page]) -> String {
    breadcrumbs
        .iter()
        .map(|p| p.title.as_str())
        .collect::<Vec<_>>()
        .join(BREADCRUMB_SEPARATOR)
}

/// Returns the public URL of a page.
///
/// The homepage lives at `/`; every other page appends the `url_title`s of
/// its breadcrumbs below the root.
pub fn absolute_url(conn: &Connection, page: &Page) -> CmsResult<String> {
    let crumbs = breadcrumbs(conn, page)?;
    let mut url = String::from("/");
    for crumb in crumbs.iter().skip(1) {
        url.push_str(&crumb.url_title);
        url.push('/');
    }
    Ok(url)
}

/// Inserts a page and returns its id.
pub fn insert(conn: &Connection, page: &Page) -> CmsResult<i64> {
    conn.execute(
        r#"INSERT INTO pages_page (title, url_title, parent_id, "order", is_online,
            publication_date, expiry_date, short_title, in_navigation, browser_title,
            meta_keywords, meta_description, content_type, content_data)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"#,
        params![
            page.title,
            page.url_title,
            page.parent_id,
            page.order,
            page.is_online,
            format_datetime(page.publication_date),
            format_datetime(page.expiry_date),
            page.short_title,
            page.in_navigation,
            page.browser_title,
            page.meta_keywords,
            page.meta_description,
            page.content_type,
            serde_json::to_string(&page.content_data)?,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Writes every column of an existing page.
pub fn update(conn: &Connection, page: &Page) -> CmsResult<()> {
    let updated = conn.execute(
        r#"UPDATE pages_page SET title = ?2, url_title = ?3, parent_id = ?4, "order" = ?5,
            is_online = ?6, publication_date = ?7, expiry_date = ?8, short_title = ?9,
            in_navigation = ?10, browser_title = ?11, meta_keywords = ?12,
            meta_description = ?13, content_type = ?14, content_data = ?15
        WHERE id = ?1"#,
        params![
            page.id,
            page.title,
            page.url_title,
            page.parent_id,
            page.order,
            page.is_online,
            format_datetime(page.publication_date),
            format_datetime(page.expiry_date),
            page.short_title,
            page.in_navigation,
            page.browser_title,
            page.meta_keywords,
            page.meta_description,
            page.content_type,
            serde_json::to_string(&page.content_data)?,
        ],
    )?;
    if updated == 0 {
        return Err(CmsError::DoesNotExist("Page matching query does not exist.".into()));
    }
    Ok(())
}

/// Sets the rank of a single page.
pub fn set_order(conn: &Connection, id: i64, order: i64) -> CmsResult<()> {
    conn.execute(r#"UPDATE pages_page SET "order" = ?2 WHERE id = ?1"#, params![id, order])?;
    Ok(())
}

/// Deletes a page and, through the foreign key, its descendants.
pub fn delete(conn: &Connection, id: i64) -> CmsResult<usize> {
    Ok(conn.execute("DELETE FROM pages_page WHERE id = ?1", params![id])?)
}

/// Returns the highest rank over all pages.
pub fn max_order(conn: &Connection) -> CmsResult<Option<i64>> {
    Ok(conn.query_row(r#"SELECT MAX("order") FROM pages_page"#, [], |row| row.get(0))?)
}

/// Lists pages for the changelist, optionally filtered by a search term
/// matched case-insensitively against the title, url title and browser title.
pub fn search(conn: &Connection, term: Option<&str>) -> CmsResult<Vec<Page>> {
    match term.map(str::trim).filter(|t| !t.is_empty()) {
        None => query_pages(
            conn,
            &format!(r#"SELECT {COLUMNS} FROM pages_page ORDER BY "order", id"#),
            [],
        ),
        Some(term) => query_pages(
            conn,
            &format!(
                r#"SELECT {COLUMNS} FROM pages_page
                WHERE instr(lower(title), lower(?1)) > 0
                   OR instr(lower(url_title), lower(?1)) > 0
                   OR instr(lower(browser_title), lower(?1)) > 0
                ORDER BY "order", id"#
            ),
            params![term],
        ),
    }
}

/// Counts every page.
pub fn count(conn: &Connection) -> CmsResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM pages_page", [], |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        create_tables(&conn).unwrap();
        conn
    }

    fn add(conn: &Connection, page: Page) -> i64 {
        insert(conn, &page).unwrap()
    }

    /// Builds: home -> (about -> team, news)
    fn tree(conn: &Connection) -> (i64, i64, i64, i64) {
        let home = add(conn, Page::new("Home", "home").with_order(1));
        let about = add(conn, Page::new("About", "about").with_parent(home).with_order(2));
        let news = add(conn, Page::new("News", "news").with_parent(home).with_order(3));
        let team = add(conn, Page::new("Team", "team").with_parent(about).with_order(4));
        (home, about, news, team)
    }

    #[test]
    fn test_insert_and_get() {
        let conn = conn();
        let mut page = Page::new("Home", "home");
        page.publication_date = parse_datetime("2024-05-01 10:30:00");
        page.content_data.insert("content".into(), Value::String("Hello".into()));
        let id = add(&conn, page);

        let loaded = get(&conn, id).unwrap();
        assert_eq!(loaded.title, "Home");
        assert_eq!(loaded.content_type, "default");
        assert_eq!(loaded.content_data["content"], "Hello");
        assert_eq!(
            loaded.publication_date.unwrap().format(DATETIME_FORMAT).to_string(),
            "2024-05-01 10:30:00"
        );
        assert!(loaded.is_homepage());
    }

    #[test]
    fn test_get_missing_page() {
        let conn = conn();
        assert!(matches!(get(&conn, 42), Err(CmsError::DoesNotExist(_))));
    }

    #[test]
    fn test_get_homepage() {
        let conn = conn();
        assert!(get_homepage(&conn).unwrap().is_none());
        let (home, ..) = tree(&conn);
        assert_eq!(get_homepage(&conn).unwrap().unwrap().id, home);
    }

    #[test]
    fn test_children_in_rank_order() {
        let conn = conn();
        let (home, about, news, _) = tree(&conn);
        set_order(&conn, news, 0).unwrap();
        let ids: Vec<i64> = children(&conn, home).unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![news, about]);
    }

    #[test]
    fn test_all_children_depth_first() {
        let conn = conn();
        let (home, about, news, team) = tree(&conn);
        let ids: Vec<i64> = all_children(&conn, home).unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![about, team, news]);
    }

    #[test]
    fn test_breadcrumbs_and_url() {
        let conn = conn();
        let (home, _, _, team) = tree(&conn);
        let team = get(&conn, team).unwrap();
        let crumbs = breadcrumbs(&conn, &team).unwrap();
        assert_eq!(breadcrumb_label(&crumbs), "Home \u{203a} About \u{203a} Team");
        assert_eq!(absolute_url(&conn, &team).unwrap(), "/about/team/");
        let home = get(&conn, home).unwrap();
        assert_eq!(absolute_url(&conn, &home).unwrap(), "/");
    }

    #[test]
    fn test_delete_cascades() {
        let conn = conn();
        let (_, about, _, team) = tree(&conn);
        delete(&conn, about).unwrap();
        assert!(get(&conn, team).is_err());
        assert_eq!(count(&conn).unwrap(), 2);
    }

    #[test]
    fn test_max_order() {
        let conn = conn();
        assert_eq!(max_order(&conn).unwrap(), None);
        tree(&conn);
        assert_eq!(max_order(&conn).unwrap(), Some(4));
    }

    #[test]
    fn test_search() {
        let conn = conn();
        tree(&conn);
        assert_eq!(search(&conn, None).unwrap().len(), 4);
        let found = search(&conn, Some("TEA")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Team");
    }

    #[test]
    fn test_update() {
        let conn = conn();
        let (home, ..) = tree(&conn);
        let mut page = get(&conn, home).unwrap();
        page.title = "Welcome".into();
        page.is_online = false;
        update(&conn, &page).unwrap();
        let page = get(&conn, home).unwrap();
        assert_eq!(page.title, "Welcome");
        assert!(!page.is_online);
    }
}
