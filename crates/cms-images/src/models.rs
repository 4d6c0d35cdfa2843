//! Images and image categories.

use cms_core::{CmsError, CmsResult};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS images_category (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS images_image (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    image TEXT NOT NULL,
    width INTEGER NOT NULL DEFAULT 0,
    height INTEGER NOT NULL DEFAULT 0,
    size INTEGER NOT NULL DEFAULT 0,
    category_id INTEGER REFERENCES images_category(id) ON DELETE SET NULL
);
CREATE INDEX IF NOT EXISTS images_image_category ON images_image (category_id);
";

/// Creates the image tables.
pub fn create_tables(conn: &Connection) -> CmsResult<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// A category grouping images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// An image in the media library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Image {
    pub id: i64,
    pub title: String,
    /// Path of the file relative to the media root.
    pub image: String,
    pub width: u32,
    pub height: u32,
    /// File size in bytes.
    pub size: u64,
    pub category_id: Option<i64>,
}

impl Image {
    /// The public URL of the file.
    pub fn url(&self, media_url: &str) -> String {
        format!("{}/{}", media_url.trim_end_matches('/'), self.image)
    }
}

impl std::fmt::Display for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.title)
    }
}

// ── Categories ──────────────────────────────────────────────────────

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

/// Lists categories by id, optionally filtered by a name search.
pub fn categories(conn: &Connection, term: Option<&str>) -> CmsResult<Vec<Category>> {
    let term = term.map(str::trim).filter(|t| !t.is_empty());
    let mut stmt = conn.prepare(
        "SELECT id, name FROM images_category
         WHERE ?1 IS NULL OR instr(lower(name), lower(?1)) > 0
         ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![term], category_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Loads a category by id.
pub fn get_category(conn: &Connection, id: i64) -> CmsResult<Category> {
    conn.query_row(
        "SELECT id, name FROM images_category WHERE id = ?1",
        params![id],
        category_from_row,
    )
    .optional()?
    .ok_or_else(|| CmsError::DoesNotExist("Category matching query does not exist.".into()))
}

/// Inserts a category and returns its id.
pub fn insert_category(conn: &Connection, name: &str) -> CmsResult<i64> {
    conn.execute("INSERT INTO images_category (name) VALUES (?1)", params![name])?;
    Ok(conn.last_insert_rowid())
}

/// Renames a category.
pub fn update_category(conn: &Connection, category: &Category) -> CmsResult<()> {
    let updated = conn.execute(
        "UPDATE images_category SET name = ?2 WHERE id = ?1",
        params![category.id, category.name],
    )?;
    if updated == 0 {
        return Err(CmsError::DoesNotExist("Category matching query does not exist.".into()));
    }
    Ok(())
}

/// Deletes a category; its images lose their category.
pub fn delete_category(conn: &Connection, id: i64) -> CmsResult<usize> {
    Ok(conn.execute("DELETE FROM images_category WHERE id = ?1", params![id])?)
}

// ── Images ──────────────────────────────────────────────────────────

const IMAGE_COLUMNS: &str = "id, title, image, width, height, size, category_id";

fn image_from_row(row: &Row<'_>) -> rusqlite::Result<Image> {
    Ok(Image {
        id: row.get(0)?,
        title: row.get(1)?,
        image: row.get(2)?,
        width: row.get(3)?,
        height: row.get(4)?,
        size: row.get(5)?,
        category_id: row.get(6)?,
    })
}

/// Filters for the image changelist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageFilter {
    /// Case-insensitive search on the title.
    pub search: Option<String>,
    /// Only images in this category.
    pub category_id: Option<i64>,
}

/// Lists images by title, then id.
pub fn images(conn: &Connection, filter: &ImageFilter) -> CmsResult<Vec<Image>> {
    let search = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    let mut stmt = conn.prepare(&format!(
        "SELECT {IMAGE_COLUMNS} FROM images_image
         WHERE (?1 IS NULL OR instr(lower(title), lower(?1)) > 0)
           AND (?2 IS NULL OR category_id = ?2)
         ORDER BY title, id"
    ))?;
    let rows = stmt
        .query_map(params![search, filter.category_id], image_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Loads an image by id.
pub fn get_image(conn: &Connection, id: i64) -> CmsResult<Image> {
    conn.query_row(
        &format!("SELECT {IMAGE_COLUMNS} FROM images_image WHERE id = ?1"),
        params![id],
        image_from_row,
    )
    .optional()?
    .ok_or_else(|| CmsError::DoesNotExist("Image matching query does not exist.".into()))
}

/// Inserts an image and returns its id.
pub fn insert_image(conn: &Connection, image: &Image) -> CmsResult<i64> {
    conn.execute(
        "INSERT INTO images_image (title, image, width, height, size, category_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            image.title,
            image.image,
            image.width,
            image.height,
            image.size,
            image.category_id
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Writes every column of an existing image.
pub fn update_image(conn: &Connection, image: &Image) -> CmsResult<()> {
    let updated = conn.execute(
        "UPDATE images_image SET title = ?2, image = ?3, width = ?4, height = ?5,
             size = ?6, category_id = ?7
         WHERE id = ?1",
        params![
            image.id,
            image.title,
            image.image,
            image.width,
            image.height,
            image.size,
            image.category_id
        ],
    )?;
    if updated == 0 {
        return Err(CmsError::DoesNotExist("Image matching query does not exist.".into()));
    }
    Ok(())
}

/// Deletes an image row.
pub fn delete_image(conn: &Connection, id: i64) -> CmsResult<usize> {
    Ok(conn.execute("DELETE FROM images_image WHERE id = ?1", params![id])?)
}

/// Sets (or clears) the category of the given images; returns the number
/// of rows updated.
pub fn set_category(conn: &Connection, ids: &[i64], category_id: Option<i64>) -> CmsResult<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!("UPDATE images_image SET category_id = ? WHERE id IN ({placeholders})");
    let values = std::iter::once(rusqlite::types::Value::from(category_id))
        .chain(ids.iter().map(|id| rusqlite::types::Value::Integer(*id)));
    Ok(conn.execute(&sql, params_from_iter(values))?)
}
