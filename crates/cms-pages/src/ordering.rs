//! Sibling ranking.
//!
//! Moving a page swaps its rank with the nearest sibling in the requested
//! direction. The read of both ranks and the two writes happen inside one
//! exclusive lock on the page table, so concurrent moves never work from
//! stale neighbours and never leave two siblings sharing a rank. A page that
//! is already first (or last), or that has no parent, is left alone.
//!
//! Saving takes the same lock when it has to assign a rank or when the page
//! would become a homepage, so the homepage check and the write cannot be
//! interleaved with another save.

use std::fmt;
use std::str::FromStr;

use cms_core::{CmsError, CmsResult, Database, ValidationError};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{self, Page, TABLE};

/// The direction of a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards lower ranks.
    Up,
    /// Towards higher ranks.
    Down,
}

impl Direction {
    /// Returns the submitted spelling.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = CmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(CmsError::BadRequest(format!(
                "Direction should be 'up' or 'down', not '{other}'."
            ))),
        }
    }
}

/// What a move did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The page swapped ranks with `other`.
    Swapped {
        /// The sibling the page traded places with.
        other: i64,
    },
    /// Nothing to do: homepage, or already at the edge.
    Unchanged,
}

/// Finds the nearest sibling of `page` in `direction`.
pub fn neighbour(conn: &Connection, page: &Page, direction: Direction) -> CmsResult<Option<(i64, i64)>> {
    let Some(parent_id) = page.parent_id else {
        return Ok(None);
    };
    let sql = match direction {
        Direction::Up => {
            r#"SELECT id, "order" FROM pages_page WHERE parent_id = ?1 AND "order" < ?2
               ORDER BY "order" DESC, id DESC LIMIT 1"#
        }
        Direction::Down => {
            r#"SELECT id, "order" FROM pages_page WHERE parent_id = ?1 AND "order" > ?2
               ORDER BY "order", id LIMIT 1"#
        }
    };
    Ok(conn
        .query_row(sql, params![parent_id, page.order], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .optional()?)
}

/// Moves a page one place up or down among its siblings.
///
/// # Errors
///
/// Returns [`CmsError::DoesNotExist`] if the page is gone.
pub async fn move_page(db: &Database, page_id: i64, direction: Direction) -> CmsResult<MoveOutcome> {
    let outcome = db
        .locked(TABLE, move |conn| {
            let page = models::get(conn, page_id)?;
            let Some((other_id, other_order)) = neighbour(conn, &page, direction)? else {
                return Ok(MoveOutcome::Unchanged);
            };
            models::set_order(conn, page.id, other_order)?;
            models::set_order(conn, other_id, page.order)?;
            Ok(MoveOutcome::Swapped { other: other_id })
        })
        .await?;
    tracing::info!(page = page_id, %direction, ?outcome, "moved page");
    Ok(outcome)
}

/// Returns the rank for a page appended to the tree: one past the highest
/// rank, or `1` when there are no pages. Call it inside the lock that also
/// inserts the page.
pub fn next_order(conn: &Connection) -> CmsResult<i64> {
    Ok(models::max_order(conn)?.map_or(1, |max| max + 1))
}

/// Rejects a second homepage: a page without a parent is only valid when
/// no other homepage exists.
pub fn check_homepage(conn: &Connection, page: &Page) -> CmsResult<()> {
    if page.parent_id.is_some() {
        return Ok(());
    }
    match models::get_homepage(conn)? {
        Some(homepage) if homepage.id != page.id => Err(ValidationError::new(
            "Please correct the errors below.",
        )
        .field("parent", "This field is required.")
        .into()),
        _ => Ok(()),
    }
}

/// Saves a page, assigning the next rank when it has none.
///
/// Inserts when `page.id` is `0`, updates otherwise, and returns the id.
/// A parentless page is rejected when another homepage exists.
pub async fn save_page(db: &Database, page: Page) -> CmsResult<i64> {
    if page.order == 0 || page.parent_id.is_none() {
        db.locked(TABLE, move |conn| save_in(conn, page)).await
    } else {
        db.atomic(move |conn| save_in(conn, page)).await
    }
}

fn save_in(conn: &Connection, mut page: Page) -> CmsResult<i64> {
    check_homepage(conn, &page)?;
    if page.order == 0 {
        page.order = next_order(conn)?;
    }
    if page.id == 0 {
        models::insert(conn, &page)
    } else {
        models::update(conn, &page)?;
        Ok(page.id)
    }
}
