//! Page repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD APIs over `pages`.
//! - Enforce global url uniqueness and parent version resolution on writes.
//!
//! # Invariants
//! - `url` is unique across all pages, not per version.
//! - A page is only written when its (new) parent version exists.
//! - A url check on update ignores the page being updated.
//! - Listing order is insertion order (`id ASC`).

use crate::model::input::{NewPage, PagePatch};
use crate::model::portfolio::{EntityKind, Page, PageId, VersionId};
use crate::model::validation::validate_id;
use crate::repo::{
    constraint_kind, count_to_usize, ensure_connection_ready, row_exists, ConstraintKind,
    RepoError, RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

const PAGE_SELECT_SQL: &str = "SELECT id, version_id, name, url FROM pages";

/// Repository interface for page operations.
pub trait PageRepository {
    /// Lists pages owned by one version.
    fn list_pages_by_version(&self, version_id: VersionId) -> RepoResult<Vec<Page>>;
    /// Loads one page by id.
    fn get_page(&self, id: PageId) -> RepoResult<Option<Page>>;
    /// Creates one page under an existing version.
    fn create_page(&self, version_id: VersionId, input: &NewPage) -> RepoResult<Page>;
    /// Applies a partial update, including optional parent reassignment.
    fn update_page(&self, id: PageId, patch: &PagePatch) -> RepoResult<Page>;
    /// Removes one page row.
    fn delete_page(&self, id: PageId) -> RepoResult<()>;
    /// Removes every page of one version and returns the removed count.
    fn delete_pages_by_version(&self, version_id: VersionId) -> RepoResult<usize>;
    /// Counts pages owned by one version.
    fn count_pages_by_version(&self, version_id: VersionId) -> RepoResult<usize>;
}

/// SQLite-backed page repository.
pub struct SqlitePageRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePageRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "pages", &["id", "version_id", "name", "url"])?;
        Ok(Self { conn })
    }

    fn ensure_version_exists(&self, version_id: VersionId) -> RepoResult<()> {
        if !row_exists(self.conn, "portfolio_versions", version_id)? {
            return Err(RepoError::NotFound {
                kind: EntityKind::Version,
                id: version_id,
            });
        }
        Ok(())
    }

    fn url_owner(&self, url: &str) -> RepoResult<Option<PageId>> {
        let id = self
            .conn
            .query_row("SELECT id FROM pages WHERE url = ?1;", [url], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(id)
    }

    fn ensure_url_available(&self, url: &str, owner: Option<PageId>) -> RepoResult<()> {
        match self.url_owner(url)? {
            Some(existing) if Some(existing) != owner => Err(RepoError::UniqueViolation {
                field: "url",
                value: url.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl PageRepository for SqlitePageRepository<'_> {
    fn list_pages_by_version(&self, version_id: VersionId) -> RepoResult<Vec<Page>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PAGE_SELECT_SQL}
             WHERE version_id = ?1
             ORDER BY id ASC;"
        ))?;
        let mut rows = stmt.query([version_id])?;
        let mut pages = Vec::new();
        while let Some(row) = rows.next()? {
            pages.push(parse_page_row(row)?);
        }
        Ok(pages)
    }

    fn get_page(&self, id: PageId) -> RepoResult<Option<Page>> {
        let page = self
            .conn
            .query_row(
                &format!("{PAGE_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_page_row,
            )
            .optional()?;
        Ok(page)
    }

    fn create_page(&self, version_id: VersionId, input: &NewPage) -> RepoResult<Page> {
        validate_id(EntityKind::Version, version_id)?;
        input.validate()?;
        self.ensure_version_exists(version_id)?;
        self.ensure_url_available(&input.url, None)?;

        self.conn
            .execute(
                "INSERT INTO pages (version_id, name, url) VALUES (?1, ?2, ?3);",
                params![version_id, input.name.as_str(), input.url.as_str()],
            )
            .map_err(|err| map_page_write_error(err, version_id, &input.url))?;

        Ok(Page {
            id: self.conn.last_insert_rowid(),
            version_id,
            name: input.name.clone(),
            url: input.url.clone(),
        })
    }

    fn update_page(&self, id: PageId, patch: &PagePatch) -> RepoResult<Page> {
        validate_id(EntityKind::Page, id)?;
        patch.validate()?;

        let existing = self.get_page(id)?.ok_or(RepoError::NotFound {
            kind: EntityKind::Page,
            id,
        })?;
        if patch.is_empty() {
            return Ok(existing);
        }

        let target_version = patch.version_id.unwrap_or(existing.version_id);
        if let Some(version_id) = patch.version_id {
            self.ensure_version_exists(version_id)?;
        }
        let target_url = patch.url.as_deref().unwrap_or(existing.url.as_str());
        if patch.url.is_some() {
            self.ensure_url_available(target_url, Some(id))?;
        }

        self.conn
            .execute(
                "UPDATE pages
                 SET
                    name = COALESCE(?2, name),
                    url = COALESCE(?3, url),
                    version_id = COALESCE(?4, version_id)
                 WHERE id = ?1;",
                params![
                    id,
                    patch.name.as_deref(),
                    patch.url.as_deref(),
                    patch.version_id
                ],
            )
            .map_err(|err| map_page_write_error(err, target_version, target_url))?;

        self.get_page(id)?.ok_or(RepoError::NotFound {
            kind: EntityKind::Page,
            id,
        })
    }

    fn delete_page(&self, id: PageId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM pages WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: EntityKind::Page,
                id,
            });
        }
        Ok(())
    }

    fn delete_pages_by_version(&self, version_id: VersionId) -> RepoResult<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM pages WHERE version_id = ?1;", [version_id])?;
        Ok(removed)
    }

    fn count_pages_by_version(&self, version_id: VersionId) -> RepoResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE version_id = ?1;",
            [version_id],
            |row| row.get(0),
        )?;
        count_to_usize(count, "pages")
    }
}

fn map_page_write_error(err: rusqlite::Error, version_id: VersionId, url: &str) -> RepoError {
    match constraint_kind(&err) {
        Some(ConstraintKind::Unique) => RepoError::UniqueViolation {
            field: "url",
            value: url.to_string(),
        },
        Some(ConstraintKind::ForeignKey) => RepoError::NotFound {
            kind: EntityKind::Version,
            id: version_id,
        },
        None => err.into(),
    }
}

fn parse_page_row(row: &Row<'_>) -> rusqlite::Result<Page> {
    Ok(Page {
        id: row.get("id")?,
        version_id: row.get("version_id")?,
        name: row.get("name")?,
        url: row.get("url")?,
    })
}
