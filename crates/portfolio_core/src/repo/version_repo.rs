//! Portfolio version repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD APIs over `portfolio_versions`.
//! - Resolve the owning portfolio on create.
//!
//! # Invariants
//! - A version row is only written when its portfolio exists.
//! - Listing order is insertion order (`id ASC`).

use crate::model::input::VersionPatch;
use crate::model::portfolio::{EntityKind, PortfolioId, PortfolioVersion, VersionId};
use crate::model::validation::{validate_id, validate_text};
use crate::repo::{
    constraint_kind, count_to_usize, ensure_connection_ready, row_exists, ConstraintKind,
    RepoError, RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

const VERSION_SELECT_SQL: &str = "SELECT id, portfolio_id, version_type FROM portfolio_versions";

/// Repository interface for portfolio version operations.
pub trait VersionRepository {
    /// Lists versions owned by one portfolio.
    fn list_versions_by_portfolio(
        &self,
        portfolio_id: PortfolioId,
    ) -> RepoResult<Vec<PortfolioVersion>>;
    /// Loads one version by id.
    fn get_version(&self, id: VersionId) -> RepoResult<Option<PortfolioVersion>>;
    /// Creates one version under an existing portfolio.
    fn create_version(
        &self,
        portfolio_id: PortfolioId,
        version_type: &str,
    ) -> RepoResult<PortfolioVersion>;
    /// Applies a partial update.
    fn update_version(&self, id: VersionId, patch: &VersionPatch) -> RepoResult<PortfolioVersion>;
    /// Removes one version row.
    fn delete_version(&self, id: VersionId) -> RepoResult<()>;
    /// Removes every version of one portfolio and returns the removed count.
    fn delete_versions_by_portfolio(&self, portfolio_id: PortfolioId) -> RepoResult<usize>;
    /// Counts versions owned by one portfolio.
    fn count_versions_by_portfolio(&self, portfolio_id: PortfolioId) -> RepoResult<usize>;
}

/// SQLite-backed portfolio version repository.
pub struct SqliteVersionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteVersionRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            "portfolio_versions",
            &["id", "portfolio_id", "version_type"],
        )?;
        Ok(Self { conn })
    }
}

impl VersionRepository for SqliteVersionRepository<'_> {
    fn list_versions_by_portfolio(
        &self,
        portfolio_id: PortfolioId,
    ) -> RepoResult<Vec<PortfolioVersion>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VERSION_SELECT_SQL}
             WHERE portfolio_id = ?1
             ORDER BY id ASC;"
        ))?;
        let mut rows = stmt.query([portfolio_id])?;
        let mut versions = Vec::new();
        while let Some(row) = rows.next()? {
            versions.push(parse_version_row(row)?);
        }
        Ok(versions)
    }

    fn get_version(&self, id: VersionId) -> RepoResult<Option<PortfolioVersion>> {
        let version = self
            .conn
            .query_row(
                &format!("{VERSION_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_version_row,
            )
            .optional()?;
        Ok(version)
    }

    fn create_version(
        &self,
        portfolio_id: PortfolioId,
        version_type: &str,
    ) -> RepoResult<PortfolioVersion> {
        validate_id(EntityKind::Portfolio, portfolio_id)?;
        validate_text("versionType", version_type)?;

        let missing_portfolio = RepoError::NotFound {
            kind: EntityKind::Portfolio,
            id: portfolio_id,
        };
        if !row_exists(self.conn, "portfolios", portfolio_id)? {
            return Err(missing_portfolio);
        }

        self.conn
            .execute(
                "INSERT INTO portfolio_versions (portfolio_id, version_type) VALUES (?1, ?2);",
                params![portfolio_id, version_type],
            )
            .map_err(|err| match constraint_kind(&err) {
                Some(ConstraintKind::ForeignKey) => missing_portfolio,
                _ => err.into(),
            })?;

        Ok(PortfolioVersion {
            id: self.conn.last_insert_rowid(),
            portfolio_id,
            version_type: version_type.to_string(),
        })
    }

    fn update_version(&self, id: VersionId, patch: &VersionPatch) -> RepoResult<PortfolioVersion> {
        validate_id(EntityKind::Version, id)?;
        patch.validate()?;

        let changed = self.conn.execute(
            "UPDATE portfolio_versions
             SET version_type = COALESCE(?2, version_type)
             WHERE id = ?1;",
            params![id, patch.version_type.as_deref()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: EntityKind::Version,
                id,
            });
        }

        self.get_version(id)?.ok_or(RepoError::NotFound {
            kind: EntityKind::Version,
            id,
        })
    }

    fn delete_version(&self, id: VersionId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM portfolio_versions WHERE id = ?1;", [id])
            .map_err(|err| match constraint_kind(&err) {
                Some(ConstraintKind::ForeignKey) => RepoError::Referenced {
                    kind: EntityKind::Version,
                    id,
                },
                _ => err.into(),
            })?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: EntityKind::Version,
                id,
            });
        }
        Ok(())
    }

    fn delete_versions_by_portfolio(&self, portfolio_id: PortfolioId) -> RepoResult<usize> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM portfolio_versions WHERE portfolio_id = ?1;",
                [portfolio_id],
            )
            .map_err(|err| match constraint_kind(&err) {
                Some(ConstraintKind::ForeignKey) => RepoError::Referenced {
                    kind: EntityKind::Portfolio,
                    id: portfolio_id,
                },
                _ => err.into(),
            })?;
        Ok(removed)
    }

    fn count_versions_by_portfolio(&self, portfolio_id: PortfolioId) -> RepoResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM portfolio_versions WHERE portfolio_id = ?1;",
            [portfolio_id],
            |row| row.get(0),
        )?;
        count_to_usize(count, "portfolio_versions")
    }
}

fn parse_version_row(row: &Row<'_>) -> rusqlite::Result<PortfolioVersion> {
    Ok(PortfolioVersion {
        id: row.get("id")?,
        portfolio_id: row.get("portfolio_id")?,
        version_type: row.get("version_type")?,
    })
}
