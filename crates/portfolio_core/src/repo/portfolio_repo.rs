//! Portfolio repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD APIs over the `portfolios` hierarchy root.
//!
//! # Invariants
//! - Listing order is insertion order (`id ASC`).
//! - Patches only touch supplied fields.

use crate::model::input::{NewPortfolio, PortfolioPatch};
use crate::model::portfolio::{EntityKind, Portfolio, PortfolioId};
use crate::model::validation::validate_id;
use crate::repo::{
    constraint_kind, ensure_connection_ready, ConstraintKind, RepoError, RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

const PORTFOLIO_SELECT_SQL: &str = "SELECT id, name, url FROM portfolios";

/// Repository interface for portfolio CRUD operations.
pub trait PortfolioRepository {
    /// Lists every portfolio in insertion order.
    fn list_portfolios(&self) -> RepoResult<Vec<Portfolio>>;
    /// Loads one portfolio by id.
    fn get_portfolio(&self, id: PortfolioId) -> RepoResult<Option<Portfolio>>;
    /// Creates one portfolio and returns it with its assigned id.
    fn create_portfolio(&self, input: &NewPortfolio) -> RepoResult<Portfolio>;
    /// Applies a partial update.
    fn update_portfolio(&self, id: PortfolioId, patch: &PortfolioPatch) -> RepoResult<Portfolio>;
    /// Removes one portfolio row.
    fn delete_portfolio(&self, id: PortfolioId) -> RepoResult<()>;
}

/// SQLite-backed portfolio repository.
pub struct SqlitePortfolioRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePortfolioRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "portfolios", &["id", "name", "url"])?;
        Ok(Self { conn })
    }
}

impl PortfolioRepository for SqlitePortfolioRepository<'_> {
    fn list_portfolios(&self) -> RepoResult<Vec<Portfolio>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PORTFOLIO_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut portfolios = Vec::new();
        while let Some(row) = rows.next()? {
            portfolios.push(parse_portfolio_row(row)?);
        }
        Ok(portfolios)
    }

    fn get_portfolio(&self, id: PortfolioId) -> RepoResult<Option<Portfolio>> {
        let portfolio = self
            .conn
            .query_row(
                &format!("{PORTFOLIO_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_portfolio_row,
            )
            .optional()?;
        Ok(portfolio)
    }

    fn create_portfolio(&self, input: &NewPortfolio) -> RepoResult<Portfolio> {
        input.validate()?;

        self.conn.execute(
            "INSERT INTO portfolios (name, url) VALUES (?1, ?2);",
            params![input.name.as_str(), input.url.as_str()],
        )?;

        Ok(Portfolio {
            id: self.conn.last_insert_rowid(),
            name: input.name.clone(),
            url: input.url.clone(),
        })
    }

    fn update_portfolio(&self, id: PortfolioId, patch: &PortfolioPatch) -> RepoResult<Portfolio> {
        validate_id(EntityKind::Portfolio, id)?;
        patch.validate()?;

        let changed = self.conn.execute(
            "UPDATE portfolios
             SET
                name = COALESCE(?2, name),
                url = COALESCE(?3, url)
             WHERE id = ?1;",
            params![id, patch.name.as_deref(), patch.url.as_deref()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: EntityKind::Portfolio,
                id,
            });
        }

        self.get_portfolio(id)?.ok_or(RepoError::NotFound {
            kind: EntityKind::Portfolio,
            id,
        })
    }

    fn delete_portfolio(&self, id: PortfolioId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM portfolios WHERE id = ?1;", [id])
            .map_err(|err| match constraint_kind(&err) {
                Some(ConstraintKind::ForeignKey) => RepoError::Referenced {
                    kind: EntityKind::Portfolio,
                    id,
                },
                _ => err.into(),
            })?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: EntityKind::Portfolio,
                id,
            });
        }
        Ok(())
    }
}

fn parse_portfolio_row(row: &Row<'_>) -> rusqlite::Result<Portfolio> {
    Ok(Portfolio {
        id: row.get("id")?,
        name: row.get("name")?,
        url: row.get("url")?,
    })
}
