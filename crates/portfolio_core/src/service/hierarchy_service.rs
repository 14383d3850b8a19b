//! Portfolio hierarchy use-case service.
//!
//! # Responsibility
//! - Expose the portfolio/version/page query and mutation operations.
//! - Validate parent existence above the repository layer.
//! - Own cross-entity flows: version creation with pages, full page-set
//!   replacement, page reassignment, cascading deletes.
//!
//! # Invariants
//! - Every operation runs in one `UnitOfWork` scope; a failed operation
//!   commits nothing.
//! - Order is always validate-parent → mutate → persist → return, failing on
//!   the first unresolved reference.
//! - Supplying `pages` replaces the whole page set of a version; omitting it
//!   leaves pages untouched.
//! - Log events carry ids and counts only, never names or urls.

use crate::model::input::{NewPage, NewPortfolio, PagePatch, PortfolioPatch, VersionPatch};
use crate::model::portfolio::{
    EntityKind, Page, PageDetail, PageId, Portfolio, PortfolioId, PortfolioVersion,
    PortfolioWithVersions, VersionDetail, VersionId,
};
use crate::model::validation::{validate_id, validate_text, ValidationError};
use crate::repo::page_repo::{PageRepository, SqlitePageRepository};
use crate::repo::portfolio_repo::{PortfolioRepository, SqlitePortfolioRepository};
use crate::repo::unit_of_work::{SqliteUnitOfWork, TxMode, UnitOfWork};
use crate::repo::version_repo::{SqliteVersionRepository, VersionRepository};
use crate::repo::RepoError;
use log::{debug, info, warn};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type HierarchyResult<T> = Result<T, HierarchyError>;

/// Child handling when deleting a portfolio or version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    /// Delete descendants first, then the target row.
    #[default]
    Cascade,
    /// Reject deletion while descendants exist.
    Restrict,
}

/// Errors from hierarchy service operations.
#[derive(Debug)]
pub enum HierarchyError {
    /// Target or referenced parent does not exist.
    NotFound { kind: EntityKind, id: i64 },
    /// Unique value (page url) is already used.
    UniqueConstraintViolation { field: &'static str, value: String },
    /// Input shape is invalid.
    Validation(ValidationError),
    /// Restrict-mode delete found child rows.
    HasDependents {
        kind: EntityKind,
        id: i64,
        dependents: usize,
    },
    /// Repository-level failure.
    Repo(RepoError),
}

impl HierarchyError {
    /// Stable machine-readable code used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::UniqueConstraintViolation { .. } => "unique_constraint_violation",
            Self::Validation(_) => "validation_failed",
            Self::HasDependents { .. } => "has_dependents",
            Self::Repo(_) => "repo_failure",
        }
    }
}

impl Display for HierarchyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::UniqueConstraintViolation { field, value } => {
                write!(f, "unique constraint violated: {field} `{value}` already exists")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::HasDependents {
                kind,
                id,
                dependents,
            } => write!(f, "{kind} {id} still owns {dependents} child records"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for HierarchyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for HierarchyError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { kind, id } => Self::NotFound { kind, id },
            RepoError::UniqueViolation { field, value } => {
                Self::UniqueConstraintViolation { field, value }
            }
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for HierarchyError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Hierarchy service over injected stores and a transaction boundary.
pub struct HierarchyService<P, V, G, U> {
    portfolios: P,
    versions: V,
    pages: G,
    uow: U,
}

/// Service wired to SQLite stores sharing one connection.
pub type SqliteHierarchyService<'conn> = HierarchyService<
    SqlitePortfolioRepository<'conn>,
    SqliteVersionRepository<'conn>,
    SqlitePageRepository<'conn>,
    SqliteUnitOfWork<'conn>,
>;

impl<'conn> SqliteHierarchyService<'conn> {
    /// Builds the service from one migrated connection.
    pub fn sqlite(conn: &'conn Connection) -> HierarchyResult<Self> {
        Ok(Self::new(
            SqlitePortfolioRepository::try_new(conn)?,
            SqliteVersionRepository::try_new(conn)?,
            SqlitePageRepository::try_new(conn)?,
            SqliteUnitOfWork::new(conn),
        ))
    }
}

impl<P, V, G, U> HierarchyService<P, V, G, U>
where
    P: PortfolioRepository,
    V: VersionRepository,
    G: PageRepository,
    U: UnitOfWork,
{
    /// Creates service from store implementations.
    pub fn new(portfolios: P, versions: V, pages: G, uow: U) -> Self {
        Self {
            portfolios,
            versions,
            pages,
            uow,
        }
    }

    /// Lists every portfolio with its versions attached.
    pub fn list_portfolios(&self) -> HierarchyResult<Vec<PortfolioWithVersions>> {
        self.run("portfolio_list", TxMode::Read, || {
            let portfolios = self.portfolios.list_portfolios()?;
            let mut items = Vec::with_capacity(portfolios.len());
            for portfolio in portfolios {
                let versions = self.versions.list_versions_by_portfolio(portfolio.id)?;
                items.push(PortfolioWithVersions {
                    portfolio,
                    versions,
                });
            }
            Ok(items)
        })
    }

    /// Creates a portfolio.
    pub fn add_portfolio(
        &self,
        name: impl Into<String>,
        url: impl Into<String>,
    ) -> HierarchyResult<Portfolio> {
        let input = NewPortfolio::new(name, url);
        self.run("portfolio_add", TxMode::Write, || {
            let portfolio = self.portfolios.create_portfolio(&input)?;
            info!(
                "event=portfolio_add module=hierarchy status=ok portfolio_id={}",
                portfolio.id
            );
            Ok(portfolio)
        })
    }

    /// Applies a partial portfolio update.
    pub fn update_portfolio(
        &self,
        id: PortfolioId,
        patch: &PortfolioPatch,
    ) -> HierarchyResult<Portfolio> {
        validate_id(EntityKind::Portfolio, id)?;
        self.run("portfolio_update", TxMode::Write, || {
            let portfolio = self.require_portfolio(id)?;
            if patch.is_empty() {
                return Ok(portfolio);
            }
            Ok(self.portfolios.update_portfolio(id, patch)?)
        })
    }

    /// Deletes a portfolio and everything it owns.
    pub fn delete_portfolio(&self, id: PortfolioId) -> HierarchyResult<bool> {
        self.delete_portfolio_with_mode(id, DeleteMode::Cascade)
    }

    /// Deletes a portfolio using the given child handling.
    pub fn delete_portfolio_with_mode(
        &self,
        id: PortfolioId,
        mode: DeleteMode,
    ) -> HierarchyResult<bool> {
        validate_id(EntityKind::Portfolio, id)?;
        self.run("portfolio_delete", TxMode::Write, || {
            self.require_portfolio(id)?;
            if mode == DeleteMode::Restrict {
                let version_count = self.versions.count_versions_by_portfolio(id)?;
                if version_count > 0 {
                    return Err(HierarchyError::HasDependents {
                        kind: EntityKind::Portfolio,
                        id,
                        dependents: version_count,
                    });
                }
            }

            let versions = self.versions.list_versions_by_portfolio(id)?;
            let mut pages_removed = 0;
            for version in &versions {
                pages_removed += self.pages.delete_pages_by_version(version.id)?;
            }
            let versions_removed = self.versions.delete_versions_by_portfolio(id)?;
            self.portfolios.delete_portfolio(id)?;

            info!(
                "event=portfolio_delete module=hierarchy status=ok portfolio_id={} versions_removed={} pages_removed={}",
                id, versions_removed, pages_removed
            );
            Ok(true)
        })
    }

    /// Lists versions of one portfolio with pages and parent attached.
    ///
    /// An unknown portfolio yields an empty list.
    pub fn list_portfolio_versions(
        &self,
        portfolio_id: PortfolioId,
    ) -> HierarchyResult<Vec<VersionDetail>> {
        validate_id(EntityKind::Portfolio, portfolio_id)?;
        self.run("version_list", TxMode::Read, || {
            let Some(portfolio) = self.portfolios.get_portfolio(portfolio_id)? else {
                return Ok(Vec::new());
            };
            let versions = self.versions.list_versions_by_portfolio(portfolio_id)?;
            let mut items = Vec::with_capacity(versions.len());
            for version in versions {
                let pages = self.pages.list_pages_by_version(version.id)?;
                items.push(VersionDetail {
                    version,
                    portfolio: portfolio.clone(),
                    pages,
                });
            }
            Ok(items)
        })
    }

    /// Loads one version with pages and parent attached.
    pub fn get_portfolio_version(&self, id: VersionId) -> HierarchyResult<VersionDetail> {
        validate_id(EntityKind::Version, id)?;
        self.run("version_get", TxMode::Read, || {
            let version = self.require_version(id)?;
            self.version_detail(version)
        })
    }

    /// Creates a version under a portfolio, optionally with its pages.
    ///
    /// `pages: None` skips page creation; `Some(vec![])` creates none. A page
    /// that cannot be written rolls back the version as well.
    pub fn add_portfolio_version(
        &self,
        portfolio_id: PortfolioId,
        version_type: impl Into<String>,
        pages: Option<Vec<NewPage>>,
    ) -> HierarchyResult<VersionDetail> {
        let version_type = version_type.into();
        validate_id(EntityKind::Portfolio, portfolio_id)?;
        validate_text("versionType", &version_type)?;
        validate_page_inputs(pages.as_deref())?;

        self.run("version_add", TxMode::Write, || {
            let portfolio = self.require_portfolio(portfolio_id)?;
            let version = self.versions.create_version(portfolio_id, &version_type)?;
            let created = match pages.as_deref() {
                Some(inputs) => self.create_pages(version.id, inputs)?,
                None => Vec::new(),
            };

            info!(
                "event=version_add module=hierarchy status=ok portfolio_id={} version_id={} pages_created={}",
                portfolio_id,
                version.id,
                created.len()
            );
            Ok(VersionDetail {
                version,
                portfolio,
                pages: created,
            })
        })
    }

    /// Updates a version label and/or replaces its full page set.
    ///
    /// `pages: Some(..)` deletes every existing page of the version and
    /// creates exactly the supplied ones; `None` leaves pages untouched.
    pub fn update_portfolio_version(
        &self,
        id: VersionId,
        version_type: Option<String>,
        pages: Option<Vec<NewPage>>,
    ) -> HierarchyResult<VersionDetail> {
        let patch = VersionPatch { version_type };
        validate_id(EntityKind::Version, id)?;
        patch.validate()?;
        validate_page_inputs(pages.as_deref())?;

        self.run("version_update", TxMode::Write, || {
            let mut version = self.require_version(id)?;
            if !patch.is_empty() {
                version = self.versions.update_version(id, &patch)?;
            }

            if let Some(inputs) = pages.as_deref() {
                let removed = self.pages.delete_pages_by_version(id)?;
                let created = self.create_pages(id, inputs)?;
                info!(
                    "event=version_pages_replace module=hierarchy status=ok version_id={} pages_removed={} pages_created={}",
                    id,
                    removed,
                    created.len()
                );
            }

            info!(
                "event=version_update module=hierarchy status=ok version_id={} version_type_changed={} pages_replaced={}",
                id,
                !patch.is_empty(),
                pages.is_some()
            );
            self.version_detail(version)
        })
    }

    /// Deletes a version and its pages.
    pub fn delete_portfolio_version(&self, id: VersionId) -> HierarchyResult<bool> {
        self.delete_portfolio_version_with_mode(id, DeleteMode::Cascade)
    }

    /// Deletes a version using the given child handling.
    pub fn delete_portfolio_version_with_mode(
        &self,
        id: VersionId,
        mode: DeleteMode,
    ) -> HierarchyResult<bool> {
        validate_id(EntityKind::Version, id)?;
        self.run("version_delete", TxMode::Write, || {
            self.require_version(id)?;
            let page_count = self.pages.count_pages_by_version(id)?;
            if mode == DeleteMode::Restrict && page_count > 0 {
                return Err(HierarchyError::HasDependents {
                    kind: EntityKind::Version,
                    id,
                    dependents: page_count,
                });
            }

            let pages_removed = self.pages.delete_pages_by_version(id)?;
            self.versions.delete_version(id)?;
            info!(
                "event=version_delete module=hierarchy status=ok version_id={} pages_removed={}",
                id, pages_removed
            );
            Ok(true)
        })
    }

    /// Lists pages of one version with the parent version attached.
    ///
    /// An unknown version yields an empty list.
    pub fn list_pages(&self, version_id: VersionId) -> HierarchyResult<Vec<PageDetail>> {
        validate_id(EntityKind::Version, version_id)?;
        self.run("page_list", TxMode::Read, || {
            let Some(version) = self.versions.get_version(version_id)? else {
                return Ok(Vec::new());
            };
            let pages = self.pages.list_pages_by_version(version_id)?;
            Ok(pages
                .into_iter()
                .map(|page| PageDetail {
                    page,
                    version: version.clone(),
                })
                .collect())
        })
    }

    /// Creates a page under an existing version.
    pub fn add_page(
        &self,
        name: impl Into<String>,
        url: impl Into<String>,
        version_id: VersionId,
    ) -> HierarchyResult<PageDetail> {
        let input = NewPage::new(name, url);
        validate_id(EntityKind::Version, version_id)?;
        input.validate()?;

        self.run("page_add", TxMode::Write, || {
            let version = self.require_version(version_id)?;
            let page = self.pages.create_page(version_id, &input)?;
            info!(
                "event=page_add module=hierarchy status=ok version_id={} page_id={}",
                version_id, page.id
            );
            Ok(PageDetail { page, version })
        })
    }

    /// Applies a partial page update; `version_id` reassigns the owner.
    ///
    /// With every field omitted the page is returned unchanged.
    pub fn update_page(&self, id: PageId, patch: &PagePatch) -> HierarchyResult<PageDetail> {
        validate_id(EntityKind::Page, id)?;
        patch.validate()?;

        self.run("page_update", TxMode::Write, || {
            let page = self.require_page(id)?;
            if patch.is_empty() {
                let version = self.require_version(page.version_id)?;
                return Ok(PageDetail { page, version });
            }

            let version = match patch.version_id {
                Some(version_id) => self.require_version(version_id)?,
                None => self.require_version(page.version_id)?,
            };
            let updated = self.pages.update_page(id, patch)?;
            if version.id != page.version_id {
                info!(
                    "event=page_reassign module=hierarchy status=ok page_id={} from_version_id={} to_version_id={}",
                    id, page.version_id, version.id
                );
            }
            info!("event=page_update module=hierarchy status=ok page_id={id}");
            Ok(PageDetail {
                page: updated,
                version,
            })
        })
    }

    /// Moves a page under another existing version.
    pub fn reassign_page(&self, id: PageId, version_id: VersionId) -> HierarchyResult<PageDetail> {
        self.update_page(
            id,
            &PagePatch {
                version_id: Some(version_id),
                ..PagePatch::default()
            },
        )
    }

    /// Deletes one page.
    pub fn delete_page(&self, id: PageId) -> HierarchyResult<bool> {
        validate_id(EntityKind::Page, id)?;
        self.run("page_delete", TxMode::Write, || {
            self.pages.delete_page(id)?;
            info!("event=page_delete module=hierarchy status=ok page_id={id}");
            Ok(true)
        })
    }

    fn run<T, F>(&self, event: &'static str, mode: TxMode, work: F) -> HierarchyResult<T>
    where
        F: FnOnce() -> HierarchyResult<T>,
    {
        let started_at = Instant::now();
        let result = self.uow.atomically(mode, work);
        match &result {
            Ok(_) => debug!(
                "event={} module=hierarchy status=ok duration_ms={}",
                event,
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event={} module=hierarchy status=error duration_ms={} error_code={}",
                event,
                started_at.elapsed().as_millis(),
                err.code()
            ),
        }
        result
    }

    fn create_pages(&self, version_id: VersionId, inputs: &[NewPage]) -> HierarchyResult<Vec<Page>> {
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            created.push(self.pages.create_page(version_id, input)?);
        }
        Ok(created)
    }

    fn version_detail(&self, version: PortfolioVersion) -> HierarchyResult<VersionDetail> {
        let portfolio = self.require_portfolio(version.portfolio_id)?;
        let pages = self.pages.list_pages_by_version(version.id)?;
        Ok(VersionDetail {
            version,
            portfolio,
            pages,
        })
    }

    fn require_portfolio(&self, id: PortfolioId) -> HierarchyResult<Portfolio> {
        self.portfolios
            .get_portfolio(id)?
            .ok_or(HierarchyError::NotFound {
                kind: EntityKind::Portfolio,
                id,
            })
    }

    fn require_version(&self, id: VersionId) -> HierarchyResult<PortfolioVersion> {
        self.versions
            .get_version(id)?
            .ok_or(HierarchyError::NotFound {
                kind: EntityKind::Version,
                id,
            })
    }

    fn require_page(&self, id: PageId) -> HierarchyResult<Page> {
        self.pages.get_page(id)?.ok_or(HierarchyError::NotFound {
            kind: EntityKind::Page,
            id,
        })
    }
}

fn validate_page_inputs(pages: Option<&[NewPage]>) -> Result<(), ValidationError> {
    for page in pages.unwrap_or_default() {
        page.validate()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::HierarchyError;
    use crate::model::portfolio::EntityKind;
    use crate::model::validation::ValidationError;
    use crate::repo::RepoError;
    use std::error::Error;

    #[test]
    fn semantic_repo_errors_are_lifted_to_named_variants() {
        let not_found = HierarchyError::from(RepoError::NotFound {
            kind: EntityKind::Version,
            id: 7,
        });
        assert!(matches!(
            not_found,
            HierarchyError::NotFound {
                kind: EntityKind::Version,
                id: 7
            }
        ));
        assert_eq!(not_found.code(), "not_found");

        let unique = HierarchyError::from(RepoError::UniqueViolation {
            field: "url",
            value: "http://x.com".to_string(),
        });
        assert!(matches!(
            unique,
            HierarchyError::UniqueConstraintViolation { field: "url", .. }
        ));

        let validation = HierarchyError::from(RepoError::Validation(
            ValidationError::ControlCharacter { field: "name" },
        ));
        assert!(matches!(validation, HierarchyError::Validation(_)));
        assert!(validation.source().is_some());
    }

    #[test]
    fn transport_errors_stay_wrapped() {
        let err = HierarchyError::from(RepoError::MissingRequiredTable("pages"));
        assert!(matches!(err, HierarchyError::Repo(_)));
        assert_eq!(err.code(), "repo_failure");
        assert_eq!(err.to_string(), "repository requires table `pages`");
    }
}
