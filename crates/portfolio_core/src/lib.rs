//! Core domain logic for the portfolio hierarchy.
//! This crate is the single source of truth for Portfolio → Version → Page
//! invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::input::{NewPage, NewPortfolio, PagePatch, PortfolioPatch, VersionPatch};
pub use model::portfolio::{
    EntityKind, Page, PageDetail, PageId, Portfolio, PortfolioId, PortfolioVersion,
    PortfolioWithVersions, VersionDetail, VersionId,
};
pub use model::validation::{ValidationError, MAX_TEXT_CHARS};
pub use repo::page_repo::{PageRepository, SqlitePageRepository};
pub use repo::portfolio_repo::{PortfolioRepository, SqlitePortfolioRepository};
pub use repo::unit_of_work::{SqliteUnitOfWork, TxMode, UnitOfWork};
pub use repo::version_repo::{SqliteVersionRepository, VersionRepository};
pub use repo::{RepoError, RepoResult};
pub use service::hierarchy_service::{
    DeleteMode, HierarchyError, HierarchyResult, HierarchyService, SqliteHierarchyService,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
