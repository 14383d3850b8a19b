//! Hierarchy records and read models.
//!
//! # Invariants
//! - `PortfolioVersion::portfolio_id` always names an existing portfolio.
//! - `Page::version_id` always names an existing version.
//! - `Page::url` is unique across every page in the store.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub type PortfolioId = i64;
pub type VersionId = i64;
pub type PageId = i64;

/// Entity kinds used in semantic errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Portfolio,
    Version,
    Page,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Portfolio => "portfolio",
            Self::Version => "portfolio_version",
            Self::Page => "page",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hierarchy root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub id: PortfolioId,
    pub name: String,
    /// Free text, not unique.
    pub url: String,
}

/// Labeled child of exactly one portfolio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioVersion {
    pub id: VersionId,
    pub portfolio_id: PortfolioId,
    /// Free-text label such as `draft` or `published`.
    pub version_type: String,
}

/// Leaf record owned by exactly one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: PageId,
    pub version_id: VersionId,
    pub name: String,
    /// Globally unique across all pages.
    pub url: String,
}

/// Portfolio with its versions in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioWithVersions {
    #[serde(flatten)]
    pub portfolio: Portfolio,
    pub versions: Vec<PortfolioVersion>,
}

/// Version with its parent portfolio and owned pages attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDetail {
    #[serde(flatten)]
    pub version: PortfolioVersion,
    pub portfolio: Portfolio,
    pub pages: Vec<Page>,
}

/// Page with its parent version attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDetail {
    #[serde(flatten)]
    pub page: Page,
    pub version: PortfolioVersion,
}
