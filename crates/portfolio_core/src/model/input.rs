//! Create and partial-update inputs.
//!
//! Patch fields follow one rule: `None` leaves the stored value untouched,
//! `Some(value)` overwrites it, including `Some(String::new())`.

use crate::model::portfolio::{EntityKind, VersionId};
use crate::model::validation::{validate_id, validate_text, ValidationError};
use serde::{Deserialize, Serialize};

/// Input for creating a portfolio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPortfolio {
    pub name: String,
    pub url: String,
}

impl NewPortfolio {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_text("name", &self.name)?;
        validate_text("url", &self.url)
    }
}

/// Partial update for a portfolio.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioPatch {
    pub name: Option<String>,
    pub url: Option<String>,
}

impl PortfolioPatch {
    /// Returns whether no field was supplied.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.url.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = self.name.as_deref() {
            validate_text("name", name)?;
        }
        if let Some(url) = self.url.as_deref() {
            validate_text("url", url)?;
        }
        Ok(())
    }
}

/// Partial update for a version label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionPatch {
    pub version_type: Option<String>,
}

impl VersionPatch {
    pub fn is_empty(&self) -> bool {
        self.version_type.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.version_type.as_deref() {
            Some(version_type) => validate_text("versionType", version_type),
            None => Ok(()),
        }
    }
}

/// One page entry supplied on create or bulk replace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPage {
    pub name: String,
    pub url: String,
}

impl NewPage {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_text("name", &self.name)?;
        validate_text("url", &self.url)
    }
}

/// Partial update for a page, including parent reassignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagePatch {
    pub name: Option<String>,
    pub url: Option<String>,
    pub version_id: Option<VersionId>,
}

impl PagePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.url.is_none() && self.version_id.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = self.name.as_deref() {
            validate_text("name", name)?;
        }
        if let Some(url) = self.url.as_deref() {
            validate_text("url", url)?;
        }
        if let Some(version_id) = self.version_id {
            validate_id(EntityKind::Version, version_id)?;
        }
        Ok(())
    }
}
