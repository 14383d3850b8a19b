//! Domain model for the portfolio hierarchy.
//!
//! # Responsibility
//! - Define the Portfolio → PortfolioVersion → Page records.
//! - Define create/patch inputs and read models with attached relations.
//!
//! # Invariants
//! - Every record is identified by a stable positive integer id.
//! - Patch inputs distinguish "omitted" (`None`) from "set" (`Some`).

pub mod input;
pub mod portfolio;
pub mod validation;
