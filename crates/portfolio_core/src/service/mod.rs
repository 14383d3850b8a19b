//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep API layers decoupled from storage details.

pub mod hierarchy_service;
