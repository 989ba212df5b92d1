//! Error types for sla-core
//!
//! This module defines the error taxonomy used throughout the crate. Engine
//! failures are carried as [`EngineError`](crate::engine::EngineError) inside
//! the construction and transmission variants so callers can still see the
//! collaborator's status.

pub mod sla_errors;

// Re-export main error types
pub use sla_errors::{SlaError, SlaResult};
