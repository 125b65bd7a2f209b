//! Configuration types for Vigil.
//!
//! This crate provides the audit registration table read from
//! `.vigil/audit.yaml`: which methods are audited, by which strategy, and
//! which strategies are switched on.

pub mod env;
pub mod loader;
pub mod types;

pub use env::*;
pub use loader::*;
pub use types::*;
